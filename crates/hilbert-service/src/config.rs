//! Service configuration, read from `hilbert.toml`.
//!
//! ```toml
//! [arbiter]
//! max_attempts = 10
//! retry_interval_ms = 50
//!
//! [truth]
//! short_circuit = false
//!
//! [proof]
//! default_rule_version = "0.02.00"
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use crate::error::ConfigError;
use hilbert_logic::{ProofCheckerFactory, TruthOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "hilbert.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub arbiter: ArbiterConfig,
    pub truth: TruthConfig,
    pub proof: ProofConfig,
}

/// Retry policy for block requests the arbiter refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArbiterConfig {
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval_ms: 50,
        }
    }
}

impl ArbiterConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TruthConfig {
    pub short_circuit: bool,
}

impl TruthConfig {
    pub fn options(&self) -> TruthOptions {
        TruthOptions {
            short_circuit: self.short_circuit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProofConfig {
    /// Rule-set revision for modules that declare none.
    pub default_rule_version: String,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            default_rule_version: "0.02.00".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] when it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.arbiter.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "arbiter.max_attempts must be at least 1".to_string(),
            ));
        }
        let version = &self.proof.default_rule_version;
        if !ProofCheckerFactory::new().is_rule_version_supported(version) {
            return Err(ConfigError::Invalid(format!(
                "proof.default_rule_version `{version}` is not a supported rule version"
            )));
        }
        Ok(())
    }
}
