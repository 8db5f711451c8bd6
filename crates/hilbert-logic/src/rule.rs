//! Rule keys, rule-set revisions and declared-rule lookup.

use crate::error::LogicError;
use hilbert_kernel::Module;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Dotted `major.minor.patch` revision, compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\.(\d+)\.(\d+)\s*$").expect("rule version regex must compile")
    })
}

impl RuleVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::str::FromStr for RuleVersion {
    type Err = LogicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LogicError::InvalidRuleVersion(s.to_string());
        let captures = version_re().captures(s).ok_or_else(invalid)?;
        let part = |idx: usize| -> Result<u32, LogicError> {
            captures[idx].parse::<u32>().map_err(|_| invalid())
        };
        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl std::fmt::Display for RuleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}.{:02}", self.major, self.minor, self.patch)
    }
}

/// A rule name at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    pub name: String,
    pub version: String,
}

impl RuleKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Answers which version of a rule the module under check declares.
pub trait RuleChecker {
    /// Highest declared version of rule `name`, if declared at all.
    fn rule(&self, name: &str) -> Option<RuleKey>;
}

/// Declarations with unreadable versions never match; the well-formedness
/// check reports them before any proof is looked at.
impl RuleChecker for Module {
    fn rule(&self, name: &str) -> Option<RuleKey> {
        self.rule_declarations(name)
            .filter_map(|declaration| {
                declaration
                    .version
                    .parse::<RuleVersion>()
                    .ok()
                    .map(|version| (version, declaration))
            })
            .max_by_key(|(version, _)| *version)
            .map(|(_, declaration)| RuleKey::new(&declaration.name, &declaration.version))
    }
}
