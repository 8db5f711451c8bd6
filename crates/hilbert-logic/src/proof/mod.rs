//! Versioned formal proof checkers.
//!
//! ```text
//! ProofCheckerFactory::create_proof_checker("0.02.00")
//!         │
//!         ▼
//!   Box<dyn ProofChecker> ──check_proof──► LineEngine ──► CheckErrorList
//!         │                                  │
//!         └──check_rule                      ├─ RuleChecker (declared rules)
//!                                            └─ ReferenceResolver (premises)
//! ```
//!
//! Each revision fixes which rules exist and how strictly they are
//! checked. Unjustified lines are collected; only malformed input and
//! cancellation end a check early.

mod engine;
mod v1;
mod v2;

pub use v1::ProofCheckerV1;
pub use v2::ProofCheckerV2;

use crate::check::{CheckErrorList, ModuleContext, codes};
use crate::error::LogicError;
use crate::resolver::ReferenceResolver;
use crate::rule::{RuleChecker, RuleVersion};
use hilbert_kernel::{CancelToken, Element, ProgressTracker, ProofLine, RuleDeclaration};

/// A proof checker bound to one rule-set revision.
pub trait ProofChecker: Send + Sync {
    /// Revision this checker implements.
    fn version(&self) -> RuleVersion;

    /// Verify that `lines` prove `formula`.
    ///
    /// Returns every unjustified step; an empty list means the proof is
    /// valid. `Err` is reserved for cancellation.
    fn check_proof(
        &self,
        formula: &Element,
        lines: &[ProofLine],
        rule_checker: &dyn RuleChecker,
        context: &ModuleContext,
        resolver: &dyn ReferenceResolver,
        cancel: &CancelToken,
        progress: Option<&ProgressTracker>,
    ) -> Result<CheckErrorList, LogicError>;

    /// Validate a rule declaration of the module under check.
    fn check_rule(
        &self,
        rule: &RuleDeclaration,
        context: &ModuleContext,
        resolver: &dyn ReferenceResolver,
    ) -> Result<CheckErrorList, LogicError>;
}

/// Static description of a rule-set revision.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Revision {
    pub version: RuleVersion,
    /// Rules of this revision with the version they were introduced in.
    pub rules: &'static [(&'static str, RuleVersion)],
    /// Reject generalization or substitution over variables free in an
    /// open conditional-proof hypothesis.
    pub guard_hypotheses: bool,
}

impl Revision {
    pub fn since(&self, rule: &str) -> Option<RuleVersion> {
        self.rules
            .iter()
            .find(|(name, _)| *name == rule)
            .map(|(_, since)| *since)
    }

    pub fn check_rule(
        &self,
        rule: &RuleDeclaration,
        context: &ModuleContext,
        resolver: &dyn ReferenceResolver,
    ) -> Result<CheckErrorList, LogicError> {
        let context = context.join(format!("rule[{}]", rule.name));
        let mut errors = CheckErrorList::new();
        let Ok(declared) = rule.version.parse::<RuleVersion>() else {
            errors.add(
                codes::INVALID_RULE_VERSION,
                format!("rule {} declares unreadable version `{}`", rule.name, rule.version),
                &context,
            );
            return Ok(errors);
        };

        match self.since(&rule.name) {
            None => errors.add(
                codes::RULE_UNKNOWN,
                format!("rule {} is not part of rule set {}", rule.name, self.version),
                &context,
            ),
            Some(since) if declared < since => errors.add(
                codes::RULE_UNKNOWN,
                format!("rule {} exists only since {since}, declared {declared}", rule.name),
                &context,
            ),
            Some(_) if declared > self.version => errors.add(
                codes::RULE_VERSION_UNSUPPORTED,
                format!(
                    "rule {} declared with version {declared}, checker supports {}",
                    rule.name, self.version
                ),
                &context,
            ),
            Some(_) => {}
        }

        for link in &rule.links {
            if resolver.normalized_reference_formula(link).is_none() {
                errors.add(
                    codes::REFERENCE_NOT_FOUND,
                    format!("rule link `{link}` does not name a node"),
                    &context,
                );
            } else if !resolver.is_proved_formula(link) {
                errors.add(
                    codes::RULE_LINK_NOT_PROVED,
                    format!("rule link `{link}` is not proved"),
                    &context,
                );
            }
        }
        Ok(errors)
    }
}

/// Selects a proof checker by rule-set revision.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProofCheckerFactory;

impl ProofCheckerFactory {
    pub fn new() -> Self {
        Self
    }

    /// Revisions a checker exists for, oldest first.
    pub fn supported_versions(&self) -> Vec<RuleVersion> {
        vec![v1::REVISION.version, v2::REVISION.version]
    }

    pub fn is_rule_version_supported(&self, version: &str) -> bool {
        version
            .parse::<RuleVersion>()
            .is_ok_and(|version| self.supported_versions().contains(&version))
    }

    /// Checker for `version`.
    ///
    /// Fails with [`LogicError::InvalidRuleVersion`] for strings that are
    /// not version triples and [`LogicError::UnsupportedRuleVersion`] for
    /// revisions without a checker.
    pub fn create_proof_checker(&self, version: &str) -> Result<Box<dyn ProofChecker>, LogicError> {
        let parsed: RuleVersion = version.parse()?;
        let checker: Box<dyn ProofChecker> = if parsed == v1::REVISION.version {
            Box::new(ProofCheckerV1)
        } else if parsed == v2::REVISION.version {
            Box::new(ProofCheckerV2)
        } else {
            return Err(LogicError::UnsupportedRuleVersion(version.to_string()));
        };
        tracing::debug!(version = %parsed, "proof checker selected");
        Ok(checker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ModuleResolver;
    use hilbert_kernel::{Module, ModuleAddress};

    #[test]
    fn factory_selects_by_version() {
        let factory = ProofCheckerFactory::new();
        assert!(factory.is_rule_version_supported("0.01.00"));
        assert!(factory.is_rule_version_supported("0.2.0"));
        assert!(!factory.is_rule_version_supported("0.03.00"));
        assert!(!factory.is_rule_version_supported("latest"));

        let checker = factory.create_proof_checker("0.02.00").expect("v2 exists");
        assert_eq!(checker.version(), RuleVersion::new(0, 2, 0));

        assert_eq!(
            factory.create_proof_checker("0.03.00").err(),
            Some(LogicError::UnsupportedRuleVersion("0.03.00".to_string()))
        );
        assert_eq!(
            factory.create_proof_checker("v2").err(),
            Some(LogicError::InvalidRuleVersion("v2".to_string()))
        );
    }

    #[test]
    fn unreadable_rule_version_is_a_check_error() {
        let module = Module::new("m");
        let resolver = ModuleResolver::new(&module);
        let context = ModuleContext::new(ModuleAddress::new("m"));
        let rule = RuleDeclaration {
            name: "MP".to_string(),
            version: "bogus".to_string(),
            links: Vec::new(),
        };
        let errors = v2::REVISION
            .check_rule(&rule, &context, &resolver)
            .expect("bad declarations are collected");
        assert_eq!(errors.codes(), vec![codes::INVALID_RULE_VERSION]);
        assert_eq!(
            errors.iter().next().map(|e| e.context.location.as_str()),
            Some("rule[MP]")
        );
    }
}
