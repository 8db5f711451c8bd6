//! Rule set `0.02.00`: adds conditional proofs.
//!
//! Inside a conditional proof the hypothesis acts as a premise, so no
//! later line may generalize over, or substitute for, a variable free in
//! an open hypothesis.

use super::engine::LineEngine;
use super::{ProofChecker, Revision};
use crate::check::{CheckErrorList, ModuleContext};
use crate::error::LogicError;
use crate::resolver::ReferenceResolver;
use crate::rule::{RuleChecker, RuleVersion};
use hilbert_kernel::{CancelToken, Element, ProgressTracker, ProofLine, RuleDeclaration};

const V1: RuleVersion = RuleVersion::new(0, 1, 0);
const V2: RuleVersion = RuleVersion::new(0, 2, 0);

pub(crate) const REVISION: Revision = Revision {
    version: V2,
    rules: &[
        ("ADD", V1),
        ("MP", V1),
        ("RENAME", V1),
        ("SUBST_FREE", V1),
        ("SUBST_PRED", V1),
        ("UNIVERSAL", V1),
        ("EXISTENTIAL", V1),
        ("CP", V2),
    ],
    guard_hypotheses: true,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ProofCheckerV2;

impl ProofChecker for ProofCheckerV2 {
    fn version(&self) -> RuleVersion {
        REVISION.version
    }

    fn check_proof(
        &self,
        formula: &Element,
        lines: &[ProofLine],
        rule_checker: &dyn RuleChecker,
        context: &ModuleContext,
        resolver: &dyn ReferenceResolver,
        cancel: &CancelToken,
        progress: Option<&ProgressTracker>,
    ) -> Result<CheckErrorList, LogicError> {
        LineEngine::new(&REVISION, rule_checker, resolver, cancel, progress)
            .check_proof(formula, lines, context)
    }

    fn check_rule(
        &self,
        rule: &RuleDeclaration,
        context: &ModuleContext,
        resolver: &dyn ReferenceResolver,
    ) -> Result<CheckErrorList, LogicError> {
        REVISION.check_rule(rule, context, resolver)
    }
}
