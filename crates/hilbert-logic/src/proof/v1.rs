//! Rule set `0.01.00`: the Hilbert calculus without conditional proofs.

use super::engine::LineEngine;
use super::{ProofChecker, Revision};
use crate::check::{CheckErrorList, ModuleContext};
use crate::error::LogicError;
use crate::resolver::ReferenceResolver;
use crate::rule::{RuleChecker, RuleVersion};
use hilbert_kernel::{CancelToken, Element, ProgressTracker, ProofLine, RuleDeclaration};

const V1: RuleVersion = RuleVersion::new(0, 1, 0);

pub(crate) const REVISION: Revision = Revision {
    version: V1,
    rules: &[
        ("ADD", V1),
        ("MP", V1),
        ("RENAME", V1),
        ("SUBST_FREE", V1),
        ("SUBST_PRED", V1),
        ("UNIVERSAL", V1),
        ("EXISTENTIAL", V1),
    ],
    guard_hypotheses: false,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ProofCheckerV1;

impl ProofChecker for ProofCheckerV1 {
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
