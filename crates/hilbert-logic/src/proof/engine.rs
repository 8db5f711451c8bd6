//! Line-by-line proof verification shared by every revision.

use super::Revision;
use crate::check::{CheckErrorList, ModuleContext, codes};
use crate::error::LogicError;
use crate::formula::{self, ops};
use crate::resolver::ReferenceResolver;
use crate::rule::{RuleChecker, RuleVersion};
use hilbert_kernel::{CancelToken, Element, ProgressTracker, ProofLine, Reason};
use std::collections::BTreeMap;

/// One unjustified step: error code and message.
type Defect = (u32, String);

/// Labels visible in one proof or conditional-proof block.
#[derive(Default)]
struct Scope {
    lines: BTreeMap<String, Element>,
    hypothesis: Option<Element>,
}

pub(crate) struct LineEngine<'a> {
    revision: &'a Revision,
    rule_checker: &'a dyn RuleChecker,
    resolver: &'a dyn ReferenceResolver,
    cancel: &'a CancelToken,
    progress: Option<&'a ProgressTracker>,
    scopes: Vec<Scope>,
    errors: CheckErrorList,
    total: u64,
    done: u64,
}

impl<'a> LineEngine<'a> {
    pub fn new(
        revision: &'a Revision,
        rule_checker: &'a dyn RuleChecker,
        resolver: &'a dyn ReferenceResolver,
        cancel: &'a CancelToken,
        progress: Option<&'a ProgressTracker>,
    ) -> Self {
        Self {
            revision,
            rule_checker,
            resolver,
            cancel,
            progress,
            scopes: vec![Scope::default()],
            errors: CheckErrorList::new(),
            total: 0,
            done: 0,
        }
    }

    pub fn check_proof(
        mut self,
        formula: &Element,
        lines: &[ProofLine],
        context: &ModuleContext,
    ) -> Result<CheckErrorList, LogicError> {
        if lines.is_empty() {
            self.errors
                .add(codes::EMPTY_PROOF, "proof has no lines", context);
            return Ok(self.errors);
        }
        self.total = count_lines(lines);

        let last = self.check_lines(lines, context)?;
        if let Some(progress) = self.progress {
            progress.set_percentage(100.0);
        }
        let expected = self.resolver.normalized_formula(formula);
        if last.as_ref() != Some(&expected) {
            self.errors.add(
                codes::LAST_LINE_MISMATCH,
                format!("last line does not state the proposition {expected}"),
                context,
            );
        }
        Ok(self.errors)
    }

    /// Check a block of lines in the current scope and return the formula
    /// of its last line.
    fn check_lines(
        &mut self,
        lines: &[ProofLine],
        context: &ModuleContext,
    ) -> Result<Option<Element>, LogicError> {
        let mut last = None;
        for (index, line) in lines.iter().enumerate() {
            if let Err(cancelled) = self.cancel.check() {
                tracing::debug!(location = %context, "proof check interrupted");
                return Err(cancelled.into());
            }
            let line_context = context.join(format!("line[{index}]"));
            let formula = self.resolver.normalized_formula(&line.formula);

            if let Some((code, message)) = self.check_line(line, &formula, &line_context)? {
                self.errors.add(code, message, &line_context);
            }
            if let Some(label) = &line.label {
                self.register(label, formula.clone(), &line_context);
            }

            self.done += 1;
            if let Some(progress) = self.progress {
                progress.set_fraction(self.done, self.total);
                progress.set_location(line_context.to_string());
            }
            last = Some(formula);
        }
        Ok(last)
    }

    /// Make `label` visible for later lines. Failed lines are registered
    /// too, so one bad line does not cascade into its dependents.
    fn register(&mut self, label: &str, formula: Element, context: &ModuleContext) {
        let Some(label) = self.resolver.normalized_local_proof_line_reference(label) else {
            self.errors.add(
                codes::DUPLICATE_LINE_LABEL,
                format!("line label `{label}` collides with a module node"),
                context,
            );
            return;
        };
        if self.lookup_local(&label).is_some() {
            self.errors.add(
                codes::DUPLICATE_LINE_LABEL,
                format!("line label `{label}` is already in use"),
                context,
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.lines.insert(label, formula);
        }
    }

    fn lookup_local(&self, label: &str) -> Option<&Element> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.lines.get(label))
    }

    fn open_hypotheses(&self) -> impl Iterator<Item = &Element> {
        self.scopes
            .iter()
            .filter_map(|scope| scope.hypothesis.as_ref())
    }

    /// Formula a premise reference stands for.
    fn premise(&self, reference: &str) -> Result<Element, Defect> {
        if let Some(label) = self.resolver.normalized_local_proof_line_reference(reference) {
            return self.lookup_local(&label).cloned().ok_or_else(|| {
                (
                    codes::REFERENCE_NOT_FOUND,
                    format!("no earlier line is labelled `{label}`"),
                )
            });
        }
        let Some(formula) = self.resolver.normalized_reference_formula(reference) else {
            return Err((
                codes::REFERENCE_NOT_FOUND,
                format!("reference `{reference}` does not name a line or node"),
            ));
        };
        if !self.resolver.is_proved_formula(reference) {
            let location = self
                .resolver
                .reference_context(reference)
                .map(|context| context.to_string())
                .unwrap_or_else(|| reference.to_string());
            return Err((
                codes::REFERENCE_NOT_PROVED,
                format!("reference `{reference}` ({location}) is not proved"),
            ));
        }
        Ok(formula)
    }

    /// Whether the module declares the rule at a version this revision
    /// understands.
    fn rule_defect(&self, rule: &str) -> Option<Defect> {
        if self.revision.since(rule).is_none() {
            return Some((
                codes::RULE_UNKNOWN,
                format!("rule {rule} is not part of rule set {}", self.revision.version),
            ));
        }
        let Some(key) = self.rule_checker.rule(rule) else {
            return Some((
                codes::RULE_NOT_DECLARED,
                format!("rule {rule} is not declared by the module"),
            ));
        };
        match key.version.parse::<RuleVersion>() {
            Ok(declared) if declared <= self.revision.version => None,
            Ok(declared) => Some((
                codes::RULE_VERSION_UNSUPPORTED,
                format!(
                    "rule {rule} declared with version {declared}, checker supports {}",
                    self.revision.version
                ),
            )),
            Err(_) => Some((
                codes::RULE_VERSION_UNSUPPORTED,
                format!("rule {rule} declared with unreadable version `{}`", key.version),
            )),
        }
    }

    fn check_line(
        &mut self,
        line: &ProofLine,
        formula: &Element,
        context: &ModuleContext,
    ) -> Result<Option<Defect>, LogicError> {
        if let Some(defect) = self.rule_defect(line.reason.rule_name()) {
            return Ok(Some(defect));
        }
        let outcome = match &line.reason {
            Reason::Add { reference } => self.check_add(reference, formula),
            Reason::ModusPonens {
                reference1,
                reference2,
            } => self.check_modus_ponens(reference1, reference2, formula),
            Reason::Rename {
                reference,
                original,
                replacement,
                occurrence,
            } => self.check_rename(reference, original, replacement, *occurrence, formula),
            Reason::SubstFree {
                reference,
                subject_variable,
                substitute,
            } => self.check_subst_free(reference, subject_variable, substitute, formula),
            Reason::SubstPred {
                reference,
                predicate_variable,
                substitute,
            } => self.check_subst_pred(reference, predicate_variable, substitute, formula),
            Reason::Universal {
                reference,
                subject_variable,
            } => self.check_generalization(reference, subject_variable, formula, true),
            Reason::Existential {
                reference,
                subject_variable,
            } => self.check_generalization(reference, subject_variable, formula, false),
            Reason::ConditionalProof {
                hypothesis,
                lines,
                conclusion,
            } => {
                let hypothesis_formula = self.resolver.normalized_formula(&hypothesis.formula);
                let conclusion_formula = self.resolver.normalized_formula(&conclusion.formula);

                self.scopes.push(Scope {
                    lines: BTreeMap::new(),
                    hypothesis: Some(hypothesis_formula.clone()),
                });
                self.register(
                    &hypothesis.label,
                    hypothesis_formula.clone(),
                    &context.join("hypothesis"),
                );
                let inner = self.check_lines(lines, context);
                self.scopes.pop();
                let derived = inner?.unwrap_or_else(|| hypothesis_formula.clone());

                if derived != conclusion_formula {
                    Err((
                        codes::CONCLUSION_MISMATCH,
                        format!(
                            "conclusion {conclusion_formula} is not the last derived formula \
                             {derived}"
                        ),
                    ))
                } else if *formula != formula::implication(hypothesis_formula, conclusion_formula) {
                    Err((
                        codes::FORMULA_MISMATCH,
                        "a conditional proof concludes hypothesis → conclusion".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        };
        Ok(outcome.err())
    }

    fn check_add(&self, reference: &str, formula: &Element) -> Result<(), Defect> {
        if self.resolver.is_local_proof_line_reference(reference) {
            return Err((
                codes::ADD_REQUIRES_MODULE_REFERENCE,
                format!("ADD needs an axiom or proposition, `{reference}` is a proof line"),
            ));
        }
        let premise = self.premise(reference)?;
        expect_equal(&premise, formula)
    }

    fn check_modus_ponens(
        &self,
        reference1: &str,
        reference2: &str,
        formula: &Element,
    ) -> Result<(), Defect> {
        let first = self.premise(reference1)?;
        let second = self.premise(reference2)?;
        let concludes = |minor: &Element, major: &Element| {
            formula::as_implication(major).is_some_and(|(antecedent, consequent)| {
                antecedent == minor && consequent == formula
            })
        };
        if concludes(&first, &second) || concludes(&second, &first) {
            return Ok(());
        }
        if formula::as_implication(&first).is_none() && formula::as_implication(&second).is_none() {
            return Err((
                codes::NOT_AN_IMPLICATION,
                format!("neither `{reference1}` nor `{reference2}` is an implication"),
            ));
        }
        Err((
            codes::MODUS_PONENS_MISMATCH,
            format!("`{reference1}` and `{reference2}` do not yield {formula} by modus ponens"),
        ))
    }

    fn check_rename(
        &self,
        reference: &str,
        original: &Element,
        replacement: &Element,
        occurrence: usize,
        formula: &Element,
    ) -> Result<(), Defect> {
        let premise = self.premise(reference)?;
        require_subject_variable(original)?;
        require_subject_variable(replacement)?;
        if premise.contains(replacement) {
            return Err((
                codes::RENAME_NOT_POSSIBLE,
                format!("{replacement} already occurs in the referenced formula"),
            ));
        }
        let renamed = formula::rename_bound(&premise, original, replacement, occurrence)
            .ok_or_else(|| {
                (
                    codes::RENAME_NOT_POSSIBLE,
                    format!("no quantifier binds {original} at occurrence {occurrence}"),
                )
            })?;
        expect_equal(&renamed, formula)
    }

    fn check_subst_free(
        &self,
        reference: &str,
        variable: &Element,
        substitute: &Element,
        formula: &Element,
    ) -> Result<(), Defect> {
        let premise = self.premise(reference)?;
        require_subject_variable(variable)?;
        self.guard_hypotheses(
            |hypothesis| formula::is_free_in(variable, hypothesis),
            codes::SUBSTITUTION_OVER_HYPOTHESIS,
            format!("{variable} is free in an open hypothesis"),
        )?;

        if formula::is_free_in(variable, &premise) {
            let bound = formula::bound_variables(&premise);
            if let Some(captured) = formula::free_variables(substitute)
                .into_iter()
                .find(|free| bound.contains(free))
            {
                return Err((
                    codes::SUBSTITUTION_COLLISION,
                    format!("{captured} would be captured by a quantifier"),
                ));
            }
        }
        let pair = [(variable.clone(), substitute.clone())];
        expect_equal(&formula::substitute_free(&premise, &pair), formula)
    }

    fn check_subst_pred(
        &self,
        reference: &str,
        pattern: &Element,
        substitute: &Element,
        formula: &Element,
    ) -> Result<(), Defect> {
        let premise = self.premise(reference)?;
        let name = predicate_pattern_name(pattern)?;
        self.guard_hypotheses(
            |hypothesis| mentions_predicate(hypothesis, name),
            codes::SUBSTITUTION_OVER_HYPOTHESIS,
            format!("predicate variable {name} occurs in an open hypothesis"),
        )?;

        let parameters = &pattern.children()[1..];
        let mut premise_variables = formula::free_variables(&premise);
        premise_variables.extend(formula::bound_variables(&premise));
        let substitute_bound = formula::bound_variables(substitute);
        let capturing = substitute_bound
            .iter()
            .find(|variable| premise_variables.contains(*variable));
        let premise_bound = formula::bound_variables(&premise);
        let captured = formula::free_variables(substitute)
            .into_iter()
            .filter(|variable| !parameters.contains(variable))
            .find(|variable| premise_bound.contains(variable));
        if let Some(variable) = capturing.cloned().or(captured) {
            return Err((
                codes::SUBSTITUTION_COLLISION,
                format!("{variable} would be captured by the substitution"),
            ));
        }
        expect_equal(
            &formula::substitute_predicate(&premise, pattern, substitute),
            formula,
        )
    }

    /// `UNIVERSAL`: `A → B ⊢ A → ∀x B`. `EXISTENTIAL`: `B → A ⊢ ∃x B → A`.
    /// In both cases `x` must not be free in `A`.
    fn check_generalization(
        &self,
        reference: &str,
        variable: &Element,
        formula: &Element,
        universal: bool,
    ) -> Result<(), Defect> {
        let premise = self.premise(reference)?;
        require_subject_variable(variable)?;
        self.guard_hypotheses(
            |hypothesis| formula::is_free_in(variable, hypothesis),
            codes::GENERALIZATION_OVER_HYPOTHESIS,
            format!("cannot generalize over {variable}, it is free in an open hypothesis"),
        )?;

        let (antecedent, consequent) = formula::as_implication(&premise).ok_or_else(|| {
            (
                codes::NOT_AN_IMPLICATION,
                format!("`{reference}` is not an implication"),
            )
        })?;
        let (side, expected) = if universal {
            (
                antecedent,
                formula::implication(
                    antecedent.clone(),
                    formula::quantified(ops::FORALL, variable.clone(), consequent.clone()),
                ),
            )
        } else {
            (
                consequent,
                formula::implication(
                    formula::quantified(ops::EXISTS, variable.clone(), antecedent.clone()),
                    consequent.clone(),
                ),
            )
        };
        if formula::is_free_in(variable, side) {
            return Err((
                codes::VARIABLE_FREE_IN_ANTECEDENT,
                format!("{variable} is free in {side}"),
            ));
        }
        expect_equal(&expected, formula)
    }

    fn guard_hypotheses(
        &self,
        touches: impl Fn(&Element) -> bool,
        code: u32,
        message: String,
    ) -> Result<(), Defect> {
        if self.revision.guard_hypotheses && self.open_hypotheses().any(touches) {
            return Err((code, message));
        }
        Ok(())
    }
}

fn count_lines(lines: &[ProofLine]) -> u64 {
    lines
        .iter()
        .map(|line| match &line.reason {
            Reason::ConditionalProof { lines, .. } => 1 + count_lines(lines),
            _ => 1,
        })
        .sum()
}

fn expect_equal(derived: &Element, stated: &Element) -> Result<(), Defect> {
    if derived == stated {
        Ok(())
    } else {
        Err((
            codes::FORMULA_MISMATCH,
            format!("line states {stated} but the rule yields {derived}"),
        ))
    }
}

fn require_subject_variable(element: &Element) -> Result<(), Defect> {
    if formula::is_subject_variable(element) {
        Ok(())
    } else {
        Err((
            codes::NOT_A_SUBJECT_VARIABLE,
            format!("{element} is not a subject variable"),
        ))
    }
}

/// Name of a `PREDVAR(P, VAR(x1), …)` pattern with distinct parameters.
fn predicate_pattern_name(pattern: &Element) -> Result<&str, Defect> {
    let bad = || {
        (
            codes::BAD_PREDICATE_PATTERN,
            format!("{pattern} is not a predicate variable over distinct subject variables"),
        )
    };
    if !pattern.has_operator(ops::PREDVAR) {
        return Err(bad());
    }
    let name = formula::symbol_name(pattern).ok_or_else(bad)?;
    let parameters = &pattern.children()[1..];
    for (index, parameter) in parameters.iter().enumerate() {
        if !formula::is_subject_variable(parameter) || parameters[..index].contains(parameter) {
            return Err(bad());
        }
    }
    Ok(name)
}

fn mentions_predicate(element: &Element, name: &str) -> bool {
    if element.has_operator(ops::PREDVAR) && formula::symbol_name(element) == Some(name) {
        return true;
    }
    element
        .children()
        .iter()
        .any(|child| mentions_predicate(child, name))
}
