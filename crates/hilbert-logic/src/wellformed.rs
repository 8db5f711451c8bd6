//! Well-formedness of a module's formulas, labels and references.

use crate::check::{CheckErrorList, ModuleContext, codes};
use crate::formula::{self, ops};
use crate::resolver::ReferenceResolver;
use crate::rule::RuleVersion;
use hilbert_kernel::{Element, Module, ProofLine, Reason};
use std::collections::BTreeSet;

/// Validate every formula, label and reference of `module`.
///
/// References of the form `prefix.label` are resolved through `resolver`,
/// which must know the module's imports.
pub fn check_well_formed(module: &Module, resolver: &dyn ReferenceResolver) -> CheckErrorList {
    let root = ModuleContext::new(module.address.clone());
    let mut checker = WellFormed {
        module,
        resolver,
        errors: CheckErrorList::new(),
    };

    let mut imports = BTreeSet::new();
    for import in &module.imports {
        if !imports.insert(import.label.as_str()) {
            checker.errors.add(
                codes::DUPLICATE_LABEL,
                format!("import label `{}` is used twice", import.label),
                &root.join(format!("import[{}]", import.label)),
            );
        }
    }

    for rule in &module.rules {
        let context = root.join(format!("rule[{}]", rule.name));
        if rule.version.parse::<RuleVersion>().is_err() {
            checker.errors.add(
                codes::INVALID_RULE_VERSION,
                format!("rule {} declares unreadable version `{}`", rule.name, rule.version),
                &context,
            );
        }
        for link in &rule.links {
            checker.check_module_reference(link, &context);
        }
    }

    let mut labels = BTreeSet::new();
    for node in &module.nodes {
        let context = root.join(format!("node[{}]", node.label));
        if !labels.insert(node.label.as_str()) {
            checker.errors.add(
                codes::DUPLICATE_LABEL,
                format!("node label `{}` is used twice", node.label),
                &context,
            );
        }
        checker.check_formula(node.formula(), &context, &mut Vec::new());
        for (index, proof) in node.proofs().iter().enumerate() {
            let context = context.join(format!("proof[{index}]"));
            checker.check_lines(&proof.lines, &context, &mut vec![BTreeSet::new()]);
        }
    }
    checker.errors
}

struct WellFormed<'a> {
    module: &'a Module,
    resolver: &'a dyn ReferenceResolver,
    errors: CheckErrorList,
}

impl WellFormed<'_> {
    fn check_formula<'e>(
        &mut self,
        element: &'e Element,
        context: &ModuleContext,
        bound: &mut Vec<&'e Element>,
    ) {
        let Some(operator) = element.operator() else {
            self.errors.add(
                codes::BARE_ATOM,
                format!("bare atom `{element}` where a formula was expected"),
                context,
            );
            return;
        };
        let children = element.children();

        if formula::is_connective(operator) {
            let minimum = if operator == ops::NOT { 1 } else { 2 };
            if children.len() < minimum {
                self.errors.add(
                    codes::WRONG_ARITY,
                    format!(
                        "{operator} needs at least {minimum} operands, found {}",
                        children.len()
                    ),
                    context,
                );
            }
            for child in children {
                self.check_formula(child, context, bound);
            }
        } else if formula::is_predicate(operator) {
            self.check_applied(element, context);
        } else if formula::is_quantifier(operator) {
            if !(2..=3).contains(&children.len()) {
                self.errors.add(
                    codes::WRONG_ARITY,
                    format!("{operator} takes a variable and one or two formulas"),
                    context,
                );
                return;
            }
            let variable = &children[0];
            if !formula::is_subject_variable(variable) {
                self.errors.add(
                    codes::NOT_A_SUBJECT_VARIABLE,
                    format!("{operator} must bind a subject variable, found {variable}"),
                    context,
                );
                return;
            }
            if bound.contains(&variable) {
                self.errors.add(
                    codes::VARIABLE_ALREADY_BOUND,
                    format!("{variable} is already bound in this scope"),
                    context,
                );
            }
            bound.push(variable);
            for child in &children[1..] {
                self.check_formula(child, context, bound);
            }
            bound.pop();
        } else if operator == ops::VAR || formula::is_function(operator) {
            self.errors.add(
                codes::UNKNOWN_OPERATOR,
                format!("term {element} where a formula was expected"),
                context,
            );
        } else {
            self.errors.add(
                codes::UNKNOWN_OPERATOR,
                format!("unknown operator {operator}"),
                context,
            );
        }
    }

    fn check_term(&mut self, element: &Element, context: &ModuleContext) {
        match element.operator() {
            None => self.errors.add(
                codes::BARE_ATOM,
                format!("bare atom `{element}` where a term was expected"),
                context,
            ),
            Some(ops::VAR) => {
                if !formula::is_subject_variable(element) {
                    self.errors.add(
                        codes::MISSING_SYMBOL_NAME,
                        format!("{element} must carry exactly one name"),
                        context,
                    );
                }
            }
            Some(operator) if formula::is_function(operator) => {
                self.check_applied(element, context);
            }
            Some(operator) => self.errors.add(
                codes::UNKNOWN_OPERATOR,
                format!("{operator} is not a term"),
                context,
            ),
        }
    }

    /// Predicates and functions: a name atom followed by terms.
    fn check_applied(&mut self, element: &Element, context: &ModuleContext) {
        let children = element.children();
        if formula::symbol_name(element).is_none() {
            self.errors.add(
                codes::MISSING_SYMBOL_NAME,
                format!("{element} does not start with a name"),
                context,
            );
            return;
        }
        for child in &children[1..] {
            self.check_term(child, context);
        }
    }

    fn check_subject_variable(&mut self, element: &Element, context: &ModuleContext) {
        if !formula::is_subject_variable(element) {
            self.errors.add(
                codes::NOT_A_SUBJECT_VARIABLE,
                format!("{element} is not a subject variable"),
                context,
            );
        }
    }

    /// A reference to a node of this module or of an import.
    fn check_module_reference(&mut self, reference: &str, context: &ModuleContext) {
        if let Some((prefix, _)) = reference.trim().split_once('.') {
            if self.module.import(prefix).is_none() {
                self.errors.add(
                    codes::UNKNOWN_IMPORT,
                    format!("`{prefix}` is not an import label"),
                    context,
                );
                return;
            }
        }
        if self.resolver.normalized_reference_formula(reference).is_none() {
            self.errors.add(
                codes::UNKNOWN_REFERENCE,
                format!("reference `{reference}` does not name a node"),
                context,
            );
        }
    }

    /// A premise reference from a proof line: a visible line label or a
    /// module-level node.
    fn check_premise(
        &mut self,
        reference: &str,
        context: &ModuleContext,
        scopes: &[BTreeSet<String>],
    ) {
        match self.resolver.normalized_local_proof_line_reference(reference) {
            Some(label) => {
                if !scopes.iter().any(|scope| scope.contains(&label)) {
                    self.errors.add(
                        codes::UNKNOWN_REFERENCE,
                        format!("no earlier line is labelled `{label}`"),
                        context,
                    );
                }
            }
            None => self.check_module_reference(reference, context),
        }
    }

    fn check_lines(
        &mut self,
        lines: &[ProofLine],
        context: &ModuleContext,
        scopes: &mut Vec<BTreeSet<String>>,
    ) {
        for (index, line) in lines.iter().enumerate() {
            let context = context.join(format!("line[{index}]"));
            self.check_formula(&line.formula, &context, &mut Vec::new());
            self.check_reason(&line.reason, &context, scopes);
            if let Some(label) = &line.label {
                self.declare(label, &context, scopes);
            }
        }
    }

    fn declare(&mut self, label: &str, context: &ModuleContext, scopes: &mut [BTreeSet<String>]) {
        let label = label.trim().to_string();
        if scopes.iter().any(|scope| scope.contains(&label)) {
            self.errors.add(
                codes::DUPLICATE_LABEL,
                format!("line label `{label}` is used twice"),
                context,
            );
        } else if let Some(scope) = scopes.last_mut() {
            scope.insert(label);
        }
    }

    fn check_reason(
        &mut self,
        reason: &Reason,
        context: &ModuleContext,
        scopes: &mut Vec<BTreeSet<String>>,
    ) {
        for reference in reason.references() {
            self.check_premise(reference, context, scopes);
        }
        match reason {
            Reason::Add { .. } | Reason::ModusPonens { .. } => {}
            Reason::Rename {
                original,
                replacement,
                ..
            } => {
                self.check_subject_variable(original, context);
                self.check_subject_variable(replacement, context);
            }
            Reason::SubstFree {
                subject_variable,
                substitute,
                ..
            } => {
                self.check_subject_variable(subject_variable, context);
                self.check_term(substitute, context);
            }
            Reason::SubstPred {
                predicate_variable,
                substitute,
                ..
            } => {
                self.check_formula(predicate_variable, context, &mut Vec::new());
                self.check_formula(substitute, context, &mut Vec::new());
            }
            Reason::Universal {
                subject_variable, ..
            }
            | Reason::Existential {
                subject_variable, ..
            } => self.check_subject_variable(subject_variable, context),
            Reason::ConditionalProof {
                hypothesis,
                lines,
                conclusion,
            } => {
                scopes.push(BTreeSet::new());
                let hypothesis_context = context.join("hypothesis");
                self.check_formula(&hypothesis.formula, &hypothesis_context, &mut Vec::new());
                self.declare(&hypothesis.label, &hypothesis_context, scopes);
                self.check_lines(lines, context, scopes);
                let conclusion_context = context.join("conclusion");
                self.check_formula(&conclusion.formula, &conclusion_context, &mut Vec::new());
                scopes.pop();
            }
        }
    }
}
