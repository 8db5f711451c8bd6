//! Operator vocabulary and structural helpers over formula elements.
//!
//! Subject variables are `VAR(x)`. Quantifiers bind their first child:
//! `FORALL(VAR(x), body)` or `FORALL(VAR(x), restriction, body)`.
//! Predicates and functions carry their name as the first child:
//! `PREDVAR(P, VAR(x), …)`.

use hilbert_kernel::Element;
use std::collections::BTreeSet;

pub mod ops {
    pub const AND: &str = "AND";
    pub const OR: &str = "OR";
    pub const NOT: &str = "NOT";
    pub const IMPL: &str = "IMPL";
    pub const EQUI: &str = "EQUI";
    pub const PREDVAR: &str = "PREDVAR";
    pub const PREDCON: &str = "PREDCON";
    pub const FUNVAR: &str = "FUNVAR";
    pub const FUNCON: &str = "FUNCON";
    pub const VAR: &str = "VAR";
    pub const FORALL: &str = "FORALL";
    pub const EXISTS: &str = "EXISTS";
    pub const EXISTSU: &str = "EXISTSU";
}

/// Connectives evaluated by the truth engine.
pub fn is_connective(operator: &str) -> bool {
    matches!(
        operator,
        ops::AND | ops::OR | ops::NOT | ops::IMPL | ops::EQUI
    )
}

pub fn is_quantifier(operator: &str) -> bool {
    matches!(operator, ops::FORALL | ops::EXISTS | ops::EXISTSU)
}

/// Predicate nodes: formulas with a name and term arguments.
pub fn is_predicate(operator: &str) -> bool {
    matches!(operator, ops::PREDVAR | ops::PREDCON)
}

/// Function nodes: terms with a name and term arguments.
pub fn is_function(operator: &str) -> bool {
    matches!(operator, ops::FUNVAR | ops::FUNCON)
}

pub fn subject_variable(name: impl Into<String>) -> Element {
    Element::list(ops::VAR, vec![Element::atom(name)])
}

/// `VAR(x)` with exactly one atom child.
pub fn is_subject_variable(element: &Element) -> bool {
    element.has_operator(ops::VAR)
        && element.children().len() == 1
        && element.children()[0].is_atom()
}

pub fn implication(antecedent: Element, consequent: Element) -> Element {
    Element::list(ops::IMPL, vec![antecedent, consequent])
}

pub fn quantified(operator: &str, variable: Element, body: Element) -> Element {
    Element::list(operator, vec![variable, body])
}

/// Split a binary implication into antecedent and consequent.
pub fn as_implication(element: &Element) -> Option<(&Element, &Element)> {
    match element.children() {
        [antecedent, consequent] if element.has_operator(ops::IMPL) => {
            Some((antecedent, consequent))
        }
        _ => None,
    }
}

/// Name atom of a predicate or function node.
pub fn symbol_name(element: &Element) -> Option<&str> {
    element.children().first().and_then(Element::atom_text)
}

/// Variable bound by a quantifier node.
pub fn bound_by(element: &Element) -> Option<&Element> {
    match element.operator() {
        Some(op) if is_quantifier(op) => element.children().first(),
        _ => None,
    }
}

/// Subject variables with at least one free occurrence.
pub fn free_variables(element: &Element) -> BTreeSet<Element> {
    let mut out = BTreeSet::new();
    collect_free(element, &mut Vec::new(), &mut out);
    out
}

fn collect_free<'a>(
    element: &'a Element,
    bound: &mut Vec<&'a Element>,
    out: &mut BTreeSet<Element>,
) {
    if is_subject_variable(element) {
        if !bound.contains(&element) {
            out.insert(element.clone());
        }
        return;
    }
    match bound_by(element) {
        Some(variable) => {
            bound.push(variable);
            for child in &element.children()[1..] {
                collect_free(child, bound, out);
            }
            bound.pop();
        }
        None => {
            for child in element.children() {
                collect_free(child, bound, out);
            }
        }
    }
}

/// Subject variables bound by some quantifier.
pub fn bound_variables(element: &Element) -> BTreeSet<Element> {
    let mut out = BTreeSet::new();
    collect_bound(element, &mut out);
    out
}

fn collect_bound(element: &Element, out: &mut BTreeSet<Element>) {
    if let Some(variable) = bound_by(element) {
        out.insert(variable.clone());
    }
    for child in element.children() {
        collect_bound(child, out);
    }
}

pub fn is_free_in(variable: &Element, element: &Element) -> bool {
    free_variables(element).contains(variable)
}

/// Simultaneously replace free occurrences of each variable by its term.
pub fn substitute_free(element: &Element, pairs: &[(Element, Element)]) -> Element {
    if pairs.is_empty() {
        return element.clone();
    }
    if is_subject_variable(element) {
        return pairs
            .iter()
            .find(|(variable, _)| variable == element)
            .map(|(_, term)| term.clone())
            .unwrap_or_else(|| element.clone());
    }
    let Some(list) = element.as_list() else {
        return element.clone();
    };

    let children = match bound_by(element) {
        Some(variable) => {
            let remaining: Vec<(Element, Element)> = pairs
                .iter()
                .filter(|(candidate, _)| candidate != variable)
                .cloned()
                .collect();
            list.elements()
                .iter()
                .map(|child| substitute_free(child, &remaining))
                .collect()
        }
        None => list
            .elements()
            .iter()
            .map(|child| substitute_free(child, pairs))
            .collect(),
    };
    Element::list(list.operator(), children)
}

/// Rename a bound variable. `occurrence == 0` renames every quantifier
/// binding `original`; `n` renames only the n-th one in pre-order.
///
/// Returns `None` when no matching binding exists.
pub fn rename_bound(
    element: &Element,
    original: &Element,
    replacement: &Element,
    occurrence: usize,
) -> Option<Element> {
    let mut seen = 0;
    let renamed = rename_walk(element, original, replacement, occurrence, &mut seen);
    let found = if occurrence == 0 {
        seen > 0
    } else {
        seen >= occurrence
    };
    found.then_some(renamed)
}

fn rename_walk(
    element: &Element,
    original: &Element,
    replacement: &Element,
    occurrence: usize,
    seen: &mut usize,
) -> Element {
    let Some(list) = element.as_list() else {
        return element.clone();
    };

    if bound_by(element) == Some(original) {
        *seen += 1;
        if occurrence == 0 || *seen == occurrence {
            let pair = [(original.clone(), replacement.clone())];
            let mut children = vec![replacement.clone()];
            for child in &list.elements()[1..] {
                let body = substitute_free(child, &pair);
                children.push(rename_walk(&body, original, replacement, occurrence, seen));
            }
            return Element::list(list.operator(), children);
        }
    }

    let children = list
        .elements()
        .iter()
        .map(|child| rename_walk(child, original, replacement, occurrence, seen))
        .collect();
    Element::list(list.operator(), children)
}

/// Replace every instance `P(t1, …, tn)` of the predicate variable pattern
/// `P(x1, …, xn)` by `substitute[x1 := t1, …, xn := tn]`.
pub fn substitute_predicate(element: &Element, pattern: &Element, substitute: &Element) -> Element {
    let Some(name) = symbol_name(pattern) else {
        return element.clone();
    };
    let parameters = &pattern.children()[1..];
    substitute_predicate_walk(element, name, parameters, substitute)
}

fn substitute_predicate_walk(
    element: &Element,
    name: &str,
    parameters: &[Element],
    substitute: &Element,
) -> Element {
    let Some(list) = element.as_list() else {
        return element.clone();
    };
    if list.operator() == ops::PREDVAR
        && symbol_name(element) == Some(name)
        && list.len() == parameters.len() + 1
    {
        let pairs: Vec<(Element, Element)> = parameters
            .iter()
            .cloned()
            .zip(list.elements()[1..].iter().cloned())
            .collect();
        return substitute_free(substitute, &pairs);
    }
    let children = list
        .elements()
        .iter()
        .map(|child| substitute_predicate_walk(child, name, parameters, substitute))
        .collect();
    Element::list(list.operator(), children)
}
