//! Exhaustive propositional tautology check.
//!
//! The formula is evaluated under every boolean valuation of its
//! predicate symbols. Valuations are enumerated as a binary counter over
//! the symbols in discovery order, the most recently discovered symbol
//! being the least significant bit.
//!
//! Predicate identity is the predicate's name: `P(x)` and `P(y)` are the
//! same boolean variable. The check is therefore exact for propositional
//! formulas and only a heuristic for formulas with predicate arguments.
//! Quantified subformulas are opaque variables keyed by their full
//! structure.

use crate::error::LogicError;
use crate::formula::{is_quantifier, ops, symbol_name};
use hilbert_kernel::{CancelToken, Element, ProgressTracker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Boolean valuation built lazily during evaluation.
///
/// Looking up an unseen symbol inserts it as `false`. Iteration order is
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    values: Vec<(String, bool)>,
    index: BTreeMap<String, usize>,
}

impl Interpretation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `symbol`, inserting it as `false` on first sight.
    pub fn value(&mut self, symbol: &str) -> bool {
        if let Some(&position) = self.index.get(symbol) {
            return self.values[position].1;
        }
        self.index.insert(symbol.to_string(), self.values.len());
        self.values.push((symbol.to_string(), false));
        false
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Symbols and their current values, in insertion order.
    pub fn assignments(&self) -> &[(String, bool)] {
        &self.values
    }

    /// Step to the next valuation. Returns `false` and clears every symbol
    /// once all valuations over the known symbols have been visited.
    pub fn advance(&mut self) -> bool {
        for (_, value) in self.values.iter_mut().rev() {
            if !*value {
                *value = true;
                return true;
            }
            *value = false;
        }
        self.values.clear();
        self.index.clear();
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct TruthOptions {
    /// Stop at the first falsifying valuation instead of visiting all.
    pub short_circuit: bool,
}

/// Outcome of one tautology query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruthReport {
    pub tautology: bool,
    /// Distinct predicate symbols discovered.
    pub symbols: usize,
    /// Valuations evaluated.
    pub valuations: u64,
    /// First falsifying valuation, in discovery order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<Vec<(String, bool)>>,
}

/// Whether `formula` is true under every valuation.
pub fn is_tautology(formula: &Element) -> Result<bool, LogicError> {
    evaluate(formula, TruthOptions::default(), &CancelToken::new(), None)
        .map(|report| report.tautology)
}

/// Run the enumeration, polling `cancel` between valuations and
/// publishing `valuations / 2^n` into `progress`.
pub fn evaluate(
    formula: &Element,
    options: TruthOptions,
    cancel: &CancelToken,
    progress: Option<&ProgressTracker>,
) -> Result<TruthReport, LogicError> {
    let mut interpretation = Interpretation::new();
    let mut tautology = true;
    let mut valuations: u64 = 0;
    let mut symbols = 0;
    let mut counterexample = None;

    loop {
        cancel.check()?;

        let value = calculate_value(formula, &mut interpretation)?;
        valuations += 1;
        if valuations == 1 {
            symbols = interpretation.len();
        }
        if !value && counterexample.is_none() {
            counterexample = Some(interpretation.assignments().to_vec());
        }
        tautology &= value;

        if let Some(progress) = progress {
            let total = 1u64.checked_shl(symbols as u32).unwrap_or(u64::MAX);
            progress.set_fraction(valuations, total);
            progress.set_location(format!("valuation {valuations} of {total}"));
        }

        if !tautology && options.short_circuit {
            break;
        }
        if !interpretation.advance() {
            break;
        }
    }

    tracing::trace!(symbols, valuations, tautology, "truth evaluation finished");
    Ok(TruthReport {
        tautology,
        symbols,
        valuations,
        counterexample,
    })
}

/// Value of `element` under `interpretation`. Every child of a connective
/// is evaluated, so all symbols are discovered on the first pass.
fn calculate_value(
    element: &Element,
    interpretation: &mut Interpretation,
) -> Result<bool, LogicError> {
    let Some(operator) = element.operator() else {
        return Err(LogicError::MalformedFormula(format!(
            "atom `{element}` is not a formula"
        )));
    };
    let children = element.children();

    match operator {
        ops::AND => {
            let mut result = true;
            for child in children {
                result &= calculate_value(child, interpretation)?;
            }
            Ok(result)
        }
        ops::OR => {
            let mut result = false;
            for child in children {
                result |= calculate_value(child, interpretation)?;
            }
            Ok(result)
        }
        ops::NOT => {
            let mut result = true;
            for child in children {
                result &= !calculate_value(child, interpretation)?;
            }
            Ok(result)
        }
        ops::IMPL => {
            let values = child_values(operator, children, interpretation)?;
            match values.split_last() {
                Some((consequent, antecedents)) => {
                    Ok(*consequent || antecedents.iter().any(|value| !value))
                }
                None => Err(empty(operator)),
            }
        }
        ops::EQUI => {
            let values = child_values(operator, children, interpretation)?;
            match values.split_first() {
                Some((first, rest)) => Ok(rest.iter().all(|value| value == first)),
                None => Err(empty(operator)),
            }
        }
        ops::PREDVAR | ops::PREDCON => match symbol_name(element) {
            Some(name) => Ok(interpretation.value(name)),
            None => Err(LogicError::MalformedFormula(format!(
                "predicate without name: {element}"
            ))),
        },
        op if is_quantifier(op) => Ok(interpretation.value(&element.to_string())),
        op => Err(LogicError::UnsupportedOperator(op.to_string())),
    }
}

fn child_values(
    operator: &str,
    children: &[Element],
    interpretation: &mut Interpretation,
) -> Result<Vec<bool>, LogicError> {
    if children.is_empty() {
        return Err(empty(operator));
    }
    children
        .iter()
        .map(|child| calculate_value(child, interpretation))
        .collect()
}

fn empty(operator: &str) -> LogicError {
    LogicError::MalformedFormula(format!("{operator} without operands"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::subject_variable;
    use hilbert_kernel::Completeness;

    fn p(name: &str) -> Element {
        Element::list(ops::PREDVAR, vec![Element::atom(name)])
    }

    fn op(operator: &str, children: Vec<Element>) -> Element {
        Element::list(operator, children)
    }

    fn report(formula: &Element, short_circuit: bool) -> TruthReport {
        evaluate(
            formula,
            TruthOptions { short_circuit },
            &CancelToken::new(),
            None,
        )
        .expect("formula must evaluate")
    }

    #[test]
    fn excluded_middle_visits_every_valuation() {
        let formula = op(ops::OR, vec![p("A"), op(ops::NOT, vec![p("A")])]);
        let result = report(&formula, false);
        assert!(result.tautology);
        assert_eq!(result.symbols, 1);
        assert_eq!(result.valuations, 2);
        assert!(result.counterexample.is_none());
    }

    #[test]
    fn contradiction_fails_on_first_valuation() {
        let formula = op(ops::AND, vec![p("A"), op(ops::NOT, vec![p("A")])]);
        let result = report(&formula, true);
        assert!(!result.tautology);
        assert_eq!(result.valuations, 1);
        assert_eq!(
            result.counterexample,
            Some(vec![("A".to_string(), false)])
        );

        let exhaustive = report(&formula, false);
        assert!(!exhaustive.tautology);
        assert_eq!(exhaustive.valuations, 2);
    }

    #[test]
    fn propositional_semantics() {
        let a = p("A");
        let b = p("B");
        let tautologies = [
            op(ops::IMPL, vec![a.clone(), a.clone()]),
            op(
                ops::IMPL,
                vec![a.clone(), op(ops::NOT, vec![op(ops::NOT, vec![a.clone()])])],
            ),
            op(
                ops::EQUI,
                vec![
                    op(ops::AND, vec![a.clone(), b.clone()]),
                    op(ops::AND, vec![b.clone(), a.clone()]),
                ],
            ),
        ];
        for formula in &tautologies {
            assert!(is_tautology(formula).expect("evaluates"), "{formula}");
        }

        let non_tautologies = [
            op(ops::IMPL, vec![a.clone(), b.clone()]),
            op(
                ops::EQUI,
                vec![
                    op(ops::AND, vec![a.clone(), b.clone()]),
                    op(ops::OR, vec![b.clone(), a.clone()]),
                ],
            ),
        ];
        for formula in &non_tautologies {
            assert!(!is_tautology(formula).expect("evaluates"), "{formula}");
        }
    }

    #[test]
    fn nary_connectives() {
        let (a, b, c) = (p("A"), p("B"), p("C"));
        // A → B → A: false only if A and B are true and A is false.
        assert!(is_tautology(&op(ops::IMPL, vec![a.clone(), b.clone(), a.clone()])).unwrap());
        // NOT(A, B) is ¬A ∧ ¬B.
        let formula = op(
            ops::EQUI,
            vec![
                op(ops::NOT, vec![a.clone(), b.clone()]),
                op(
                    ops::AND,
                    vec![op(ops::NOT, vec![a.clone()]), op(ops::NOT, vec![b.clone()])],
                ),
            ],
        );
        assert!(is_tautology(&formula).unwrap());
        // A ↔ A ↔ C is not valid.
        assert!(!is_tautology(&op(ops::EQUI, vec![a.clone(), a, c])).unwrap());
    }

    #[test]
    fn predicate_arguments_are_ignored() {
        let x = subject_variable("x");
        let y = subject_variable("y");
        let first = op(ops::PREDVAR, vec![Element::atom("A"), x.clone(), y.clone()]);
        let second = op(ops::PREDVAR, vec![Element::atom("A"), y, x]);
        let result = report(&op(ops::EQUI, vec![first, second]), false);
        assert!(result.tautology);
        assert_eq!(result.symbols, 1);
    }

    #[test]
    fn counter_walks_binary_order() {
        let mut interpretation = Interpretation::new();
        interpretation.value("A");
        interpretation.value("B");
        let mut seen = vec![interpretation.assignments().to_vec()];
        while interpretation.advance() {
            seen.push(interpretation.assignments().to_vec());
        }
        let bits: Vec<(bool, bool)> = seen.iter().map(|v| (v[0].1, v[1].1)).collect();
        assert_eq!(
            bits,
            vec![(false, false), (false, true), (true, false), (true, true)]
        );
        assert!(interpretation.is_empty());
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            is_tautology(&Element::atom("A")),
            Err(LogicError::MalformedFormula(_))
        ));
        assert_eq!(
            is_tautology(&op("CLASS", vec![p("A")])),
            Err(LogicError::UnsupportedOperator("CLASS".to_string()))
        );
        assert!(matches!(
            is_tautology(&op(ops::IMPL, vec![])),
            Err(LogicError::MalformedFormula(_))
        ));
    }

    #[test]
    fn cancellation_stops_enumeration() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let formula = op(ops::OR, vec![p("A"), op(ops::NOT, vec![p("A")])]);
        assert_eq!(
            evaluate(&formula, TruthOptions::default(), &cancel, None),
            Err(LogicError::Cancelled)
        );
    }

    #[test]
    fn progress_reaches_completion() {
        let tracker = ProgressTracker::new();
        let formula = op(
            ops::OR,
            vec![p("A"), p("B"), op(ops::NOT, vec![p("A")])],
        );
        let result = evaluate(
            &formula,
            TruthOptions::default(),
            &CancelToken::new(),
            Some(&tracker),
        )
        .expect("evaluates");
        assert_eq!(result.valuations, 4);
        assert_eq!(tracker.visit_percentage(), 100.0);
        assert_eq!(tracker.location_description(), "valuation 4 of 4");
    }
}
