use crate::support::{exit_with, print_json, read_json_file_or_exit, yes_no};
use hilbert_kernel::{CancelToken, Element};
use hilbert_logic::{TruthOptions, truth};
use serde_json::json;
use std::path::PathBuf;

pub fn run(path: PathBuf, short_circuit: bool, json_output: bool) {
    let formula: Element = read_json_file_or_exit(&path, "formula");
    let options = TruthOptions { short_circuit };
    let report = truth::evaluate(&formula, options, &CancelToken::new(), None)
        .unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "formula": formula.to_string(),
            "shortCircuit": short_circuit,
            "report": report,
        }));
        return;
    }

    println!("hilbert tautology {}", path.display());
    println!("  Formula: {formula}");
    println!("  Tautology: {}", yes_no(report.tautology));
    println!("  Symbols: {}", report.symbols);
    println!("  Valuations: {}", report.valuations);
    if let Some(counterexample) = &report.counterexample {
        let rendered: Vec<String> = counterexample
            .iter()
            .map(|(symbol, value)| format!("{symbol}={value}"))
            .collect();
        println!("  Counterexample: {}", rendered.join(", "));
    }
}
