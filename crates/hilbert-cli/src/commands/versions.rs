use crate::support::print_json;
use hilbert_logic::ProofCheckerFactory;
use serde_json::json;

pub fn run(json_output: bool) {
    let versions: Vec<String> = ProofCheckerFactory::new()
        .supported_versions()
        .iter()
        .map(ToString::to_string)
        .collect();

    if json_output {
        print_json(&json!({ "ruleVersions": versions }));
        return;
    }

    println!("Supported rule versions:");
    for version in &versions {
        println!("  - {version}");
    }
}
