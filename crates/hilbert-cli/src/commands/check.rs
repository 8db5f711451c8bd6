use crate::support::{exit_with, load_config_or_exit, print_json, read_json_file_or_exit, yes_no};
use hilbert_kernel::{Module, ModuleAddress, Stage};
use hilbert_service::services::{PARAM_RULE_VERSION, PARAM_SHORT_CIRCUIT};
use hilbert_service::{
    JobState, KernelModule, ModuleRepository, ModuleServices, ProcessRegistry, Service,
    ServiceParams,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

const STAGES: [Stage; 3] = [Stage::Dependency, Stage::WellFormed, Stage::FormallyProved];

pub struct Args {
    pub modules: Vec<PathBuf>,
    pub target: String,
    pub service: Service,
    pub config: Option<PathBuf>,
    pub rule_version: Option<String>,
    pub short_circuit: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let config = Arc::new(load_config_or_exit(args.config.as_deref()));
    let repository = Arc::new(ModuleRepository::new());
    for path in &args.modules {
        let module: Module = read_json_file_or_exit(path, "module");
        tracing::debug!(module = %module.address, path = %path.display(), "loaded module");
        repository.insert(module).unwrap_or_else(|e| exit_with(e));
    }
    let target = ModuleAddress::new(args.target.as_str());
    if repository.get(&target).is_none() {
        exit_with(format!("target {target} is not among the given modules"));
    }

    let mut params = ServiceParams::new();
    if let Some(version) = &args.rule_version {
        params.insert(PARAM_RULE_VERSION.to_string(), version.clone());
    }
    if args.short_circuit {
        params.insert(PARAM_SHORT_CIRCUIT.to_string(), "true".to_string());
    }

    let services = ModuleServices::new(Arc::clone(&repository));
    let job = ProcessRegistry::global().create_job(format!("{} {target}", args.service), config);
    let service = args.service;
    let handle = job
        .spawn({
            let target = target.clone();
            move |job| services.run(job, service, &target, params)
        })
        .unwrap_or_else(|e| exit_with(e));
    let state = handle.join();

    let entries: Vec<Arc<KernelModule>> = repository
        .addresses()
        .iter()
        .filter_map(|address| repository.get(address))
        .collect();

    if args.json {
        print_json(&json!({
            "target": target,
            "service": service,
            "job": job.snapshot(),
            "modules": entries.iter().map(|entry| module_payload(entry)).collect::<Vec<_>>(),
        }));
    } else {
        println!("hilbert check {target}");
        println!("  Service: {service}");
        println!("  Job: {} ({state})", job.id());
        let calls = job.calls();
        if let Some(result) = calls.first().and_then(|root| root.service_result()) {
            println!("  Result: {result}");
        }
        println!("  Calls:");
        for call in &calls {
            let indent = "  ".repeat(call.depth());
            let result = call
                .service_result()
                .map(|result| result.to_string())
                .unwrap_or_else(|| "unfinished".to_string());
            println!("    {indent}{} {}: {result}", call.service(), call.module());
        }
        for entry in &entries {
            print_module(entry);
        }
    }

    if state != JobState::Success {
        std::process::exit(1);
    }
}

fn module_payload(entry: &KernelModule) -> Value {
    let errors: serde_json::Map<String, Value> = STAGES
        .iter()
        .filter_map(|stage| {
            let errors = entry.errors(*stage);
            (!errors.is_empty()).then(|| (stage.to_string(), json!(errors)))
        })
        .collect();
    let truth: Vec<Value> = entry
        .truth_reports()
        .into_iter()
        .map(|(label, report)| json!({ "node": label, "report": report }))
        .collect();
    json!({
        "address": entry.address(),
        "states": entry.states(),
        "errors": errors,
        "truth": truth,
    })
}

fn print_module(entry: &KernelModule) {
    let states = entry.states();
    println!("  Module {}:", entry.address());
    for stage in STAGES {
        println!("    {stage}: {}", states.label(stage));
        for error in entry.errors(stage).iter() {
            println!("      - {error}");
        }
    }
    for (label, report) in entry.truth_reports() {
        println!(
            "    tautology {label}: {} ({} valuations)",
            yes_no(report.tautology),
            report.valuations
        );
    }
}
