//! Integration tests: module services run as jobs over a small repository.

use hilbert_kernel::{
    DependencyState, FormallyProvedState, Module, ModuleAddress, Stage, WellFormedState,
};
use hilbert_logic::codes;
use hilbert_service::{
    ArbiterConfig, ArbiterError, JobState, ModuleRepository, ModuleServices, ProcessRegistry,
    Service, ServiceConfig, ServiceError, ServiceJob, ServiceParams, ServiceResult,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pred(name: &str) -> Value {
    json!({"op": "PREDVAR", "args": [name]})
}

fn not(formula: Value) -> Value {
    json!({"op": "NOT", "args": [formula]})
}

fn imp(antecedent: Value, consequent: Value) -> Value {
    json!({"op": "IMPL", "args": [antecedent, consequent]})
}

fn parse(module: Value) -> Module {
    serde_json::from_value(module).unwrap_or_else(|e| panic!("fixture must parse: {e}"))
}

fn add(label: &str, formula: Value, reference: &str) -> Value {
    json!({"label": label, "formula": formula, "reason": {"rule": "ADD", "reference": reference}})
}

/// Axioms `A`, `A → B` and the proposition `B` proved by modus ponens.
fn base() -> Module {
    parse(json!({
        "address": "base",
        "ruleVersion": "0.01.00",
        "rules": [{"name": "ADD", "version": "0.01.00"}, {"name": "MP", "version": "0.01.00"}],
        "nodes": [
            {"label": "ax1", "kind": "axiom", "formula": pred("A")},
            {"label": "ax2", "kind": "axiom", "formula": imp(pred("A"), pred("B"))},
            {"label": "thm", "kind": "proposition", "formula": pred("B"), "proofs": [{"lines": [
                add("1", pred("A"), "ax1"),
                add("2", imp(pred("A"), pred("B")), "ax2"),
                {"label": "3", "formula": pred("B"),
                 "reason": {"rule": "MP", "reference1": "2", "reference2": "1"}}
            ]}]}
        ]
    }))
}

/// Restates `base.thm` through an import.
fn importing(address: &str) -> Module {
    parse(json!({
        "address": address,
        "imports": [{"label": "b", "address": "base"}],
        "rules": [{"name": "ADD", "version": "0.01.00"}],
        "nodes": [
            {"label": "again", "kind": "proposition", "formula": pred("B"), "proofs": [{"lines": [
                add("1", pred("B"), "b.thm")
            ]}]}
        ]
    }))
}

struct Fixture {
    registry: Arc<ProcessRegistry>,
    services: ModuleServices,
}

impl Fixture {
    fn new(modules: Vec<Module>) -> Self {
        let repository = Arc::new(ModuleRepository::new());
        for module in modules {
            repository
                .insert(module)
                .unwrap_or_else(|e| panic!("fixture modules are distinct: {e}"));
        }
        Self {
            registry: Arc::new(ProcessRegistry::new()),
            services: ModuleServices::new(repository),
        }
    }

    fn job(&self) -> Arc<ServiceJob> {
        self.job_with(ServiceConfig::default())
    }

    fn job_with(&self, config: ServiceConfig) -> Arc<ServiceJob> {
        self.registry.create_job("test", Arc::new(config))
    }

    fn run(&self, service: Service, address: &str) -> (Arc<ServiceJob>, JobState) {
        let job = self.job();
        let target = ModuleAddress::new(address);
        let state = job.run(|job| self.services.run(job, service, &target, ServiceParams::new()));
        (job, state)
    }

    /// Hold `address` for a fresh job, as if that job were mid-service.
    fn hold(&self, address: &str) -> Arc<ServiceJob> {
        let holder = self.job();
        self.registry
            .arbiter()
            .block(holder.id(), &ModuleAddress::new(address))
            .unwrap_or_else(|e| panic!("{address} must be free: {e}"));
        holder
    }

    fn release(&self, holder: &ServiceJob, address: &str) {
        self.registry
            .arbiter()
            .unblock(holder.id(), &ModuleAddress::new(address));
    }

    fn states(&self, address: &str) -> hilbert_kernel::ModuleStates {
        self.services
            .repository()
            .get(&ModuleAddress::new(address))
            .unwrap_or_else(|| panic!("{address} is in the repository"))
            .states()
    }

    fn error_codes(&self, address: &str, stage: Stage) -> Vec<u32> {
        self.services
            .repository()
            .get(&ModuleAddress::new(address))
            .unwrap_or_else(|| panic!("{address} is in the repository"))
            .errors(stage)
            .codes()
    }
}

#[test]
fn proofs_across_imports_advance_every_stage() {
    let fixture = Fixture::new(vec![base(), importing("top")]);
    let (job, state) = fixture.run(Service::CheckFormalProofs, "top");

    assert_eq!(state, JobState::Success);
    for address in ["base", "top"] {
        let states = fixture.states(address);
        assert_eq!(states.dependency, DependencyState::LoadedRequiredModules);
        assert_eq!(states.well_formed, WellFormedState::Checked);
        assert_eq!(states.formally_proved, FormallyProvedState::Proved);
    }
    assert!(job.blocked_modules().is_empty());
    assert_eq!(job.execution_percentage(), 100.0);
}

#[test]
fn nested_calls_on_the_held_module_are_not_newly_blocked() {
    let fixture = Fixture::new(vec![base(), importing("top")]);
    let (job, _) = fixture.run(Service::CheckFormalProofs, "top");

    let calls = job.calls();
    let root = &calls[0];
    assert!(root.parent().is_none());
    assert!(root.newly_blocked_module());
    assert_eq!(root.service_result(), Some(ServiceResult::Ok));

    for call in &calls[1..] {
        assert!(call.parent().is_some());
        assert!(call.is_finished());
        let held_by_ancestor = call.currently_processed_modules()[1..].contains(call.module());
        assert_eq!(call.newly_blocked_module(), !held_by_ancestor, "{:?}", call.snapshot());
    }
    let nested_on_top = calls[1..]
        .iter()
        .filter(|call| call.module().as_str() == "top")
        .count();
    assert!(nested_on_top >= 2);
    assert!(calls.iter().any(|call| call.service() == Service::LoadRequiredModules
        && call.module().as_str() == "base"
        && call.newly_blocked_module()));
}

#[test]
fn broken_proof_fails_until_restarted() {
    let fixture = Fixture::new(vec![parse(json!({
        "address": "broken",
        "rules": [{"name": "ADD", "version": "0.01.00"}],
        "nodes": [
            {"label": "ax1", "kind": "axiom", "formula": pred("A")},
            {"label": "bad", "kind": "proposition", "formula": pred("B"), "proofs": [{"lines": [
                add("1", pred("B"), "ax1")
            ]}]}
        ]
    }))]);

    for _ in 0..2 {
        let (job, state) = fixture.run(Service::CheckFormalProofs, "broken");
        assert_eq!(state, JobState::Failure);
        assert!(job.was_failure());
        let states = fixture.states("broken");
        assert_eq!(states.well_formed, WellFormedState::Checked);
        assert_eq!(states.formally_proved, FormallyProvedState::InternalCheckingFailed);
        assert_eq!(
            fixture.error_codes("broken", Stage::FormallyProved),
            vec![codes::FORMULA_MISMATCH]
        );
    }
}

#[test]
fn proposition_without_proof_is_reported() {
    let fixture = Fixture::new(vec![parse(json!({
        "address": "bare",
        "nodes": [{"label": "claim", "kind": "proposition", "formula": pred("A")}]
    }))]);
    let (_, state) = fixture.run(Service::CheckFormalProofs, "bare");
    assert_eq!(state, JobState::Failure);
    assert_eq!(
        fixture.error_codes("bare", Stage::FormallyProved),
        vec![codes::MISSING_PROOF]
    );
}

#[test]
fn malformed_module_never_reaches_proof_checking() {
    let fixture = Fixture::new(vec![parse(json!({
        "address": "malformed",
        "nodes": [{"label": "ax", "kind": "axiom", "formula": "A"}]
    }))]);
    let (job, state) = fixture.run(Service::CheckFormalProofs, "malformed");

    assert_eq!(state, JobState::Failure);
    let states = fixture.states("malformed");
    assert!(states.dependency.is_loaded());
    assert_eq!(states.well_formed, WellFormedState::InternalCheckingFailed);
    assert_eq!(states.formally_proved, FormallyProvedState::Unchecked);
    let rendered = fixture
        .services
        .repository()
        .get(&ModuleAddress::new("malformed"))
        .map(|entry| entry.errors(Stage::WellFormed).to_string())
        .unwrap_or_default();
    insta::assert_snapshot!(
        rendered.trim_end(),
        @"[30150] malformed:node[ax]: bare atom `A` where a formula was expected"
    );
    assert!(matches!(
        job.calls()[0].service_result(),
        Some(ServiceResult::Error(_))
    ));
}

#[test]
fn missing_import_fails_loading() {
    let fixture = Fixture::new(vec![importing("orphan")]);
    let (_, state) = fixture.run(Service::CheckWellFormed, "orphan");

    assert_eq!(state, JobState::Failure);
    let states = fixture.states("orphan");
    assert_eq!(states.dependency, DependencyState::LoadingRequiredModulesFailed);
    assert_eq!(states.well_formed, WellFormedState::Unchecked);
}

#[test]
fn import_cycle_fails_loading() {
    let cyclic = |address: &str, other: &str| {
        parse(json!({
            "address": address,
            "imports": [{"label": "other", "address": other}]
        }))
    };
    let fixture = Fixture::new(vec![cyclic("a", "b"), cyclic("b", "a")]);
    let (job, state) = fixture.run(Service::LoadRequiredModules, "a");

    assert_eq!(state, JobState::Failure);
    assert!(fixture.states("a").dependency.is_failure());
    assert!(fixture.states("b").dependency.is_failure());
    let Some(ServiceResult::Error(message)) = job.calls()[0].service_result() else {
        panic!("root call must fail");
    };
    assert!(message.contains("import cycle"), "{message}");
}

#[test]
fn tautology_reports_are_stored_per_node() {
    let fixture = Fixture::new(vec![parse(json!({
        "address": "props",
        "nodes": [
            {"label": "lem", "kind": "axiom",
             "formula": json!({"op": "OR", "args": [pred("A"), not(pred("A"))]})},
            {"label": "imp", "kind": "axiom", "formula": imp(pred("A"), pred("B"))}
        ]
    }))]);
    let (_, state) = fixture.run(Service::CheckTautologies, "props");
    assert_eq!(state, JobState::Success);

    let reports = fixture
        .services
        .repository()
        .get(&ModuleAddress::new("props"))
        .map(|entry| entry.truth_reports())
        .unwrap_or_default();
    let summary: Vec<(&str, bool, u64)> = reports
        .iter()
        .map(|(label, report)| (label.as_str(), report.tautology, report.valuations))
        .collect();
    assert_eq!(summary, vec![("lem", true, 2), ("imp", false, 4)]);
}

#[test]
fn interrupt_stops_a_running_truth_table() {
    let symbols: Vec<Value> = (0..24).map(|i| pred(&format!("P{i}"))).collect();
    let fixture = Fixture::new(vec![parse(json!({
        "address": "wide",
        "nodes": [
            {"label": "big", "kind": "axiom", "formula": json!({"op": "OR", "args": symbols})}
        ]
    }))]);
    let job = fixture.job();
    let services = fixture.services.clone();
    let handle = job
        .spawn(move |job| {
            let target = ModuleAddress::new("wide");
            services.run(job, Service::CheckTautologies, &target, ServiceParams::new())
        })
        .unwrap_or_else(|e| panic!("job thread must start: {e}"));

    let deadline = Instant::now() + Duration::from_secs(10);
    while !job.location().starts_with("valuation") && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    let percentage = job.execution_percentage();
    assert!(percentage < 100.0, "{percentage}");
    job.interrupt();

    assert_eq!(handle.join(), JobState::Interrupted);
    assert!(job.was_interrupted());
    assert_eq!(job.calls()[0].service_result(), Some(ServiceResult::Interrupted));
    assert!(job.blocked_modules().is_empty());
    let stored = fixture
        .services
        .repository()
        .get(&ModuleAddress::new("wide"))
        .map(|entry| entry.truth_reports().len());
    assert_eq!(stored, Some(0));
}

#[test]
fn concurrent_jobs_share_an_import() {
    let fixture = Fixture::new(vec![base(), importing("left"), importing("right")]);
    let config = ServiceConfig {
        arbiter: ArbiterConfig {
            max_attempts: 400,
            retry_interval_ms: 5,
        },
        ..ServiceConfig::default()
    };

    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|address| {
            let services = fixture.services.clone();
            let target = ModuleAddress::new(address);
            fixture
                .job_with(config.clone())
                .spawn(move |job| {
                    services.run(job, Service::CheckFormalProofs, &target, ServiceParams::new())
                })
                .unwrap_or_else(|e| panic!("job thread must start: {e}"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join(), JobState::Success);
    }
    for address in ["base", "left", "right"] {
        assert!(fixture.states(address).formally_proved.is_proved(), "{address}");
    }
    assert!(fixture.registry.running_jobs().is_empty());
}

#[test]
fn job_snapshot_serializes_the_call_tree() {
    let fixture = Fixture::new(vec![base()]);
    let (job, _) = fixture.run(Service::LoadRequiredModules, "base");

    let snapshot = serde_json::to_value(job.snapshot())
        .unwrap_or_else(|e| panic!("snapshot must serialize: {e}"));
    assert_eq!(snapshot["state"], "success");
    assert_eq!(snapshot["code"], 1);
    assert_eq!(snapshot["calls"][0]["service"], "load-required-modules");
    assert_eq!(snapshot["calls"][0]["module"], "base");
    assert_eq!(snapshot["calls"][0]["result"]["status"], "ok");
}

#[test]
fn unreadable_rule_version_stops_at_well_formedness() {
    let fixture = Fixture::new(vec![parse(json!({
        "address": "odd",
        "rules": [{"name": "MP", "version": "bogus"}],
        "nodes": [{"label": "ax", "kind": "axiom", "formula": pred("A")}]
    }))]);
    let (job, state) = fixture.run(Service::CheckFormalProofs, "odd");

    assert_eq!(state, JobState::Failure);
    let states = fixture.states("odd");
    assert_eq!(states.well_formed, WellFormedState::InternalCheckingFailed);
    assert_eq!(states.formally_proved, FormallyProvedState::Unchecked);
    assert_eq!(
        fixture.error_codes("odd", Stage::WellFormed),
        vec![codes::INVALID_RULE_VERSION]
    );
    assert!(job.blocked_modules().is_empty());
}

#[test]
fn busy_import_halts_without_failing_the_importer() {
    let fixture = Fixture::new(vec![base(), importing("top")]);
    let holder = fixture.hold("base");

    let impatient = fixture.job_with(ServiceConfig {
        arbiter: ArbiterConfig {
            max_attempts: 1,
            retry_interval_ms: 1,
        },
        ..ServiceConfig::default()
    });
    let target = ModuleAddress::new("top");
    let state = impatient.run(|job| {
        fixture
            .services
            .run(job, Service::LoadRequiredModules, &target, ServiceParams::new())
    });

    assert_eq!(state, JobState::Failure);
    let Some(ServiceResult::Halted(message)) = impatient.calls()[0].service_result() else {
        panic!("root call must halt: {:?}", impatient.snapshot());
    };
    assert!(message.contains("already blocked"), "{message}");
    let top = fixture.states("top");
    assert_eq!(top.dependency, DependencyState::Undefined);
    assert!(!top.has_failure());
    assert!(impatient.blocked_modules().is_empty());

    fixture.release(&holder, "base");
    let (_, state) = fixture.run(Service::LoadRequiredModules, "top");
    assert_eq!(state, JobState::Success);
    assert!(fixture.states("top").dependency.is_loaded());
}

#[test]
fn replacing_an_import_waits_for_its_holders() {
    let fixture = Fixture::new(vec![base(), importing("top")]);
    let (_, state) = fixture.run(Service::CheckFormalProofs, "top");
    assert_eq!(state, JobState::Success);

    let holder = fixture.hold("top");
    let editor = fixture.job();
    let repository = fixture.services.repository();
    let refused = repository.replace(&editor, base());
    assert!(
        matches!(
            &refused,
            Err(ServiceError::Arbiter(ArbiterError::AlreadyBlocked { module, .. }))
                if module.as_str() == "top"
        ),
        "{refused:?}"
    );
    assert!(fixture.states("top").formally_proved.is_proved());
    assert!(editor.blocked_modules().is_empty());

    fixture.release(&holder, "top");
    repository
        .replace(&editor, base())
        .unwrap_or_else(|e| panic!("nobody holds top any more: {e}"));
    assert_eq!(fixture.states("top"), hilbert_kernel::ModuleStates::new());
    assert_eq!(fixture.states("base"), hilbert_kernel::ModuleStates::new());

    let (_, state) = fixture.run(Service::CheckFormalProofs, "top");
    assert_eq!(state, JobState::Success);
    assert!(fixture.states("top").formally_proved.is_proved());
}
