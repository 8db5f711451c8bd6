//! The module services a job runs.
//!
//! Every service runs as one call that blocks its module for the job,
//! drives the module's stage machine and records its verdict. Services
//! nest: checking proofs first checks well-formedness, which first loads
//! required modules, and every pass over imports is a child call per
//! import.
//!
//! ```text
//! check_formal_proofs(m)
//!   ├─ check_well_formed(m)
//!   │    ├─ load_required_modules(m)
//!   │    │    └─ load_required_modules(import)…
//!   │    └─ check_well_formed(import)…
//!   └─ check_formal_proofs(import)…
//! ```

use crate::call::{ModuleServiceCall, Service, ServiceParams, ServiceResult};
use crate::error::ServiceError;
use crate::job::ServiceJob;
use crate::repository::{KernelModule, ModuleRepository};
use hilbert_kernel::{Module, ModuleAddress, Stage, StageEvent};
use hilbert_logic::{
    CheckErrorList, ModuleContext, ModuleResolver, ProofCheckerFactory, TruthOptions, codes,
    truth,
};
use std::sync::Arc;

/// Call parameter overriding the configured rule version for modules that
/// declare none.
pub const PARAM_RULE_VERSION: &str = "rule_version";

/// Call parameter overriding the configured short-circuit setting.
pub const PARAM_SHORT_CIRCUIT: &str = "short_circuit";

/// Entry points of the module services, bound to one repository.
#[derive(Debug, Clone)]
pub struct ModuleServices {
    repository: Arc<ModuleRepository>,
}

impl ModuleServices {
    pub fn new(repository: Arc<ModuleRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<ModuleRepository> {
        &self.repository
    }

    /// Run `service` on `module` as the root call of `job`.
    pub fn run(
        &self,
        job: &ServiceJob,
        service: Service,
        module: &ModuleAddress,
        params: ServiceParams,
    ) -> ServiceResult {
        let parent = None;
        match service {
            Service::LoadRequiredModules => self.load_required_modules(job, module, params, parent),
            Service::CheckWellFormed => self.check_well_formed(job, module, params, parent),
            Service::CheckFormalProofs => self.check_formal_proofs(job, module, params, parent),
            Service::CheckTautologies => self.check_tautologies(job, module, params, parent),
        }
    }

    /// Make sure every module `module` imports, directly or transitively,
    /// is present and loaded.
    pub fn load_required_modules(
        &self,
        job: &ServiceJob,
        module: &ModuleAddress,
        params: ServiceParams,
        parent: Option<&Arc<ModuleServiceCall>>,
    ) -> ServiceResult {
        self.run_call(job, Service::LoadRequiredModules, module, params, parent, |call, entry| {
            if in_load_cycle(call) {
                return Ok(ServiceResult::Error(format!(
                    "import cycle through {}",
                    entry.address()
                )));
            }
            if !entry.begin_stage(Stage::Dependency)? {
                return Ok(ServiceResult::Ok);
            }
            let outcome = self.for_each_import(job, call, entry, |import| {
                self.load_required_modules(job, import, call.params().clone(), Some(call))
            });
            let failure = "required modules not loaded";
            self.close_stage(entry, Stage::Dependency, outcome, failure)
        })
    }

    /// Check imports for well-formedness, then the module itself.
    pub fn check_well_formed(
        &self,
        job: &ServiceJob,
        module: &ModuleAddress,
        params: ServiceParams,
        parent: Option<&Arc<ModuleServiceCall>>,
    ) -> ServiceResult {
        self.run_call(job, Service::CheckWellFormed, module, params, parent, |call, entry| {
            let loaded = self.load_required_modules(job, module, call.params().clone(), Some(call));
            if !loaded.is_ok() {
                return prerequisite(loaded);
            }
            if !entry.begin_stage(Stage::WellFormed)? {
                return Ok(ServiceResult::Ok);
            }

            let external = self.for_each_import(job, call, entry, |import| {
                self.check_well_formed(job, import, call.params().clone(), Some(call))
            });
            let external =
                self.close_stage(entry, Stage::WellFormed, external, "imports not well-formed")?;
            if !external.is_ok() {
                return Ok(external);
            }

            let errors = self
                .imported(entry.module())
                .map(|imports| {
                    let resolver = resolver_for(entry.module(), &imports);
                    job.progress()
                        .set_location(format!("{}: well-formedness", entry.address()));
                    let errors = hilbert_logic::check_well_formed(entry.module(), &resolver);
                    job.progress().set_percentage(100.0);
                    errors
                })
                .map_err(|err| abort_stage(entry, Stage::WellFormed, err))?;
            self.record(entry, Stage::WellFormed, errors, "well-formedness")
        })
    }

    /// Check imports' proofs, then every proposition of the module.
    pub fn check_formal_proofs(
        &self,
        job: &ServiceJob,
        module: &ModuleAddress,
        params: ServiceParams,
        parent: Option<&Arc<ModuleServiceCall>>,
    ) -> ServiceResult {
        self.run_call(job, Service::CheckFormalProofs, module, params, parent, |call, entry| {
            let checked = self.check_well_formed(job, module, call.params().clone(), Some(call));
            if !checked.is_ok() {
                return prerequisite(checked);
            }
            if !entry.begin_stage(Stage::FormallyProved)? {
                return Ok(ServiceResult::Ok);
            }

            let external = self.for_each_import(job, call, entry, |import| {
                self.check_formal_proofs(job, import, call.params().clone(), Some(call))
            });
            let external = self.close_stage(
                entry,
                Stage::FormallyProved,
                external,
                "imports not fully proved",
            )?;
            if !external.is_ok() {
                return Ok(external);
            }

            let errors = self
                .check_proofs(job, call, entry)
                .map_err(|err| abort_stage(entry, Stage::FormallyProved, err))?;
            self.record(entry, Stage::FormallyProved, errors, "formal proof")
        })
    }

    /// Evaluate every axiom and proposition as a propositional formula.
    ///
    /// Results are stored on the module. A formula that is not a
    /// tautology is not a failure: predicate-logic axioms rarely are.
    pub fn check_tautologies(
        &self,
        job: &ServiceJob,
        module: &ModuleAddress,
        params: ServiceParams,
        parent: Option<&Arc<ModuleServiceCall>>,
    ) -> ServiceResult {
        self.run_call(job, Service::CheckTautologies, module, params, parent, |call, entry| {
            let checked = self.check_well_formed(job, module, call.params().clone(), Some(call));
            if !checked.is_ok() {
                return prerequisite(checked);
            }

            let options = truth_options(call);
            let mut reports = Vec::new();
            for node in &entry.module().nodes {
                job.cancel_token().check()?;
                let progress = Some(job.progress());
                let report =
                    truth::evaluate(node.formula(), options, job.cancel_token(), progress)?;
                tracing::debug!(
                    module = %entry.address(),
                    node = %node.label,
                    tautology = report.tautology,
                    valuations = report.valuations,
                    "truth table evaluated"
                );
                reports.push((node.label.clone(), report));
            }
            entry.set_truth_reports(reports);
            Ok(ServiceResult::Ok)
        })
    }

    /// Create a call, hold its module for the job while `body` runs and
    /// record the verdict on the call.
    fn run_call<F>(
        &self,
        job: &ServiceJob,
        service: Service,
        module: &ModuleAddress,
        params: ServiceParams,
        parent: Option<&Arc<ModuleServiceCall>>,
        body: F,
    ) -> ServiceResult
    where
        F: FnOnce(
            &Arc<ModuleServiceCall>,
            &Arc<KernelModule>,
        ) -> Result<ServiceResult, ServiceError>,
    {
        let call = job.create_service_call(service, module.clone(), params, parent.cloned());
        call.begin();
        tracing::debug!(
            job = %job.id(),
            call = %call.id(),
            service = service.label(),
            %module,
            "call started"
        );

        let outcome = match self.repository.get(module) {
            None => Err(ServiceError::UnknownModule(module.clone())),
            Some(entry) => match job.block_module(&call) {
                Err(err) => Err(err),
                Ok(()) => {
                    let outcome = body(&call, &entry);
                    job.unblock_module(&call);
                    outcome
                }
            },
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) if err.is_interrupted() => ServiceResult::Interrupted,
            Err(err @ ServiceError::Arbiter(_)) => ServiceResult::Halted(err.to_string()),
            Err(err) => ServiceResult::Error(err.to_string()),
        };
        match &result {
            ServiceResult::Ok => call.finish_ok(),
            ServiceResult::Error(message) => call.finish_error(message.clone()),
            ServiceResult::Halted(message) => call.halt(message.clone()),
            ServiceResult::Interrupted => call.interrupt(),
        }
        job.end_service_call(&call);
        tracing::debug!(job = %job.id(), call = %call.id(), %result, "call finished");
        result
    }

    /// Run `nested` once per import.
    ///
    /// Failed imports are collected. An import that could not be blocked
    /// ends the pass early, as does interruption.
    fn for_each_import(
        &self,
        job: &ServiceJob,
        call: &ModuleServiceCall,
        entry: &KernelModule,
        mut nested: impl FnMut(&ModuleAddress) -> ServiceResult,
    ) -> Result<ImportPass, ServiceError> {
        let mut failures = Vec::new();
        let imports = &entry.module().imports;
        for (index, import) in imports.iter().enumerate() {
            job.cancel_token().check()?;
            job.progress().set_fraction(index as u64, imports.len() as u64);
            job.progress()
                .set_location(format!("{}: import {}", call.module(), import.label));
            match nested(&import.address) {
                ServiceResult::Ok => {}
                ServiceResult::Interrupted => return Err(ServiceError::Interrupted),
                ServiceResult::Halted(message) => {
                    return Ok(ImportPass::Halted(format!("{}: {message}", import.address)));
                }
                ServiceResult::Error(message) => {
                    failures.push(format!("{}: {message}", import.address));
                }
            }
        }
        Ok(ImportPass::Done(failures))
    }

    /// Advance `stage` after a pass over imports.
    ///
    /// A halted or interrupted pass restarts the stage so the next run
    /// begins fresh; only failed imports fail it.
    fn close_stage(
        &self,
        entry: &KernelModule,
        stage: Stage,
        outcome: Result<ImportPass, ServiceError>,
        failure: &str,
    ) -> Result<ServiceResult, ServiceError> {
        match outcome {
            Ok(ImportPass::Done(failures)) if failures.is_empty() => {
                entry.apply(stage, StageEvent::Succeeded)?;
                Ok(ServiceResult::Ok)
            }
            Ok(ImportPass::Done(failures)) => {
                entry.apply(stage, StageEvent::Failed)?;
                Ok(ServiceResult::Error(format!("{failure}: {}", failures.join("; "))))
            }
            Ok(ImportPass::Halted(message)) => {
                entry.apply(stage, StageEvent::Restart)?;
                tracing::info!(module = %entry.address(), %stage, "stage halted on a busy import");
                Ok(ServiceResult::Halted(format!("{failure}: {message}")))
            }
            Err(err) => Err(abort_stage(entry, stage, err)),
        }
    }

    /// Store the errors of an internal pass and advance `stage` by them.
    fn record(
        &self,
        entry: &KernelModule,
        stage: Stage,
        errors: CheckErrorList,
        what: &str,
    ) -> Result<ServiceResult, ServiceError> {
        let count = errors.len();
        entry.set_errors(stage, errors);
        if count == 0 {
            entry.apply(stage, StageEvent::Succeeded)?;
            return Ok(ServiceResult::Ok);
        }
        entry.apply(stage, StageEvent::Failed)?;
        tracing::info!(module = %entry.address(), %stage, errors = count, "check failed");
        Ok(ServiceResult::Error(format!("{count} {what} error(s)")))
    }

    fn imported(
        &self,
        module: &Module,
    ) -> Result<Vec<(String, Arc<KernelModule>)>, ServiceError> {
        module
            .imports
            .iter()
            .map(|import| {
                self.repository
                    .get(&import.address)
                    .map(|entry| (import.label.clone(), entry))
                    .ok_or_else(|| ServiceError::UnknownModule(import.address.clone()))
            })
            .collect()
    }

    fn check_proofs(
        &self,
        job: &ServiceJob,
        call: &ModuleServiceCall,
        entry: &KernelModule,
    ) -> Result<CheckErrorList, ServiceError> {
        let module = entry.module();
        let version = module
            .rule_version
            .clone()
            .or_else(|| call.params().get(PARAM_RULE_VERSION).cloned())
            .unwrap_or_else(|| call.config().proof.default_rule_version.clone());
        let root = ModuleContext::new(module.address.clone());
        let mut errors = CheckErrorList::new();

        let checker = match ProofCheckerFactory::new().create_proof_checker(&version) {
            Ok(checker) => checker,
            Err(err) => {
                errors.add(codes::RULE_VERSION_UNSUPPORTED, err.to_string(), &root);
                return Ok(errors);
            }
        };

        let imports = self.imported(module)?;
        let mut resolver = resolver_for(module, &imports);

        for rule in &module.rules {
            errors.extend(checker.check_rule(rule, &root, &resolver)?);
        }

        for node in module.nodes.iter().filter(|node| !node.is_axiom()) {
            let context = root.join(format!("node[{}]", node.label));
            if node.proofs().is_empty() {
                errors.add(
                    codes::MISSING_PROOF,
                    format!("proposition `{}` has no formal proof", node.label),
                    &context,
                );
                continue;
            }

            let mut failed = CheckErrorList::new();
            let mut proved = false;
            for (index, proof) in node.proofs().iter().enumerate() {
                let found = checker.check_proof(
                    node.formula(),
                    &proof.lines,
                    module,
                    &context.join(format!("proof[{index}]")),
                    &resolver,
                    job.cancel_token(),
                    Some(job.progress()),
                )?;
                if found.is_empty() {
                    proved = true;
                    break;
                }
                failed.extend(found);
            }
            if proved {
                resolver.mark_proved(&node.label);
            } else {
                errors.extend(failed);
            }
        }
        Ok(errors)
    }
}

/// How a pass over a module's imports ended.
enum ImportPass {
    /// Every import was visited; these failed.
    Done(Vec<String>),
    /// An import was held by another job.
    Halted(String),
}

/// Settle a stage whose pass ended in `err`: interruption restarts it,
/// anything else fails it.
fn abort_stage(entry: &KernelModule, stage: Stage, err: ServiceError) -> ServiceError {
    let event = if err.is_interrupted() {
        StageEvent::Restart
    } else {
        StageEvent::Failed
    };
    if let Err(state_err) = entry.apply(stage, event) {
        tracing::warn!(
            module = %entry.address(),
            %stage,
            error = %state_err,
            "stage left unsettled"
        );
    }
    err
}

fn resolver_for<'a>(
    module: &'a Module,
    imports: &'a [(String, Arc<KernelModule>)],
) -> ModuleResolver<'a> {
    imports
        .iter()
        .fold(ModuleResolver::new(module), |resolver, (label, entry)| {
            let proved = entry.states().formally_proved.is_proved();
            resolver.with_import(label.clone(), entry.module(), proved)
        })
}

/// Whether an ancestor call is already loading the same module.
fn in_load_cycle(call: &ModuleServiceCall) -> bool {
    let mut current = call.parent();
    while let Some(ancestor) = current {
        if ancestor.service() == Service::LoadRequiredModules
            && ancestor.module() == call.module()
        {
            return true;
        }
        current = ancestor.parent();
    }
    false
}

/// Pass a failed prerequisite call up as this call's verdict.
fn prerequisite(result: ServiceResult) -> Result<ServiceResult, ServiceError> {
    match result {
        ServiceResult::Interrupted => Err(ServiceError::Interrupted),
        other => Ok(other),
    }
}

fn truth_options(call: &ModuleServiceCall) -> TruthOptions {
    let mut options = call.config().truth.options();
    if let Some(raw) = call.params().get(PARAM_SHORT_CIRCUIT)
        && let Ok(short_circuit) = raw.parse::<bool>()
    {
        options.short_circuit = short_circuit;
    }
    options
}
