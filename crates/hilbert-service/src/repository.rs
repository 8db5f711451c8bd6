//! Loaded modules and their derived verification state.

use crate::error::ServiceError;
use crate::job::ServiceJob;
use hilbert_kernel::{KernelError, Module, ModuleAddress, ModuleStates, Stage, StageEvent};
use hilbert_logic::{CheckErrorList, TruthReport};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A module plus everything the services derived from it.
///
/// Derived state is only written by the job that holds the module in the
/// arbiter; anyone may read it.
#[derive(Debug)]
pub struct KernelModule {
    module: Module,
    states: Mutex<ModuleStates>,
    errors: Mutex<BTreeMap<Stage, CheckErrorList>>,
    truth: Mutex<Vec<(String, TruthReport)>>,
}

impl KernelModule {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            states: Mutex::new(ModuleStates::new()),
            errors: Mutex::new(BTreeMap::new()),
            truth: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> &ModuleAddress {
        &self.module.address
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn states(&self) -> ModuleStates {
        *self.states.lock()
    }

    /// Feed one event into one stage machine.
    pub fn apply(&self, stage: Stage, event: StageEvent) -> Result<(), KernelError> {
        let mut states = self.states.lock();
        states.apply(stage, event)?;
        tracing::debug!(
            module = %self.module.address,
            %stage,
            %event,
            state = states.label(stage),
            "module state changed"
        );
        Ok(())
    }

    /// Start a pass of `stage`.
    ///
    /// Returns `Ok(false)` when the stage already succeeded. A stage left
    /// failed or half-done by an earlier pass is restarted first.
    pub fn begin_stage(&self, stage: Stage) -> Result<bool, KernelError> {
        let states = self.states();
        let (succeeded, initial) = match stage {
            Stage::Dependency => (
                states.dependency.is_loaded(),
                states.dependency == Default::default(),
            ),
            Stage::WellFormed => (
                states.well_formed.is_checked(),
                states.well_formed == Default::default(),
            ),
            Stage::FormallyProved => (
                states.formally_proved.is_proved(),
                states.formally_proved == Default::default(),
            ),
        };
        if succeeded {
            return Ok(false);
        }
        if !initial {
            self.apply(stage, StageEvent::Restart)?;
            self.errors.lock().remove(&stage);
        }
        self.apply(stage, StageEvent::Started)?;
        Ok(true)
    }

    /// Check errors recorded by the last pass of `stage`.
    pub fn errors(&self, stage: Stage) -> CheckErrorList {
        self.errors.lock().get(&stage).cloned().unwrap_or_default()
    }

    pub fn set_errors(&self, stage: Stage, errors: CheckErrorList) {
        self.errors.lock().insert(stage, errors);
    }

    /// Truth reports of the last tautology pass, per node label.
    pub fn truth_reports(&self) -> Vec<(String, TruthReport)> {
        self.truth.lock().clone()
    }

    pub fn set_truth_reports(&self, reports: Vec<(String, TruthReport)>) {
        *self.truth.lock() = reports;
    }

    fn restart(&self) {
        let mut states = self.states.lock();
        if *states != ModuleStates::new() {
            states.restart();
            self.errors.lock().clear();
            tracing::debug!(module = %self.module.address, "module restarted");
        }
    }
}

#[derive(Debug, Default)]
pub struct ModuleRepository {
    modules: Mutex<BTreeMap<ModuleAddress, Arc<KernelModule>>>,
}

impl ModuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module under an address not yet taken.
    pub fn insert(&self, module: Module) -> Result<Arc<KernelModule>, ServiceError> {
        let mut modules = self.modules.lock();
        if modules.contains_key(&module.address) {
            return Err(ServiceError::DuplicateModule(module.address.clone()));
        }
        let entry = Arc::new(KernelModule::new(module));
        modules.insert(entry.address().clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Replace a module on behalf of `job` and restart every module that
    /// imports it, directly or transitively.
    ///
    /// The module and its dependents are blocked for `job` while this
    /// happens. If another job holds any of them nothing changes and the
    /// refusal is returned.
    pub fn replace(
        &self,
        job: &ServiceJob,
        module: Module,
    ) -> Result<Arc<KernelModule>, ServiceError> {
        let address = module.address.clone();
        if self.get(&address).is_none() {
            return Err(ServiceError::UnknownModule(address));
        }
        let dependents = self.dependents(&address);
        let arbiter = job.arbiter();

        let mut targets = vec![&address];
        targets.extend(dependents.iter().map(|entry| entry.address()));
        let mut held: Vec<&ModuleAddress> = Vec::new();
        for target in targets {
            if let Err(err) = arbiter.block(job.id(), target) {
                for address in held {
                    arbiter.unblock(job.id(), address);
                }
                return Err(err.into());
            }
            held.push(target);
        }

        let entry = Arc::new(KernelModule::new(module));
        self.modules
            .lock()
            .insert(address.clone(), Arc::clone(&entry));
        for dependent in &dependents {
            dependent.restart();
        }
        for address in held {
            arbiter.unblock(job.id(), address);
        }
        tracing::debug!(
            job = %job.id(),
            module = %address,
            dependents = dependents.len(),
            "module replaced"
        );
        Ok(entry)
    }

    pub fn get(&self, address: &ModuleAddress) -> Option<Arc<KernelModule>> {
        self.modules.lock().get(address).cloned()
    }

    pub fn addresses(&self) -> Vec<ModuleAddress> {
        self.modules.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }

    /// Modules importing `address`, directly or transitively.
    pub fn dependents(&self, address: &ModuleAddress) -> Vec<Arc<KernelModule>> {
        let modules = self.modules.lock();
        let mut found: Vec<Arc<KernelModule>> = Vec::new();
        let mut frontier = vec![address.clone()];
        while let Some(target) = frontier.pop() {
            for entry in modules.values() {
                let imports_target = entry.module().required_modules().any(|a| *a == target);
                let seen = found.iter().any(|known| known.address() == entry.address());
                if imports_target && !seen {
                    frontier.push(entry.address().clone());
                    found.push(Arc::clone(entry));
                }
            }
        }
        found
    }
}
