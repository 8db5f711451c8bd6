//! One service applied to one module.
//!
//! Calls form a tree per job: a call started while another call of the
//! same job runs becomes its child. The owning job is the only writer;
//! supervisors read concurrently, so every accessor takes the call's own
//! lock.
//!
//! ```text
//! created ──begin──► running ⇄ paused
//!                       │
//!                       └──finish_ok | finish_error | halt | interrupt──► terminal
//! ```
//!
//! Lifecycle methods called out of state are silent no-ops.

use crate::config::ServiceConfig;
use crate::registry::{CallId, JobId};
use chrono::{DateTime, Utc};
use hilbert_kernel::{CancelToken, Completeness, ModuleAddress, Stage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Free-form call parameters.
pub type ServiceParams = BTreeMap<String, String>;

/// The verification activities a call can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    LoadRequiredModules,
    CheckWellFormed,
    CheckFormalProofs,
    CheckTautologies,
}

impl Service {
    pub fn label(self) -> &'static str {
        match self {
            Self::LoadRequiredModules => "load required modules",
            Self::CheckWellFormed => "check well-formedness",
            Self::CheckFormalProofs => "check formal proofs",
            Self::CheckTautologies => "check tautologies",
        }
    }

    /// State machine the service advances, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::LoadRequiredModules => Some(Stage::Dependency),
            Self::CheckWellFormed => Some(Stage::WellFormed),
            Self::CheckFormalProofs => Some(Stage::FormallyProved),
            Self::CheckTautologies => None,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal outcome of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ServiceResult {
    Ok,
    Error(String),
    Halted(String),
    Interrupted,
}

impl ServiceResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl std::fmt::Display for ServiceResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error(message) => write!(f, "error: {message}"),
            Self::Halted(message) => write!(f, "halted: {message}"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Default)]
struct CallState {
    begin: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    running: bool,
    paused: bool,
    /// Start of the current non-paused interval.
    resumed_at: Option<Instant>,
    accumulated: Duration,
    result: Option<ServiceResult>,
    percentage: f64,
    location: String,
    newly_blocked_module: bool,
}

impl CallState {
    fn close_interval(&mut self) {
        if let Some(resumed_at) = self.resumed_at.take() {
            self.accumulated += resumed_at.elapsed();
        }
    }
}

#[derive(Debug)]
pub struct ModuleServiceCall {
    id: CallId,
    service: Service,
    module: ModuleAddress,
    config: Arc<ServiceConfig>,
    params: ServiceParams,
    job: JobId,
    cancel: CancelToken,
    parent: Option<Arc<ModuleServiceCall>>,
    state: Mutex<CallState>,
}

impl ModuleServiceCall {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: CallId,
        service: Service,
        module: ModuleAddress,
        config: Arc<ServiceConfig>,
        params: ServiceParams,
        job: JobId,
        cancel: CancelToken,
        parent: Option<Arc<ModuleServiceCall>>,
    ) -> Self {
        Self {
            id,
            service,
            module,
            config,
            params,
            job,
            cancel,
            parent,
            state: Mutex::new(CallState::default()),
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn module(&self) -> &ModuleAddress {
        &self.module
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn params(&self) -> &ServiceParams {
        &self.params
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn parent(&self) -> Option<&Arc<ModuleServiceCall>> {
        self.parent.as_ref()
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(call) = current {
            depth += 1;
            current = call.parent.as_deref();
        }
        depth
    }

    /// Modules of this call and its ancestors, innermost first.
    pub fn currently_processed_modules(&self) -> Vec<ModuleAddress> {
        let mut modules = vec![self.module.clone()];
        let mut current = self.parent.as_deref();
        while let Some(call) = current {
            modules.push(call.module.clone());
            current = call.parent.as_deref();
        }
        modules
    }

    pub fn begin(&self) {
        let mut state = self.state.lock();
        if state.running || state.result.is_some() {
            return;
        }
        state.begin = Some(Utc::now());
        state.running = true;
        state.resumed_at = Some(Instant::now());
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if !state.running || state.paused {
            return;
        }
        state.close_interval();
        state.paused = true;
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if !state.running || !state.paused {
            return;
        }
        state.paused = false;
        state.resumed_at = Some(Instant::now());
    }

    pub fn finish_ok(&self) {
        self.terminate(ServiceResult::Ok);
    }

    pub fn finish_error(&self, message: impl Into<String>) {
        self.terminate(ServiceResult::Error(message.into()));
    }

    pub fn halt(&self, message: impl Into<String>) {
        self.terminate(ServiceResult::Halted(message.into()));
    }

    /// Stop with the interrupted result and ask the owning job to stop at
    /// its next yield point.
    pub fn interrupt(&self) {
        if self.terminate(ServiceResult::Interrupted) {
            self.cancel.cancel();
        }
    }

    fn terminate(&self, result: ServiceResult) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            return false;
        }
        state.close_interval();
        state.end = Some(Utc::now());
        state.running = false;
        state.paused = false;
        if result.is_ok() {
            state.percentage = 100.0;
        }
        state.result = Some(result);
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().result.is_some()
    }

    pub fn service_result(&self) -> Option<ServiceResult> {
        self.state.lock().result.clone()
    }

    pub fn begin_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().begin
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().end
    }

    /// Time spent running, excluding paused intervals.
    pub fn duration(&self) -> Duration {
        let state = self.state.lock();
        let open = state
            .resumed_at
            .map(|resumed_at| resumed_at.elapsed())
            .unwrap_or_default();
        state.accumulated + open
    }

    /// Percentage from `completeness` when given, else the last value seen.
    pub fn execution_percentage(&self, completeness: Option<&dyn Completeness>) -> f64 {
        let mut state = self.state.lock();
        if let Some(completeness) = completeness
            && state.running
        {
            state.percentage = completeness.visit_percentage();
        }
        state.percentage
    }

    /// Location from `completeness` when given, else the last value seen.
    pub fn location(&self, completeness: Option<&dyn Completeness>) -> String {
        let mut state = self.state.lock();
        if let Some(completeness) = completeness
            && state.running
        {
            state.location = completeness.location_description();
        }
        state.location.clone()
    }

    pub fn newly_blocked_module(&self) -> bool {
        self.state.lock().newly_blocked_module
    }

    pub(crate) fn set_newly_blocked_module(&self, newly: bool) {
        self.state.lock().newly_blocked_module = newly;
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let state = self.state.lock();
        let open = state
            .resumed_at
            .map(|resumed_at| resumed_at.elapsed())
            .unwrap_or_default();
        CallSnapshot {
            id: self.id,
            parent: self.parent.as_ref().map(|parent| parent.id),
            depth: self.depth(),
            service: self.service,
            module: self.module.clone(),
            begin: state.begin,
            end: state.end,
            duration_ms: (state.accumulated + open).as_millis() as u64,
            percentage: state.percentage,
            location: state.location.clone(),
            newly_blocked_module: state.newly_blocked_module,
            result: state.result.clone(),
        }
    }
}

impl PartialEq for ModuleServiceCall {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleServiceCall {}

impl PartialOrd for ModuleServiceCall {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleServiceCall {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for ModuleServiceCall {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Serializable point-in-time view of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CallId>,
    pub depth: usize,
    pub service: Service,
    pub module: ModuleAddress,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    pub newly_blocked_module: bool,
    pub result: Option<ServiceResult>,
}
