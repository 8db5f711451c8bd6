//! Service jobs: the unit of concurrent execution.
//!
//! A job runs on its own thread and owns the calls it creates. Its
//! cancellation token is shared with every call and polled by the engines;
//! its progress tracker is the completeness capability handed to the
//! innermost running call when someone asks for a percentage.

use crate::arbiter::ModuleArbiter;
use crate::call::{CallSnapshot, ModuleServiceCall, Service, ServiceParams, ServiceResult};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::registry::{JobId, ProcessRegistry};
use hilbert_kernel::{CancelToken, Completeness, ModuleAddress, ProgressTracker};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Terminal-state code of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Interrupted,
    Success,
    Failure,
}

impl JobState {
    pub fn code(self) -> i8 {
        match self {
            Self::Running => 0,
            Self::Interrupted => -1,
            Self::Success => 1,
            Self::Failure => 2,
        }
    }

    fn from_result(result: &ServiceResult) -> Self {
        match result {
            ServiceResult::Ok => Self::Success,
            ServiceResult::Interrupted => Self::Interrupted,
            ServiceResult::Error(_) | ServiceResult::Halted(_) => Self::Failure,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug)]
struct JobInner {
    state: JobState,
    blocked: bool,
    current: Option<Arc<ModuleServiceCall>>,
    calls: Vec<Arc<ModuleServiceCall>>,
}

#[derive(Debug)]
pub struct ServiceJob {
    id: JobId,
    action: String,
    registry: Arc<ProcessRegistry>,
    config: Arc<ServiceConfig>,
    cancel: CancelToken,
    progress: Arc<ProgressTracker>,
    inner: Mutex<JobInner>,
}

impl ServiceJob {
    pub(crate) fn new(
        id: JobId,
        action: String,
        registry: Arc<ProcessRegistry>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            id,
            action,
            registry,
            config,
            cancel: CancelToken::new(),
            progress: Arc::new(ProgressTracker::new()),
            inner: Mutex::new(JobInner {
                state: JobState::Running,
                blocked: false,
                current: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn config(&self) -> &Arc<ServiceConfig> {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Tracker the engines of this job publish progress into.
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    /// Whether the job waits for a module another job holds.
    pub fn is_blocked(&self) -> bool {
        self.inner.lock().blocked
    }

    pub fn was_success(&self) -> bool {
        self.state() == JobState::Success
    }

    pub fn was_failure(&self) -> bool {
        self.state() == JobState::Failure
    }

    pub fn was_interrupted(&self) -> bool {
        self.state() == JobState::Interrupted
    }

    /// Ask the job to stop at its next yield point.
    pub fn interrupt(&self) {
        tracing::info!(job = %self.id, "interrupt requested");
        self.cancel.cancel();
    }

    /// Percentage of the innermost running call.
    pub fn execution_percentage(&self) -> f64 {
        let progress: &dyn Completeness = &*self.progress;
        let inner = self.inner.lock();
        match &inner.current {
            Some(call) => call.execution_percentage(Some(progress)),
            None if inner.state == JobState::Success => 100.0,
            None => inner
                .calls
                .first()
                .map(|root| root.execution_percentage(None))
                .unwrap_or(0.0),
        }
    }

    /// Location of the innermost running call.
    pub fn location(&self) -> String {
        let progress: &dyn Completeness = &*self.progress;
        let inner = self.inner.lock();
        inner
            .current
            .as_ref()
            .map(|call| call.location(Some(progress)))
            .unwrap_or_default()
    }

    pub(crate) fn arbiter(&self) -> &ModuleArbiter {
        self.registry.arbiter()
    }

    pub fn blocked_modules(&self) -> BTreeSet<ModuleAddress> {
        self.registry.arbiter().blocked_modules(self.id)
    }

    pub fn current_call(&self) -> Option<Arc<ModuleServiceCall>> {
        self.inner.lock().current.clone()
    }

    /// Every call this job created, in creation order.
    pub fn calls(&self) -> Vec<Arc<ModuleServiceCall>> {
        self.inner.lock().calls.clone()
    }

    /// Create a call and make it the current one.
    pub fn create_service_call(
        &self,
        service: Service,
        module: ModuleAddress,
        params: ServiceParams,
        parent: Option<Arc<ModuleServiceCall>>,
    ) -> Arc<ModuleServiceCall> {
        let call = Arc::new(ModuleServiceCall::new(
            self.registry.next_call_id(),
            service,
            module,
            Arc::clone(&self.config),
            params,
            self.id,
            self.cancel.clone(),
            parent,
        ));
        let mut inner = self.inner.lock();
        inner.calls.push(Arc::clone(&call));
        inner.current = Some(Arc::clone(&call));
        call
    }

    /// Return to the parent of a finished call.
    pub fn end_service_call(&self, call: &ModuleServiceCall) {
        let mut inner = self.inner.lock();
        if inner.current.as_deref() == Some(call) {
            inner.current = call.parent().cloned();
        }
    }

    /// Block the call's module, retrying refusals per the arbiter config.
    ///
    /// The job counts as blocked while it waits. Cancellation is observed
    /// between attempts.
    pub fn block_module(&self, call: &ModuleServiceCall) -> Result<(), ServiceError> {
        let policy = &self.config.arbiter;
        let mut attempt = 1;
        loop {
            if let Err(cancelled) = self.cancel.check() {
                self.set_blocked(false);
                return Err(cancelled.into());
            }
            match self.registry.arbiter().block(self.id, call.module()) {
                Ok(newly) => {
                    call.set_newly_blocked_module(newly);
                    self.set_blocked(false);
                    return Ok(());
                }
                Err(err) if attempt >= policy.max_attempts => {
                    self.set_blocked(false);
                    tracing::warn!(
                        job = %self.id,
                        module = %call.module(),
                        attempt,
                        "giving up on module block"
                    );
                    return Err(err.into());
                }
                Err(_) => {
                    self.set_blocked(true);
                    tracing::debug!(
                        job = %self.id,
                        module = %call.module(),
                        attempt,
                        "module busy, retrying"
                    );
                    std::thread::sleep(policy.retry_interval());
                    attempt += 1;
                }
            }
        }
    }

    /// Release one level of the call's module hold.
    pub fn unblock_module(&self, call: &ModuleServiceCall) {
        self.registry.arbiter().unblock(self.id, call.module());
    }

    fn set_blocked(&self, blocked: bool) {
        self.inner.lock().blocked = blocked;
    }

    /// Run `work` on the current thread and record the job's terminal state.
    pub fn run(&self, work: impl FnOnce(&ServiceJob) -> ServiceResult) -> JobState {
        tracing::info!(job = %self.id, action = %self.action, "job started");
        let result = work(self);
        let state = if self.cancel.is_cancelled() {
            JobState::Interrupted
        } else {
            JobState::from_result(&result)
        };
        {
            let mut inner = self.inner.lock();
            inner.state = state;
            inner.current = None;
            inner.blocked = false;
        }
        if state == JobState::Success {
            self.progress.set_percentage(100.0);
        }
        tracing::info!(job = %self.id, %state, %result, "job finished");
        state
    }

    /// Run `work` on a dedicated thread.
    pub fn spawn<F>(self: &Arc<Self>, work: F) -> Result<JobHandle, ServiceError>
    where
        F: FnOnce(&ServiceJob) -> ServiceResult + Send + 'static,
    {
        let job = Arc::clone(self);
        let thread = std::thread::Builder::new()
            .name(format!("hilbert-{}", self.id))
            .spawn(move || job.run(work))
            .map_err(ServiceError::Spawn)?;
        Ok(JobHandle {
            job: Arc::clone(self),
            thread,
        })
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let calls = self.calls();
        JobSnapshot {
            id: self.id,
            action: self.action.clone(),
            state: self.state(),
            code: self.state().code(),
            blocked: self.is_blocked(),
            percentage: self.execution_percentage(),
            blocked_modules: self.blocked_modules(),
            calls: calls.iter().map(|call| call.snapshot()).collect(),
        }
    }
}

/// A job running on its own thread.
#[derive(Debug)]
pub struct JobHandle {
    job: Arc<ServiceJob>,
    thread: JoinHandle<JobState>,
}

impl JobHandle {
    pub fn job(&self) -> &Arc<ServiceJob> {
        &self.job
    }

    /// Wait for the job thread. A panicked job counts as failed.
    pub fn join(self) -> JobState {
        match self.thread.join() {
            Ok(state) => state,
            Err(_) => {
                tracing::error!(job = %self.job.id, "job thread panicked");
                self.job.inner.lock().state = JobState::Failure;
                JobState::Failure
            }
        }
    }
}

/// Serializable point-in-time view of a job and its call tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub action: String,
    pub state: JobState,
    pub code: i8,
    pub blocked: bool,
    pub percentage: f64,
    pub blocked_modules: BTreeSet<ModuleAddress>,
    pub calls: Vec<CallSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job_with(config: ServiceConfig) -> (Arc<ProcessRegistry>, Arc<ServiceJob>) {
        let registry = Arc::new(ProcessRegistry::new());
        let job = registry.create_job("test", Arc::new(config));
        (registry, job)
    }

    fn root_call(
        job: &ServiceJob,
        service: Service,
        module: &ModuleAddress,
    ) -> Arc<ModuleServiceCall> {
        job.create_service_call(service, module.clone(), ServiceParams::new(), None)
    }

    #[test]
    fn state_codes() {
        assert_eq!(JobState::Running.code(), 0);
        assert_eq!(JobState::Interrupted.code(), -1);
        assert_eq!(JobState::Success.code(), 1);
        assert_eq!(JobState::Failure.code(), 2);
    }

    #[test]
    fn run_records_terminal_state() {
        let (_, job) = job_with(ServiceConfig::default());
        assert!(job.is_running());
        assert_eq!(job.run(|_| ServiceResult::Ok), JobState::Success);
        assert!(job.was_success());
        assert_eq!(job.execution_percentage(), 100.0);

        let (_, job) = job_with(ServiceConfig::default());
        assert_eq!(job.run(|_| ServiceResult::Error("bad".into())), JobState::Failure);
        assert!(job.was_failure());

        let (_, job) = job_with(ServiceConfig::default());
        let state = job.run(|job| {
            job.interrupt();
            ServiceResult::Interrupted
        });
        assert_eq!(state, JobState::Interrupted);
        assert!(job.was_interrupted());
    }

    #[test]
    fn nested_calls_track_current_and_blocks() {
        let (_, job) = job_with(ServiceConfig::default());
        let module = ModuleAddress::new("m");

        let outer = root_call(&job, Service::CheckFormalProofs, &module);
        job.block_module(&outer).expect("free module");
        let inner = job.create_service_call(
            Service::CheckWellFormed,
            module.clone(),
            ServiceParams::new(),
            Some(Arc::clone(&outer)),
        );
        job.block_module(&inner).expect("reentrant");

        assert!(outer.newly_blocked_module());
        assert!(!inner.newly_blocked_module());
        assert_eq!(job.current_call().map(|call| call.id()), Some(inner.id()));

        job.unblock_module(&inner);
        job.end_service_call(&inner);
        assert_eq!(job.blocked_modules(), BTreeSet::from([module.clone()]));
        assert_eq!(job.current_call().map(|call| call.id()), Some(outer.id()));

        job.unblock_module(&outer);
        job.end_service_call(&outer);
        assert!(job.blocked_modules().is_empty());
        assert!(job.current_call().is_none());
        assert_eq!(job.calls().len(), 2);
    }

    #[test]
    fn refused_block_retries_then_fails() {
        let config = ServiceConfig {
            arbiter: crate::config::ArbiterConfig {
                max_attempts: 3,
                retry_interval_ms: 1,
            },
            ..ServiceConfig::default()
        };
        let registry = Arc::new(ProcessRegistry::new());
        let holder = registry.create_job("holder", Arc::new(config.clone()));
        let waiter = registry.create_job("waiter", Arc::new(config));
        let module = ModuleAddress::new("shared");

        let held = root_call(&holder, Service::LoadRequiredModules, &module);
        holder.block_module(&held).expect("free module");

        let wanted = root_call(&waiter, Service::LoadRequiredModules, &module);
        let err = waiter.block_module(&wanted).expect_err("held by another job");
        assert!(matches!(err, ServiceError::Arbiter(_)));
        assert!(!waiter.is_blocked());
    }

    #[test]
    fn waiting_job_gets_module_after_release() {
        let config = ServiceConfig {
            arbiter: crate::config::ArbiterConfig {
                max_attempts: 200,
                retry_interval_ms: 5,
            },
            ..ServiceConfig::default()
        };
        let registry = Arc::new(ProcessRegistry::new());
        let holder = registry.create_job("holder", Arc::new(config.clone()));
        let waiter = registry.create_job("waiter", Arc::new(config));
        let module = ModuleAddress::new("shared");

        let held = root_call(&holder, Service::LoadRequiredModules, &module);
        holder.block_module(&held).expect("free module");

        let handle = waiter
            .spawn(move |job| {
                let call = root_call(job, Service::LoadRequiredModules, &module);
                match job.block_module(&call) {
                    Ok(()) => {
                        job.unblock_module(&call);
                        ServiceResult::Ok
                    }
                    Err(err) => ServiceResult::Error(err.to_string()),
                }
            })
            .expect("thread starts");

        let mut saw_blocked = false;
        for _ in 0..100 {
            if waiter.is_blocked() {
                saw_blocked = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        holder.unblock_module(&held);

        assert!(saw_blocked);
        assert_eq!(handle.join(), JobState::Success);
    }

    #[test]
    fn interrupt_stops_block_retries() {
        let (_, job) = job_with(ServiceConfig::default());
        let call = root_call(&job, Service::CheckTautologies, &ModuleAddress::new("m"));
        job.interrupt();
        assert!(matches!(job.block_module(&call), Err(ServiceError::Interrupted)));
    }
}
