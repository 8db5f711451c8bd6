//! Process-wide identity counters and job bookkeeping.

use crate::arbiter::ModuleArbiter;
use crate::config::ServiceConfig;
use crate::job::ServiceJob;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Creation-order identity of a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

/// Creation-order identity of a service job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Owns the id counters and the arbiter every job of the process shares.
#[derive(Debug)]
pub struct ProcessRegistry {
    next_call: AtomicU64,
    next_job: AtomicU64,
    arbiter: Arc<ModuleArbiter>,
    jobs: Mutex<Vec<Weak<ServiceJob>>>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self {
            next_call: AtomicU64::new(1),
            next_job: AtomicU64::new(1),
            arbiter: Arc::new(ModuleArbiter::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<ProcessRegistry> {
        static GLOBAL: OnceLock<Arc<ProcessRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ProcessRegistry::new())).clone()
    }

    pub fn next_call_id(&self) -> CallId {
        CallId(self.next_call.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_job_id(&self) -> JobId {
        JobId(self.next_job.fetch_add(1, Ordering::Relaxed))
    }

    pub fn arbiter(&self) -> &Arc<ModuleArbiter> {
        &self.arbiter
    }

    /// Create and register a job.
    pub fn create_job(
        self: &Arc<Self>,
        action: impl Into<String>,
        config: Arc<ServiceConfig>,
    ) -> Arc<ServiceJob> {
        let job = Arc::new(ServiceJob::new(
            self.next_job_id(),
            action.into(),
            Arc::clone(self),
            config,
        ));
        self.jobs.lock().push(Arc::downgrade(&job));
        job
    }

    /// Live jobs created through this registry, oldest first.
    pub fn jobs(&self) -> Vec<Arc<ServiceJob>> {
        let mut jobs = self.jobs.lock();
        jobs.retain(|job| job.strong_count() > 0);
        jobs.iter().filter_map(Weak::upgrade).collect()
    }

    /// Live jobs still running.
    pub fn running_jobs(&self) -> Vec<Arc<ServiceJob>> {
        self.jobs()
            .into_iter()
            .filter(|job| job.is_running())
            .collect()
    }
}
