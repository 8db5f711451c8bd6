//! Exclusive processing rights over modules.
//!
//! A job blocks a module before it mutates the module's derived state.
//! Blocking is reentrant per job and counted: nested calls of the holder
//! block again and only the outermost unblock frees the module. A request
//! from a different job is refused at once; the arbiter never waits, so it
//! cannot deadlock.

use crate::error::ArbiterError;
use crate::registry::JobId;
use hilbert_kernel::ModuleAddress;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Holder {
    job: JobId,
    depth: usize,
}

#[derive(Debug, Default)]
pub struct ModuleArbiter {
    holders: Mutex<BTreeMap<ModuleAddress, Holder>>,
}

impl ModuleArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `module` for `job`.
    ///
    /// Returns `Ok(true)` if the module was newly blocked, `Ok(false)` if
    /// `job` already held it.
    pub fn block(&self, job: JobId, module: &ModuleAddress) -> Result<bool, ArbiterError> {
        let mut holders = self.holders.lock();
        match holders.get_mut(module) {
            Some(holder) if holder.job == job => {
                holder.depth += 1;
                Ok(false)
            }
            Some(holder) => {
                tracing::debug!(%job, %module, holder = %holder.job, "block refused");
                Err(ArbiterError::AlreadyBlocked {
                    module: module.clone(),
                    holder: holder.job,
                })
            }
            None => {
                holders.insert(module.clone(), Holder { job, depth: 1 });
                tracing::trace!(%job, %module, "module blocked");
                Ok(true)
            }
        }
    }

    /// Release one level of `job`'s hold on `module`.
    ///
    /// Returns `true` when the module became free. Calls from a job that
    /// does not hold the module change nothing.
    pub fn unblock(&self, job: JobId, module: &ModuleAddress) -> bool {
        let mut holders = self.holders.lock();
        let Some(holder) = holders.get_mut(module) else {
            return false;
        };
        if holder.job != job {
            return false;
        }
        holder.depth -= 1;
        if holder.depth > 0 {
            return false;
        }
        holders.remove(module);
        tracing::trace!(%job, %module, "module unblocked");
        true
    }

    pub fn blocked_modules(&self, job: JobId) -> BTreeSet<ModuleAddress> {
        self.holders
            .lock()
            .iter()
            .filter(|(_, holder)| holder.job == job)
            .map(|(module, _)| module.clone())
            .collect()
    }

    pub fn holder(&self, module: &ModuleAddress) -> Option<JobId> {
        self.holders.lock().get(module).map(|holder| holder.job)
    }

    pub fn is_blocked(&self, module: &ModuleAddress) -> bool {
        self.holders.lock().contains_key(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const J1: JobId = JobId(1);
    const J2: JobId = JobId(2);

    fn module(name: &str) -> ModuleAddress {
        ModuleAddress::new(name)
    }

    #[test]
    fn other_jobs_are_refused_until_outermost_unblock() {
        let arbiter = ModuleArbiter::new();
        let m = module("m");

        assert_eq!(arbiter.block(J1, &m), Ok(true));
        assert_eq!(arbiter.block(J1, &m), Ok(false));
        assert_eq!(
            arbiter.block(J2, &m),
            Err(ArbiterError::AlreadyBlocked {
                module: m.clone(),
                holder: J1,
            })
        );

        assert!(!arbiter.unblock(J2, &m));
        assert!(!arbiter.unblock(J1, &m));
        assert_eq!(arbiter.holder(&m), Some(J1));
        assert!(arbiter.block(J2, &m).is_err());

        assert!(arbiter.unblock(J1, &m));
        assert_eq!(arbiter.block(J2, &m), Ok(true));
    }

    #[test]
    fn blocked_modules_per_job() {
        let arbiter = ModuleArbiter::new();
        arbiter.block(J1, &module("a")).expect("free");
        arbiter.block(J1, &module("b")).expect("free");
        arbiter.block(J2, &module("c")).expect("free");

        assert_eq!(
            arbiter.blocked_modules(J1),
            BTreeSet::from([module("a"), module("b")])
        );
        assert_eq!(arbiter.blocked_modules(J2), BTreeSet::from([module("c")]));
        assert!(!arbiter.unblock(J1, &module("missing")));
    }

    #[test]
    fn contention_grants_exactly_one_holder() {
        let arbiter = Arc::new(ModuleArbiter::new());
        let granted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let arbiter = Arc::clone(&arbiter);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    if arbiter.block(JobId(id), &module("shared")) == Ok(true) {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread finished");
        }
        assert_eq!(granted.load(Ordering::SeqCst), 1);
    }
}
