//! Job lanes: named, ordered queues of jobs.
//!
//! A lane keeps its jobs in submission order and tracks membership by id.
//! Each job sits behind its own mutex (`JobHandle`) so updates to unrelated
//! jobs never contend; the lane lock only guards membership.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::config::LaneConfig;
use crate::error::{EngineError, Result};
use crate::id::JobId;
use crate::job::{Job, JobSnapshot};

/// Shared slot for one job. `id` and `package_id` never change, so they are
/// readable without taking the job lock.
///
/// `publish` orders writers: it is taken before the state lock and held
/// until the writer's changes have been handed to the notifier. Readers
/// only take the state lock.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    package_id: String,
    job: Mutex<Job>,
    publish: Mutex<()>,
}

impl JobHandle {
    pub fn new(job: Job) -> Self {
        Self {
            id: job.id().clone(),
            package_id: job.package_id().to_string(),
            job: Mutex::new(job),
            publish: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Lock the job. A poisoned lock is recovered: the job's fields are
    /// only ever written whole by the fold, never left half-updated.
    pub fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize a fold with the publication of its changes.
    pub fn publish_lock(&self) -> MutexGuard<'_, ()> {
        self.publish.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot()
    }
}

/// Admission rules for a lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanePolicy {
    /// Allow several active jobs for the same package.
    pub allow_duplicate_packages: bool,
    /// Maximum number of jobs held by the lane (None = unbounded).
    pub capacity: Option<usize>,
}

/// Ordered queue of jobs for one purpose (e.g. "download").
#[derive(Debug)]
pub struct Lane {
    name: String,
    policy: LanePolicy,
    jobs: RwLock<Vec<Arc<JobHandle>>>,
}

impl Lane {
    pub fn new(name: impl Into<String>, policy: LanePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            jobs: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a job in submission order.
    ///
    /// Rejects jobs that already ended, jobs beyond the lane capacity, and
    /// (unless the policy allows it) a second active job for a package.
    pub fn enqueue(&self, handle: Arc<JobHandle>) -> Result<()> {
        if handle.lock().status().is_terminal() {
            return Err(EngineError::TerminalJob(handle.id().clone()));
        }

        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.policy.capacity {
            if jobs.len() >= capacity {
                return Err(EngineError::LaneFull {
                    lane: self.name.clone(),
                    capacity,
                });
            }
        }
        if !self.policy.allow_duplicate_packages {
            let clash = jobs.iter().any(|j| {
                j.package_id() == handle.package_id() && !j.lock().status().is_terminal()
            });
            if clash {
                return Err(EngineError::DuplicatePackage {
                    lane: self.name.clone(),
                    package: handle.package_id().to_string(),
                });
            }
        }
        jobs.push(handle);
        Ok(())
    }

    /// Remove a job by id, returning its handle if it was in the lane.
    pub fn remove(&self, id: &JobId) -> Option<Arc<JobHandle>> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let pos = jobs.iter().position(|j| j.id() == id)?;
        Some(jobs.remove(pos))
    }

    pub fn find(&self, id: &JobId) -> Option<Arc<JobHandle>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|j| j.id() == id)
            .cloned()
    }

    /// Point-in-time view of the lane in submission order.
    ///
    /// The handle list is copied first and the lane lock released before any
    /// job is locked, so a concurrent removal or a long update never stalls
    /// the lane or invalidates the iteration.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let handles: Vec<Arc<JobHandle>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handles.iter().map(|h| h.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All lanes of an engine, keyed by name. The set of lanes is fixed at
/// construction.
#[derive(Debug, Default)]
pub struct LaneSet {
    lanes: HashMap<String, Lane>,
    order: Vec<String>,
}

impl LaneSet {
    pub fn from_config(lanes: &[LaneConfig]) -> Self {
        let mut set = Self::default();
        for cfg in lanes {
            set.insert(Lane::new(
                cfg.name.clone(),
                LanePolicy {
                    allow_duplicate_packages: cfg.allow_duplicate_packages,
                    capacity: cfg.capacity,
                },
            ));
        }
        set
    }

    /// Add a lane; a lane with the same name is replaced.
    pub fn insert(&mut self, lane: Lane) {
        let name = lane.name().to_string();
        if self.lanes.insert(name.clone(), lane).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Lane> {
        self.lanes.get(name)
    }

    /// Lanes in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Lane> {
        self.order.iter().filter_map(|n| self.lanes.get(n))
    }
}
