//! Job engine: creation, progress folding, queries and cancellation.
//!
//! Lock discipline: a job's state mutex is held only while its fields are
//! read or folded. Lane locks may be taken before a job lock (admission
//! checks) but never while one is held, and neither the driver nor the
//! notifier is ever called with a state or lane lock held. Writers of one
//! job also hold its publish lock from the fold until its changes are
//! published, so observers receive changes in fold order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use crate::config::LastoreConfig;
use crate::control::JobControl;
use crate::driver::PackageDriver;
use crate::error::{EngineError, Result};
use crate::id::JobId;
use crate::job::{Job, JobChanges, JobProgressInfo, JobSnapshot};
use crate::notify::Notifier;
use crate::operation::OperationType;
use crate::queue::{JobHandle, Lane, LaneSet};

pub struct Engine {
    lanes: LaneSet,
    index: RwLock<HashMap<JobId, Arc<JobHandle>>>,
    driver: Arc<dyn PackageDriver>,
    notifier: Arc<dyn Notifier>,
    control: JobControl,
}

impl Engine {
    pub fn new(
        cfg: &LastoreConfig,
        driver: Arc<dyn PackageDriver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            lanes: LaneSet::from_config(&cfg.lanes),
            index: RwLock::new(HashMap::new()),
            driver,
            notifier,
            control: JobControl::new(),
        }
    }

    pub fn control(&self) -> &JobControl {
        &self.control
    }

    fn lane(&self, name: &str) -> Result<&Lane> {
        self.lanes
            .get(name)
            .ok_or_else(|| EngineError::UnknownLane(name.to_string()))
    }

    fn handle(&self, id: &JobId) -> Result<Arc<JobHandle>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownJob(id.clone()))
    }

    /// Create a `Ready` job and append it to `lane`.
    ///
    /// Download jobs ask the driver for their expected size first; if that
    /// fails the job is still created, it just never reports a speed.
    pub fn create_job(
        &self,
        package_id: &str,
        op_type: OperationType,
        lane: &str,
    ) -> Result<JobSnapshot> {
        let lane = self.lane(lane)?;

        let effective_size = if op_type.measures_speed() {
            match self.driver.download_size(package_id) {
                Ok(bytes) => bytes as f64,
                Err(e) => {
                    tracing::warn!(package = package_id, "{}; speed will not be reported", e);
                    0.0
                }
            }
        } else {
            0.0
        };

        let job = Job::new(package_id, op_type, lane.name()).with_effective_size(effective_size);
        let snapshot = job.snapshot();
        let handle = Arc::new(JobHandle::new(job));

        // Indexed before it becomes visible in the lane.
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id.clone(), Arc::clone(&handle));
        self.control.register(&snapshot.id);
        if let Err(e) = lane.enqueue(handle) {
            self.forget(&snapshot.id);
            return Err(e);
        }

        tracing::info!(
            job_id = %snapshot.id,
            package = package_id,
            lane = lane.name(),
            "created {} job",
            op_type
        );
        Ok(snapshot)
    }

    /// Fold a driver sample into a job. Returns whether anything changed.
    pub fn submit_progress(&self, id: &JobId, info: &JobProgressInfo) -> Result<bool> {
        self.submit_progress_at(id, info, Instant::now())
    }

    /// Like `submit_progress`, with the sample time supplied by the caller.
    pub fn submit_progress_at(
        &self,
        id: &JobId,
        info: &JobProgressInfo,
        now: Instant,
    ) -> Result<bool> {
        let handle = self.handle(id)?;
        let _ordered = handle.publish_lock();

        let folded = {
            let mut job = handle.lock();
            job.update_at(info, now)
                .map(|changes| (changes, job.status().is_terminal(), job.lane().to_string()))
        };
        let (changes, ended, lane) = match folded {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(job_id = %id, "submit_progress: {}", e);
                return Err(e.into());
            }
        };

        let changed = changes.changed();
        if ended {
            self.reap(id, &lane);
        }
        self.publish(id, changes);
        Ok(changed)
    }

    fn publish(&self, id: &JobId, changes: JobChanges) {
        for change in changes {
            self.notifier.notify(id, &change);
        }
    }

    /// Drop an ended job from its lane, the index and the control registry.
    fn reap(&self, id: &JobId, lane: &str) {
        let remaining = self.lanes.get(lane).map_or(0, |l| {
            l.remove(id);
            l.len()
        });
        self.forget(id);
        tracing::info!(job_id = %id, lane, remaining, "job ended and was removed");
    }

    fn forget(&self, id: &JobId) {
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.control.unregister(id);
    }

    /// Jobs of one lane in submission order.
    pub fn list_jobs(&self, lane: &str) -> Result<Vec<JobSnapshot>> {
        Ok(self.lane(lane)?.snapshot())
    }

    /// Jobs of every lane, lane by lane in configuration order.
    pub fn all_jobs(&self) -> Vec<JobSnapshot> {
        self.lanes.iter().flat_map(|l| l.snapshot()).collect()
    }

    pub fn find_job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.handle(id).ok().map(|h| h.snapshot())
    }

    /// Ask the driver to cancel a job. Only jobs currently flagged
    /// cancelable accept the request; the driver reports the outcome as a
    /// regular progress sample.
    pub fn cancel(&self, id: &JobId) -> Result<()> {
        let handle = self.handle(id)?;
        if !handle.lock().cancelable() {
            return Err(EngineError::NotCancelable(id.clone()));
        }
        if !self.control.request_abort(id) {
            return Err(EngineError::UnknownJob(id.clone()));
        }
        tracing::info!(job_id = %id, "cancel requested");
        Ok(())
    }

    /// Repurpose a job as another operation type.
    pub fn retype(&self, id: &JobId, op_type: OperationType) -> Result<()> {
        let handle = self.handle(id)?;
        let _ordered = handle.publish_lock();
        let change = handle.lock().retype(op_type)?;
        if let Some(change) = change {
            tracing::info!(job_id = %id, "retyped as {}", op_type);
            self.notifier.notify(id, &change);
        }
        Ok(())
    }

    /// Put a failed job back to `Ready`, optionally as another operation type.
    pub fn retry(&self, id: &JobId, as_type: Option<OperationType>) -> Result<()> {
        let handle = self.handle(id)?;
        let _ordered = handle.publish_lock();
        let changes = handle.lock().retry(as_type)?;
        // A retried job may be cancelled again.
        self.control.clear_abort(id);
        tracing::info!(job_id = %id, "retrying failed job");
        self.publish(id, changes);
        Ok(())
    }
}
