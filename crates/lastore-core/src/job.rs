//! A single tracked package operation and its progress fold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::error::{EngineError, InvalidTransition};
use crate::id::{next_job_id, JobId};
use crate::notify::{JobChange, JobField};
use crate::operation::OperationType;
use crate::status::{self, JobStatus};

/// Progress value meaning "this sample carries no progress information".
pub const NO_PROGRESS: f64 = -1.0;

/// Raw progress sample emitted by the package-manager driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgressInfo {
    pub status: JobStatus,
    #[serde(default)]
    pub description: String,
    /// Fraction in [0, 1], or `NO_PROGRESS`.
    #[serde(default = "no_progress")]
    pub progress: f64,
    #[serde(default = "default_cancelable")]
    pub cancelable: bool,
}

fn no_progress() -> f64 {
    NO_PROGRESS
}

fn default_cancelable() -> bool {
    true
}

impl JobProgressInfo {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            description: String::new(),
            progress: NO_PROGRESS,
            cancelable: true,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }
}

/// Ordered list of the changes one operation made to a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobChanges(Vec<JobChange>);

impl JobChanges {
    pub fn changed(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobChange> {
        self.0.iter()
    }

    pub fn touches(&self, field: JobField) -> bool {
        self.0.iter().any(|c| c.field() == field)
    }

    fn push(&mut self, change: JobChange) {
        self.0.push(change);
    }
}

impl IntoIterator for JobChanges {
    type Item = JobChange;
    type IntoIter = std::vec::IntoIter<JobChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Read-only copy of a job's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub package_id: String,
    pub create_time: i64,
    pub op_type: OperationType,
    pub status: JobStatus,
    pub progress: f64,
    pub description: String,
    pub speed: f64,
    pub effective_size: f64,
    pub cancelable: bool,
    pub lane: String,
}

/// One asynchronous package operation.
///
/// Fields are only mutated through `update`, `retype` and `retry`, so the
/// status always follows the transition table.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    package_id: String,
    create_time: i64,
    op_type: OperationType,
    status: JobStatus,
    progress: f64,
    description: String,
    speed: f64,
    effective_size: f64,
    last_sample_time: Option<Instant>,
    cancelable: bool,
    lane: String,
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

impl Job {
    /// Create a `Ready` job with an id from the process-wide generator.
    pub fn new(package_id: impl Into<String>, op_type: OperationType, lane: impl Into<String>) -> Self {
        Self::with_id(next_job_id(op_type), package_id, op_type, lane)
    }

    pub fn with_id(
        id: JobId,
        package_id: impl Into<String>,
        op_type: OperationType,
        lane: impl Into<String>,
    ) -> Self {
        Self {
            id,
            package_id: package_id.into(),
            create_time: unix_nanos(),
            op_type,
            status: JobStatus::Ready,
            progress: 0.0,
            description: String::new(),
            speed: 0.0,
            effective_size: 0.0,
            last_sample_time: None,
            cancelable: true,
            lane: lane.into(),
        }
    }

    /// Set the byte basis used for speed estimation.
    pub fn with_effective_size(mut self, bytes: f64) -> Self {
        self.effective_size = bytes.max(0.0);
        self
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn create_time(&self) -> i64 {
        self.create_time
    }

    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn effective_size(&self) -> f64 {
        self.effective_size
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn lane(&self) -> &str {
        &self.lane
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            package_id: self.package_id.clone(),
            create_time: self.create_time,
            op_type: self.op_type,
            status: self.status,
            progress: self.progress,
            description: self.description.clone(),
            speed: self.speed,
            effective_size: self.effective_size,
            cancelable: self.cancelable,
            lane: self.lane.clone(),
        }
    }

    fn transition_to(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        self.status = status::transition(self.op_type, self.status, to)?;
        Ok(())
    }

    /// Fold a progress sample taken now.
    pub fn update(&mut self, info: &JobProgressInfo) -> Result<JobChanges, InvalidTransition> {
        self.update_at(info, Instant::now())
    }

    /// Fold a progress sample observed at `now` and return what changed.
    ///
    /// An invalid status change rejects the whole sample: no field is
    /// touched. A job that lands in `Succeed` is moved on to `End` before
    /// returning, so callers see both status changes from a single call.
    pub fn update_at(
        &mut self,
        info: &JobProgressInfo,
        now: Instant,
    ) -> Result<JobChanges, InvalidTransition> {
        let mut changes = JobChanges::default();

        if info.status != self.status {
            self.transition_to(info.status)?;
            changes.push(JobChange::Status(self.status));
        }

        if info.description != self.description {
            self.description = info.description.clone();
            changes.push(JobChange::Description(self.description.clone()));
        }

        if info.progress != NO_PROGRESS && info.progress.is_finite() {
            let progress = info.progress.clamp(0.0, 1.0);
            if progress != self.progress {
                if self.effective_size != 0.0 {
                    let completed = (progress - self.progress) * self.effective_size;
                    let elapsed = self
                        .last_sample_time
                        .map(|t| now.saturating_duration_since(t).as_secs_f64())
                        .unwrap_or(0.0);
                    if elapsed > 0.0 && completed > 0.0 {
                        self.speed = completed / elapsed;
                        changes.push(JobChange::Speed(self.speed));
                    }
                    self.last_sample_time = Some(now);
                }
                self.progress = progress;
                changes.push(JobChange::Progress(progress));
            }
        }

        if info.cancelable != self.cancelable {
            self.cancelable = info.cancelable;
            changes.push(JobChange::Cancelable(self.cancelable));
        }

        tracing::info!("update {} <- {:?}", self, info);

        if self.status == JobStatus::Succeed {
            self.transition_to(JobStatus::End)?;
            changes.push(JobChange::Status(JobStatus::End));
        }

        Ok(changes)
    }

    /// Repurpose the job as a different operation type.
    pub fn retype(&mut self, op_type: OperationType) -> Result<Option<JobChange>, EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::TerminalJob(self.id.clone()));
        }
        if self.op_type == op_type {
            return Ok(None);
        }
        self.op_type = op_type;
        Ok(Some(JobChange::Type(op_type)))
    }

    /// Put a failed job back to `Ready`, optionally as another operation type.
    pub fn retry(&mut self, as_type: Option<OperationType>) -> Result<JobChanges, EngineError> {
        if self.status != JobStatus::Failed {
            return Err(EngineError::NotFailed {
                id: self.id.clone(),
                status: self.status,
            });
        }
        let mut changes = JobChanges::default();
        if let Some(op) = as_type {
            if let Some(change) = self.retype(op)? {
                changes.push(change);
            }
        }
        self.transition_to(JobStatus::Ready)?;
        changes.push(JobChange::Status(JobStatus::Ready));

        self.last_sample_time = None;
        if self.speed != 0.0 {
            self.speed = 0.0;
            changes.push(JobChange::Speed(0.0));
        }
        Ok(changes)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job{{Id:{:?}:{:?},Type:{:?}({},{}), {:?}({:.2})}}@{:?}",
            self.id.as_str(),
            self.package_id,
            self.op_type.as_str(),
            self.cancelable,
            self.status,
            self.description,
            self.progress,
            self.lane,
        )
    }
}
