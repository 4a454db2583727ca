//! Job status state machine.
//!
//! `Ready → working → Succeed → End`, with `Paused` and `Failed` reachable
//! from any working state and `Failed → End`. Which working states exist for
//! a job depends on its operation type: a download job never installs, a
//! remove job never downloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidTransition;
use crate::operation::OperationType;

/// Current state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Ready,
    Downloading,
    Installing,
    Removing,
    Paused,
    Succeed,
    Failed,
    End,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Ready => "ready",
            JobStatus::Downloading => "downloading",
            JobStatus::Installing => "installing",
            JobStatus::Removing => "removing",
            JobStatus::Paused => "paused",
            JobStatus::Succeed => "succeed",
            JobStatus::Failed => "failed",
            JobStatus::End => "end",
        }
    }

    /// True for states in which the driver is actively working on the job.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            JobStatus::Downloading | JobStatus::Installing | JobStatus::Removing
        )
    }

    /// `End` has no outgoing edges.
    pub fn is_terminal(self) -> bool {
        self == JobStatus::End
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working states a job of the given operation type may enter.
pub fn working_states(op: OperationType) -> &'static [JobStatus] {
    match op {
        OperationType::Download | OperationType::UpdateSource => &[JobStatus::Downloading],
        OperationType::Install
        | OperationType::Update
        | OperationType::DistUpgrade
        | OperationType::FixError => &[JobStatus::Downloading, JobStatus::Installing],
        OperationType::Remove => &[JobStatus::Removing],
    }
}

/// Whether `(from, to)` is an edge of the table for jobs of type `op`.
pub fn is_permitted(op: OperationType, from: JobStatus, to: JobStatus) -> bool {
    let working = working_states(op);
    let is_own_working = |s: JobStatus| working.contains(&s);

    match from {
        JobStatus::Ready => {
            is_own_working(to) || matches!(to, JobStatus::Paused | JobStatus::Failed)
        }
        s if is_own_working(s) => {
            (is_own_working(to) && to != s)
                || matches!(to, JobStatus::Paused | JobStatus::Failed | JobStatus::Succeed)
        }
        JobStatus::Paused => {
            is_own_working(to)
                || matches!(to, JobStatus::Ready | JobStatus::Failed | JobStatus::End)
        }
        JobStatus::Failed => matches!(to, JobStatus::Ready | JobStatus::End),
        JobStatus::Succeed => to == JobStatus::End,
        // Working states foreign to `op` are never entered, and End is terminal.
        _ => false,
    }
}

/// Validate the transition `from → to` for a job of type `op`.
pub fn transition(
    op: OperationType,
    from: JobStatus,
    to: JobStatus,
) -> Result<JobStatus, InvalidTransition> {
    if is_permitted(op, from, to) {
        Ok(to)
    } else {
        Err(InvalidTransition { op, from, to })
    }
}
