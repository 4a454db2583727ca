//! Error types for the job engine.
//!
//! None of these are fatal to the daemon: they are scoped to a single job,
//! sample or request and surfaced to whoever asked.

use thiserror::Error;

use crate::id::JobId;
use crate::operation::OperationType;
use crate::status::JobStatus;

/// A status change that is not an edge of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition for {op} job: {from} -> {to}")]
pub struct InvalidTransition {
    pub op: OperationType,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// The driver could not report the expected download size of a package.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("size query for {package} failed: {reason}")]
pub struct SizeQueryFailed {
    pub package: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("job not found: {0}")]
    UnknownJob(JobId),

    #[error("lane not found: {0}")]
    UnknownLane(String),

    #[error("job {0} is not cancelable")]
    NotCancelable(JobId),

    #[error("lane {lane} already has an active job for package {package}")]
    DuplicatePackage { lane: String, package: String },

    #[error("lane {lane} is full ({capacity} jobs)")]
    LaneFull { lane: String, capacity: usize },

    #[error("job {0} has ended")]
    TerminalJob(JobId),

    #[error("job {id} is {status}, only failed jobs can be retried")]
    NotFailed { id: JobId, status: JobStatus },
}

pub type Result<T> = std::result::Result<T, EngineError>;
