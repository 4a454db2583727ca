//! Job-lifecycle engine for the lastore package daemon.
//!
//! Tracks package operations as jobs, folds driver progress samples into
//! them through a validated status state machine, derives download speed,
//! and reports every changed field to a `Notifier`.

pub mod config;
pub mod logging;

pub mod control;
pub mod driver;
pub mod engine;
pub mod error;
pub mod id;
pub mod job;
pub mod notify;
pub mod operation;
pub mod pump;
pub mod queue;
pub mod status;

pub use engine::Engine;
pub use error::{EngineError, InvalidTransition, SizeQueryFailed};
pub use id::JobId;
pub use job::{Job, JobProgressInfo, JobSnapshot};
pub use notify::{JobChange, JobField, Notifier};
pub use operation::OperationType;
pub use status::JobStatus;
