//! Job identity generator.
//!
//! Ids are a process-wide sequence number followed by the operation tag,
//! e.g. `3DownloadJob`. They are not persisted; after a restart the sequence
//! starts again from 1.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::operation::OperationType;

/// Externally visible job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Monotonic id allocator. Every allocation takes the lock once.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    counter: Mutex<u64>,
}

impl JobIdGenerator {
    pub const fn new() -> Self {
        Self {
            counter: Mutex::new(0),
        }
    }

    /// Allocate the next id for a job of type `op`.
    pub fn next(&self, op: OperationType) -> JobId {
        let n = {
            let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            *counter += 1;
            *counter
        };
        JobId(format!("{}{}", n, op.id_tag()))
    }
}

static GLOBAL: JobIdGenerator = JobIdGenerator::new();

/// Allocate an id from the process-wide generator.
pub fn next_job_id(op: OperationType) -> JobId {
    GLOBAL.next(op)
}
