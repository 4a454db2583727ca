//! Change notifications for observers of job state.
//!
//! The engine reports every changed field as a `(job id, change)` pair to a
//! `Notifier`. Delivery is fire-and-forget: a notifier cannot fail the update
//! that produced the change, and it is always called with no job lock held.

use serde::Serialize;
use std::fmt;

use crate::id::JobId;
use crate::operation::OperationType;
use crate::status::JobStatus;

/// Observable job property, named as it appears on the property-change bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobField {
    Status,
    Description,
    Progress,
    Speed,
    Cancelable,
    Type,
}

impl JobField {
    pub fn as_str(self) -> &'static str {
        match self {
            JobField::Status => "Status",
            JobField::Description => "Description",
            JobField::Progress => "Progress",
            JobField::Speed => "Speed",
            JobField::Cancelable => "Cancelable",
            JobField::Type => "Type",
        }
    }
}

/// One changed field together with the value it changed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value")]
pub enum JobChange {
    Status(JobStatus),
    Description(String),
    Progress(f64),
    Speed(f64),
    Cancelable(bool),
    Type(OperationType),
}

impl JobChange {
    pub fn field(&self) -> JobField {
        match self {
            JobChange::Status(_) => JobField::Status,
            JobChange::Description(_) => JobField::Description,
            JobChange::Progress(_) => JobField::Progress,
            JobChange::Speed(_) => JobField::Speed,
            JobChange::Cancelable(_) => JobField::Cancelable,
            JobChange::Type(_) => JobField::Type,
        }
    }
}

impl fmt::Display for JobChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobChange::Status(s) => write!(f, "Status={}", s),
            JobChange::Description(d) => write!(f, "Description={:?}", d),
            JobChange::Progress(p) => write!(f, "Progress={:.3}", p),
            JobChange::Speed(s) => write!(f, "Speed={:.1}", s),
            JobChange::Cancelable(c) => write!(f, "Cancelable={}", c),
            JobChange::Type(t) => write!(f, "Type={}", t),
        }
    }
}

/// Receives job changes and republishes them on an external bus.
///
/// A notifier may query the engine, but must not submit progress, retype or
/// retry the job it is being notified about: that job's publish lock is held
/// for the duration of the call.
pub trait Notifier: Send + Sync {
    fn notify(&self, job_id: &JobId, change: &JobChange);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _job_id: &JobId, _change: &JobChange) {}
}

/// A notification as delivered over a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub job_id: JobId,
    #[serde(flatten)]
    pub change: JobChange,
}

/// Forwards notifications into a bounded tokio channel.
///
/// Uses `try_send`: when the consumer lags and the channel is full, or the
/// receiver is gone, the notification is dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: tokio::sync::mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: tokio::sync::mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    /// Create a notifier and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<Notification>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, job_id: &JobId, change: &JobChange) {
        let n = Notification {
            job_id: job_id.clone(),
            change: change.clone(),
        };
        if let Err(e) = self.tx.try_send(n) {
            tracing::trace!(
                job_id = %job_id,
                field = change.field().as_str(),
                "notification dropped: {}",
                e
            );
        }
    }
}
