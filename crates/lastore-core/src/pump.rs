//! Background loop that feeds driver samples into the engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::Engine;
use crate::id::JobId;
use crate::job::JobProgressInfo;
use crate::operation::OperationType;

/// One driver sample addressed to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub job_id: JobId,
    #[serde(flatten)]
    pub info: JobProgressInfo,
}

/// Work for the pump. Requests are applied in channel order, after every
/// sample sent before them.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpMessage {
    Sample(ProgressSample),
    Cancel(JobId),
    Retry {
        job_id: JobId,
        as_type: Option<OperationType>,
    },
}

impl From<ProgressSample> for PumpMessage {
    fn from(sample: ProgressSample) -> Self {
        PumpMessage::Sample(sample)
    }
}

/// Receives messages until every sender is dropped and applies each to the
/// engine. A bad sample (unknown job, invalid transition) or a refused
/// request is logged and skipped; it never stops the loop. Spawn this with
/// tokio::spawn.
///
/// Returns the number of samples that changed a job.
pub async fn pump_progress(
    engine: Arc<Engine>,
    mut messages: tokio::sync::mpsc::Receiver<PumpMessage>,
) -> u64 {
    let mut changed = 0u64;
    while let Some(msg) = messages.recv().await {
        match msg {
            PumpMessage::Sample(sample) => {
                match engine.submit_progress(&sample.job_id, &sample.info) {
                    Ok(true) => changed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::debug!(job_id = %sample.job_id, "sample dropped: {}", e),
                }
            }
            PumpMessage::Cancel(job_id) => {
                if let Err(e) = engine.cancel(&job_id) {
                    tracing::warn!(job_id = %job_id, "cancel refused: {}", e);
                }
            }
            PumpMessage::Retry { job_id, as_type } => {
                if let Err(e) = engine.retry(&job_id, as_type) {
                    tracing::warn!(job_id = %job_id, "retry refused: {}", e);
                }
            }
        }
    }
    changed
}
