//! Notifier that records every change it receives.

use lastore_core::{JobChange, JobId, Notifier};
use std::sync::Mutex;

#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<(JobId, JobChange)>>,
}

impl Recorder {
    /// All changes recorded for `id`, in delivery order.
    pub fn for_job(&self, id: &JobId) -> Vec<JobChange> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(j, _)| j == id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Notifier for Recorder {
    fn notify(&self, job_id: &JobId, change: &JobChange) {
        self.seen
            .lock()
            .unwrap()
            .push((job_id.clone(), change.clone()));
    }
}
