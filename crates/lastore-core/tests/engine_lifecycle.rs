//! Integration tests: drive the engine the way the package driver does and
//! check what observers see.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};

use common::recorder::Recorder;
use lastore_core::config::{LaneConfig, LastoreConfig};
use lastore_core::driver::StaticSizes;
use lastore_core::job::NO_PROGRESS;
use lastore_core::notify::ChannelNotifier;
use lastore_core::pump::{pump_progress, ProgressSample, PumpMessage};
use lastore_core::status::is_permitted;
use lastore_core::{
    Engine, EngineError, JobChange, JobField, JobId, JobProgressInfo, JobStatus, Notifier,
    OperationType,
};

fn sizes() -> Arc<StaticSizes> {
    Arc::new(StaticSizes::new().with("foo", 1000).with("bar", 4096))
}

fn status_changes(changes: &[JobChange]) -> Vec<JobStatus> {
    changes
        .iter()
        .filter_map(|c| match c {
            JobChange::Status(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn download_scenario_over_notification_channel() {
    let (notifier, mut rx) = ChannelNotifier::channel(64);
    let engine = Engine::new(&LastoreConfig::default(), sizes(), Arc::new(notifier));

    let job = engine
        .create_job("foo", OperationType::Download, "download")
        .unwrap();
    assert!(job.id.as_str().ends_with("DownloadJob"));
    assert_eq!(job.effective_size, 1000.0);

    let t0 = Instant::now();
    let sample = |p| JobProgressInfo::new(JobStatus::Downloading).with_progress(p);
    engine.submit_progress_at(&job.id, &sample(0.1), t0).unwrap();
    engine
        .submit_progress_at(&job.id, &sample(0.6), t0 + Duration::from_secs(2))
        .unwrap();
    drop(engine);

    let mut seen = Vec::new();
    while let Some(n) = rx.recv().await {
        assert_eq!(n.job_id, job.id);
        seen.push(n.change);
    }
    assert_eq!(seen[0], JobChange::Status(JobStatus::Downloading));
    assert_eq!(seen[1], JobChange::Progress(0.1));
    let speed = seen
        .iter()
        .find_map(|c| match c {
            JobChange::Speed(s) => Some(*s),
            _ => None,
        })
        .expect("speed notification");
    assert!((speed - 250.0).abs() < 1e-9);
    assert_eq!(seen.last(), Some(&JobChange::Progress(0.6)));
}

#[test]
fn succeed_is_seen_then_job_disappears() {
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::new(&LastoreConfig::default(), sizes(), recorder.clone());
    let keep = engine
        .create_job("bar", OperationType::Download, "download")
        .unwrap()
        .id;
    let id = engine
        .create_job("foo", OperationType::Download, "download")
        .unwrap()
        .id;

    engine
        .submit_progress(&id, &JobProgressInfo::new(JobStatus::Downloading))
        .unwrap();
    engine
        .submit_progress(
            &id,
            &JobProgressInfo::new(JobStatus::Succeed)
                .with_progress(1.0)
                .with_description("done"),
        )
        .unwrap();

    assert_eq!(
        status_changes(&recorder.for_job(&id)),
        vec![JobStatus::Downloading, JobStatus::Succeed, JobStatus::End]
    );
    let remaining: Vec<_> = engine
        .list_jobs("download")
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(remaining, vec![keep]);
    assert_eq!(engine.cancel(&id), Err(EngineError::UnknownJob(id.clone())));
}

#[test]
fn no_progress_samples_never_notify_progress() {
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::new(&LastoreConfig::default(), sizes(), recorder.clone());
    let id = engine
        .create_job("foo", OperationType::Download, "download")
        .unwrap()
        .id;

    for desc in ["resolving", "connecting", "waiting"] {
        engine
            .submit_progress(
                &id,
                &JobProgressInfo::new(JobStatus::Downloading)
                    .with_progress(NO_PROGRESS)
                    .with_description(desc),
            )
            .unwrap();
    }
    let changes = recorder.for_job(&id);
    assert!(changes.iter().all(|c| c.field() != JobField::Progress));
    assert!(changes.iter().all(|c| c.field() != JobField::Speed));
    assert_eq!(engine.find_job(&id).unwrap().progress, 0.0);
    assert_eq!(engine.find_job(&id).unwrap().description, "waiting");
}

/// Notifier that reads the job back from the engine while being notified.
/// A notifier called under the job lock would deadlock here.
#[derive(Default)]
struct Reentrant {
    engine: OnceLock<Weak<Engine>>,
    observed: Mutex<Vec<JobStatus>>,
}

impl Notifier for Reentrant {
    fn notify(&self, job_id: &JobId, _change: &JobChange) {
        let Some(engine) = self.engine.get().and_then(Weak::upgrade) else {
            return;
        };
        if let Some(job) = engine.find_job(job_id) {
            self.observed.lock().unwrap().push(job.status);
        }
        let _ = engine.list_jobs("download");
    }
}

#[test]
fn notifier_may_query_the_engine() {
    let notifier = Arc::new(Reentrant::default());
    let engine = Arc::new(Engine::new(
        &LastoreConfig::default(),
        sizes(),
        notifier.clone(),
    ));
    notifier.engine.set(Arc::downgrade(&engine)).unwrap();

    let id = engine
        .create_job("foo", OperationType::Download, "download")
        .unwrap()
        .id;
    engine
        .submit_progress(
            &id,
            &JobProgressInfo::new(JobStatus::Downloading).with_progress(0.5),
        )
        .unwrap();
    let observed = notifier.observed.lock().unwrap().clone();
    assert_eq!(observed, vec![JobStatus::Downloading, JobStatus::Downloading]);
}

/// Notifier that looks the job up again when told it ended.
#[derive(Default)]
struct EndWatcher {
    engine: OnceLock<Weak<Engine>>,
    at_end: Mutex<Vec<(Option<JobStatus>, bool)>>,
}

impl Notifier for EndWatcher {
    fn notify(&self, job_id: &JobId, change: &JobChange) {
        if *change != JobChange::Status(JobStatus::End) {
            return;
        }
        let Some(engine) = self.engine.get().and_then(Weak::upgrade) else {
            return;
        };
        let status = engine.find_job(job_id).map(|j| j.status);
        let listed = engine
            .list_jobs("install")
            .unwrap()
            .iter()
            .any(|j| &j.id == job_id);
        self.at_end.lock().unwrap().push((status, listed));
    }
}

#[test]
fn ended_job_is_gone_before_end_is_announced() {
    let notifier = Arc::new(EndWatcher::default());
    let engine = Arc::new(Engine::new(
        &LastoreConfig::default(),
        sizes(),
        notifier.clone(),
    ));
    notifier.engine.set(Arc::downgrade(&engine)).unwrap();

    let id = engine
        .create_job("foo", OperationType::Install, "install")
        .unwrap()
        .id;
    engine
        .submit_progress(&id, &JobProgressInfo::new(JobStatus::Installing))
        .unwrap();
    engine
        .submit_progress(&id, &JobProgressInfo::new(JobStatus::Succeed))
        .unwrap();

    assert_eq!(*notifier.at_end.lock().unwrap(), vec![(None, false)]);
}

#[test]
fn paused_job_can_be_ended() {
    let recorder = Arc::new(Recorder::default());
    let engine = Engine::new(&LastoreConfig::default(), sizes(), recorder.clone());
    let id = engine
        .create_job("foo", OperationType::Download, "download")
        .unwrap()
        .id;

    for status in [JobStatus::Downloading, JobStatus::Paused, JobStatus::End] {
        engine
            .submit_progress(&id, &JobProgressInfo::new(status))
            .unwrap();
    }
    assert_eq!(
        status_changes(&recorder.for_job(&id)),
        vec![JobStatus::Downloading, JobStatus::Paused, JobStatus::End]
    );
    assert!(engine.find_job(&id).is_none());
    assert!(engine.list_jobs("download").unwrap().is_empty());
}

#[test]
fn concurrent_creation_yields_distinct_ids() {
    let cfg = LastoreConfig {
        lanes: vec![LaneConfig {
            name: "download".to_string(),
            allow_duplicate_packages: true,
            capacity: None,
        }],
        ..LastoreConfig::default()
    };
    let engine = Arc::new(Engine::new(&cfg, sizes(), Arc::new(Recorder::default())));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                (0..50)
                    .map(|_| {
                        engine
                            .create_job("foo", OperationType::Download, "download")
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for t in threads {
        for id in t.join().unwrap() {
            assert!(ids.insert(id));
        }
    }
    assert_eq!(ids.len(), 400);
    assert_eq!(engine.list_jobs("download").unwrap().len(), 400);
}

#[test]
fn concurrent_updates_on_one_job_stay_consistent() {
    let recorder = Arc::new(Recorder::default());
    let engine = Arc::new(Engine::new(
        &LastoreConfig::default(),
        sizes(),
        recorder.clone(),
    ));
    let id = engine
        .create_job("bar", OperationType::Download, "download")
        .unwrap()
        .id;

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            std::thread::spawn(move || {
                for step in 0..100 {
                    let p = f64::from(t * 100 + step) / 400.0;
                    let info = JobProgressInfo::new(JobStatus::Downloading)
                        .with_progress(p)
                        .with_description(format!("worker {t}"));
                    engine.submit_progress(&id, &info).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let job = engine.find_job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Downloading);
    assert!(job.description.starts_with("worker "));
    assert!(job.speed >= 0.0);
    // Exactly one Ready -> Downloading transition was observed.
    assert_eq!(
        status_changes(&recorder.for_job(&id)),
        vec![JobStatus::Downloading]
    );
}

/// Keeps the last progress value it was told about. Some values are slow to
/// deliver, so an unordered publisher would let an older value land last.
#[derive(Default)]
struct LastProgress(Mutex<Option<f64>>);

impl Notifier for LastProgress {
    fn notify(&self, _job_id: &JobId, change: &JobChange) {
        if let JobChange::Progress(p) = change {
            if (p * 400.0).round() as u64 % 3 == 0 {
                std::thread::sleep(Duration::from_micros(50));
            }
            *self.0.lock().unwrap() = Some(*p);
        }
    }
}

#[test]
fn last_published_progress_matches_the_job() {
    for round in 0..20 {
        let notifier = Arc::new(LastProgress::default());
        let engine = Arc::new(Engine::new(
            &LastoreConfig::default(),
            sizes(),
            notifier.clone(),
        ));
        let id = engine
            .create_job(&format!("pkg{round}"), OperationType::Download, "download")
            .unwrap()
            .id;

        let threads: Vec<_> = (0..4u32)
            .map(|t| {
                let engine = Arc::clone(&engine);
                let id = id.clone();
                std::thread::spawn(move || {
                    for step in 0..50u32 {
                        let p = f64::from(t * 50 + step + 1) / 400.0;
                        let info = JobProgressInfo::new(JobStatus::Downloading).with_progress(p);
                        engine.submit_progress(&id, &info).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let job = engine.find_job(&id).unwrap();
        assert_eq!(*notifier.0.lock().unwrap(), Some(job.progress), "round {round}");
    }
}

#[test]
fn observed_statuses_follow_the_table() {
    const STATUSES: [JobStatus; 8] = [
        JobStatus::Ready,
        JobStatus::Downloading,
        JobStatus::Installing,
        JobStatus::Removing,
        JobStatus::Paused,
        JobStatus::Succeed,
        JobStatus::Failed,
        JobStatus::End,
    ];
    const OPS: [OperationType; 3] = [
        OperationType::Download,
        OperationType::Install,
        OperationType::Remove,
    ];

    let recorder = Arc::new(Recorder::default());
    let engine = Engine::new(&LastoreConfig::default(), sizes(), recorder.clone());

    // Deterministic pseudo-random sample streams.
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |n: usize| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % n as u64) as usize
    };

    for round in 0..60 {
        let op = OPS[round % OPS.len()];
        let id = engine
            .create_job(&format!("pkg{round}"), op, "install")
            .unwrap()
            .id;
        for _ in 0..40 {
            let status = STATUSES[next(STATUSES.len())];
            match engine.submit_progress(&id, &JobProgressInfo::new(status)) {
                Ok(_) | Err(EngineError::InvalidTransition(_)) => {}
                Err(EngineError::UnknownJob(_)) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let mut from = JobStatus::Ready;
        for to in status_changes(&recorder.for_job(&id)) {
            assert!(is_permitted(op, from, to), "{op}: {from} -> {to}");
            from = to;
        }
        if from == JobStatus::End {
            assert!(engine.find_job(&id).is_none());
        }
    }
    assert!(recorder.len() > 0);
}

#[tokio::test]
async fn pump_feeds_samples_from_driver_tasks() {
    let recorder = Arc::new(Recorder::default());
    let engine = Arc::new(Engine::new(
        &LastoreConfig::default(),
        sizes(),
        recorder.clone(),
    ));
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let pump = tokio::spawn(pump_progress(Arc::clone(&engine), rx));

    let mut drivers = Vec::new();
    for package in ["foo", "bar"] {
        let id = engine
            .create_job(package, OperationType::Install, "install")
            .unwrap()
            .id;
        let tx = tx.clone();
        drivers.push(tokio::spawn(async move {
            for (status, progress) in [
                (JobStatus::Downloading, 0.2),
                (JobStatus::Installing, 0.7),
                (JobStatus::Succeed, 1.0),
            ] {
                tx.send(PumpMessage::from(ProgressSample {
                    job_id: id.clone(),
                    info: JobProgressInfo::new(status).with_progress(progress),
                }))
                .await
                .unwrap();
            }
            id
        }));
    }
    drop(tx);

    let mut ids = Vec::new();
    for d in drivers {
        ids.push(d.await.unwrap());
    }
    assert_eq!(pump.await.unwrap(), 6);
    assert!(engine.list_jobs("install").unwrap().is_empty());
    for id in ids {
        assert_eq!(
            status_changes(&recorder.for_job(&id)),
            vec![
                JobStatus::Downloading,
                JobStatus::Installing,
                JobStatus::Succeed,
                JobStatus::End
            ]
        );
    }
}
