//! `lastore replay <script>` – feed a scripted driver session through the engine.
//!
//! The script declares jobs (by a local key), the download sizes the driver
//! reports, and a list of steps: progress samples, cancel requests and
//! retries. Every step goes through the same pump a real driver uses, in
//! script order; every notification is printed as one JSON line.

use anyhow::{Context, Result};
use lastore_core::config::LastoreConfig;
use lastore_core::driver::StaticSizes;
use lastore_core::job::NO_PROGRESS;
use lastore_core::notify::ChannelNotifier;
use lastore_core::pump::{pump_progress, ProgressSample, PumpMessage};
use lastore_core::{Engine, JobId, JobProgressInfo, JobSnapshot, JobStatus, OperationType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    /// Download sizes in bytes, by package.
    #[serde(default)]
    pub sizes: HashMap<String, u64>,
    pub jobs: Vec<ScriptJob>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptJob {
    pub key: String,
    pub package: String,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub lane: String,
}

fn no_progress() -> f64 {
    NO_PROGRESS
}

fn cancelable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Progress {
        job: String,
        #[serde(default)]
        delay_ms: u64,
        status: JobStatus,
        #[serde(default)]
        description: String,
        #[serde(default = "no_progress")]
        progress: f64,
        #[serde(default = "cancelable")]
        cancelable: bool,
    },
    Cancel {
        job: String,
    },
    Retry {
        job: String,
        #[serde(default)]
        as_type: Option<OperationType>,
    },
}

pub fn parse_script(data: &str) -> Result<ReplayScript> {
    let script: ReplayScript = serde_json::from_str(data)?;
    Ok(script)
}

pub async fn run_replay(cfg: &LastoreConfig, path: &Path, no_delay: bool) -> Result<()> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let script = parse_script(&data).with_context(|| format!("parsing {}", path.display()))?;

    let remaining = replay(cfg, script, no_delay).await?;
    for job in remaining {
        println!(
            "# left in {}: {} {} {} ({:.0}%)",
            job.lane,
            job.id,
            job.package_id,
            job.status,
            job.progress * 100.0
        );
    }
    Ok(())
}

/// Run a parsed script to completion and return the jobs still queued.
pub async fn replay(
    cfg: &LastoreConfig,
    script: ReplayScript,
    no_delay: bool,
) -> Result<Vec<JobSnapshot>> {
    let mut driver = StaticSizes::new();
    for (package, bytes) in &script.sizes {
        driver.insert(package.clone(), *bytes);
    }
    let (notifier, mut notifications) = ChannelNotifier::channel(cfg.notify_channel_capacity);
    let engine = Arc::new(Engine::new(cfg, Arc::new(driver), Arc::new(notifier)));

    let printer = tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            match serde_json::to_string(&n) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("could not encode notification: {}", e),
            }
        }
    });

    let mut ids: HashMap<String, JobId> = HashMap::new();
    for job in &script.jobs {
        match engine.create_job(&job.package, job.op_type, &job.lane) {
            Ok(snapshot) => {
                println!("# {} -> {}", job.key, snapshot.id);
                ids.insert(job.key.clone(), snapshot.id);
            }
            Err(e) => eprintln!("# {}: {}", job.key, e),
        }
    }

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let pump = tokio::spawn(pump_progress(Arc::clone(&engine), rx));

    for step in script.steps {
        let (job, msg) = match step {
            Step::Progress {
                job,
                delay_ms,
                status,
                description,
                progress,
                cancelable,
            } => {
                let Some(id) = ids.get(&job) else {
                    eprintln!("# unknown job key {job}");
                    continue;
                };
                if !no_delay && delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                let info = JobProgressInfo {
                    status,
                    description,
                    progress,
                    cancelable,
                };
                let sample = ProgressSample {
                    job_id: id.clone(),
                    info,
                };
                (job, PumpMessage::from(sample))
            }
            Step::Cancel { job } => match ids.get(&job) {
                Some(id) => {
                    let msg = PumpMessage::Cancel(id.clone());
                    (job, msg)
                }
                None => {
                    eprintln!("# unknown job key {job}");
                    continue;
                }
            },
            Step::Retry { job, as_type } => match ids.get(&job) {
                Some(id) => {
                    let msg = PumpMessage::Retry {
                        job_id: id.clone(),
                        as_type,
                    };
                    (job, msg)
                }
                None => {
                    eprintln!("# unknown job key {job}");
                    continue;
                }
            },
        };
        tx.send(msg)
            .await
            .with_context(|| format!("progress pump stopped at a step for {job}"))?;
    }
    drop(tx);

    let changed = pump
        .await
        .map_err(|e| anyhow::anyhow!("pump task join: {}", e))?;
    let remaining = engine.all_jobs();
    drop(engine);
    let _ = printer.await;

    tracing::info!("replay folded {} changing sample(s)", changed);
    Ok(remaining)
}
