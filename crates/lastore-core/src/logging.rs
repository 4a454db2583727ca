//! Logging init: append to a file under the XDG state dir, or fall back to stderr.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,lastore_core=debug,lastore=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Per-event writer. Each event gets its own clone of the log file handle;
/// if cloning fails the event goes to stderr instead of being lost.
enum EventWriter {
    File(File),
    Stderr(io::Stderr),
}

impl io::Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EventWriter::File(f) => f.write(buf),
            EventWriter::Stderr(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EventWriter::File(f) => f.flush(),
            EventWriter::Stderr(e) => e.flush(),
        }
    }
}

struct LogFile(File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match self.0.try_clone() {
            Ok(f) => EventWriter::File(f),
            Err(_) => EventWriter::Stderr(io::stderr()),
        }
    }
}

/// `RUST_LOG` if set, otherwise the engine's default filter.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the daemon log: `~/.local/state/lastore/lastore.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lastore")?;
    Ok(xdg_dirs.get_state_home().join("lastore.log"))
}

/// Initialize structured logging to the state-dir log file.
///
/// Returns Err when the file cannot be opened or a subscriber is already
/// installed, so the caller can fall back to `init_logging_stderr`.
pub fn init_logging() -> Result<LogTarget> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log dir {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))?;

    tracing::info!("lastore logging initialized at {}", path.display());
    Ok(LogTarget::File(path))
}

/// Initialize logging to stderr only. Never fails; a second call is a no-op.
pub fn init_logging_stderr() -> LogTarget {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
    LogTarget::Stderr
}
