use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One job lane (a `[[lanes]]` table in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Lane name used by callers when creating jobs (e.g. "download").
    pub name: String,
    /// Allow more than one active job per package in this lane.
    #[serde(default)]
    pub allow_duplicate_packages: bool,
    /// Optional cap on the number of jobs held by the lane (None = unbounded).
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl LaneConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_duplicate_packages: false,
            capacity: None,
        }
    }
}

fn default_notify_channel_capacity() -> usize {
    256
}

/// Global configuration loaded from `~/.config/lastore/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastoreConfig {
    /// Buffered notifications before a slow observer starts losing them.
    #[serde(default = "default_notify_channel_capacity")]
    pub notify_channel_capacity: usize,
    /// Job lanes, in display order.
    pub lanes: Vec<LaneConfig>,
}

impl Default for LastoreConfig {
    fn default() -> Self {
        Self {
            notify_channel_capacity: default_notify_channel_capacity(),
            lanes: vec![LaneConfig::new("download"), LaneConfig::new("install")],
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lastore")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LastoreConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LastoreConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<LastoreConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: LastoreConfig = toml::from_str(&data)?;
    Ok(cfg)
}
