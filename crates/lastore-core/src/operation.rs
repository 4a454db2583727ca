//! Package operation types carried by jobs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of package operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Download,
    Install,
    Remove,
    Update,
    DistUpgrade,
    UpdateSource,
    FixError,
}

impl OperationType {
    /// Tag appended to the numeric part of a job id, e.g. `3DownloadJob`.
    pub fn id_tag(self) -> &'static str {
        match self {
            OperationType::Download => "DownloadJob",
            OperationType::Install => "InstallJob",
            OperationType::Remove => "RemoveJob",
            OperationType::Update => "UpdateJob",
            OperationType::DistUpgrade => "DistUpgradeJob",
            OperationType::UpdateSource => "UpdateSourceJob",
            OperationType::FixError => "FixErrorJob",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Download => "download",
            OperationType::Install => "install",
            OperationType::Remove => "remove",
            OperationType::Update => "update",
            OperationType::DistUpgrade => "dist_upgrade",
            OperationType::UpdateSource => "update_source",
            OperationType::FixError => "fix_error",
        }
    }

    /// Download jobs get an effective size from the driver and report speed.
    pub fn measures_speed(self) -> bool {
        matches!(self, OperationType::Download)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
