//! Boundary to the package-manager driver.

use std::collections::HashMap;

use crate::error::SizeQueryFailed;

/// What the engine asks of the package-manager driver.
///
/// The driver itself performs downloads and installs and pushes progress
/// samples to the engine; the engine only needs the expected download size
/// when a download job is created.
pub trait PackageDriver: Send + Sync {
    /// Total bytes a download of `package_id` is expected to transfer.
    fn download_size(&self, package_id: &str) -> Result<u64, SizeQueryFailed>;
}

/// Driver backed by a fixed table of package sizes. Unknown packages fail
/// the size query.
#[derive(Debug, Clone, Default)]
pub struct StaticSizes {
    sizes: HashMap<String, u64>,
}

impl StaticSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, package_id: impl Into<String>, bytes: u64) -> Self {
        self.sizes.insert(package_id.into(), bytes);
        self
    }

    pub fn insert(&mut self, package_id: impl Into<String>, bytes: u64) {
        self.sizes.insert(package_id.into(), bytes);
    }
}

impl PackageDriver for StaticSizes {
    fn download_size(&self, package_id: &str) -> Result<u64, SizeQueryFailed> {
        self.sizes
            .get(package_id)
            .copied()
            .ok_or_else(|| SizeQueryFailed {
                package: package_id.to_string(),
                reason: "package not in size table".to_string(),
            })
    }
}
