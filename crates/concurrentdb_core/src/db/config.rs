//! Store location and connection settings.

use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the entity store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite database file on disk.
    File(PathBuf),
    /// Named in-memory database shared by every handle opened with the same
    /// identifier inside this process.
    Memory(String),
}

/// Settings used every time a store handle is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// Store backed by the database file at `path`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// In-memory store addressed by `identifier`.
    ///
    /// Two configs with the same identifier reach the same data while at
    /// least one handle to it is open.
    pub fn memory(identifier: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::Memory(identifier.into()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// In-memory store with a freshly generated identifier.
    pub fn ephemeral() -> Self {
        Self::memory(format!("concurrentdb-{}", Uuid::new_v4()))
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn is_memory(&self) -> bool {
        matches!(self.location, StoreLocation::Memory(_))
    }

    /// Short label used in log events (`file` or `memory`).
    pub(crate) fn mode(&self) -> &'static str {
        match self.location {
            StoreLocation::File(_) => "file",
            StoreLocation::Memory(_) => "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, StoreLocation};
    use std::time::Duration;

    #[test]
    fn ephemeral_configs_do_not_collide() {
        let first = StoreConfig::ephemeral();
        let second = StoreConfig::ephemeral();

        assert!(first.is_memory());
        assert_ne!(first.location, second.location);
    }

    #[test]
    fn builder_overrides_busy_timeout() {
        let config =
            StoreConfig::file("/tmp/store.sqlite3").with_busy_timeout(Duration::from_millis(50));

        assert_eq!(config.busy_timeout, Duration::from_millis(50));
        assert_eq!(
            config.location,
            StoreLocation::File("/tmp/store.sqlite3".into())
        );
        assert_eq!(config.mode(), "file");
    }
}
