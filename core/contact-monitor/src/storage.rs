//! Storage paths for persisted monitor state.
//!
//! All persisted values live under a single root (default
//! `~/.context-crm/monitor/`). Centralizing path decisions here keeps the
//! stores testable: tests inject a temp directory via `with_root()`.

use std::path::{Path, PathBuf};

use crate::error::{MonitorError, Result};

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Resolves the production root under the user's home directory.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().ok_or(MonitorError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".context-crm").join("monitor"),
        })
    }

    /// Creates paths rooted at a custom directory. Used by tests and by
    /// hosts that sandbox app data elsewhere.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted list of already-seen contact IDs.
    pub fn known_contacts_file(&self) -> PathBuf {
        self.root.join("known-contacts.json")
    }

    /// Persisted monitoring-enabled flag.
    pub fn monitoring_file(&self) -> PathBuf {
        self.root.join("monitoring.json")
    }

    /// Dev-host contact list consumed by the file-backed snapshot source.
    pub fn contacts_fixture_file(&self) -> PathBuf {
        self.root.join("contacts.json")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root).map_err(|source| MonitorError::StorageWrite {
            path: self.root.clone(),
            source,
        })
    }
}
