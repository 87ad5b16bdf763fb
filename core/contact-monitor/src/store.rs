//! Persistence for the two small monitor state values.
//!
//! Both stores follow the same failure policy: a missing or corrupt file
//! loads as the empty/default state with a warning, and writes go through a
//! temp file plus rename so a crash mid-write never leaves a torn value.
//! The worst case after a lost write is a re-detected contact, which the
//! design prefers over failing the polling loop.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{MonitorError, Result};
use crate::storage::StoragePaths;

/// Persists the set of contact IDs already seen, across process restarts.
/// Serialized as an ordered JSON array.
#[derive(Debug, Clone)]
pub struct KnownContactStore {
    path: PathBuf,
}

impl KnownContactStore {
    pub fn new(paths: &StoragePaths) -> Self {
        Self {
            path: paths.known_contacts_file(),
        }
    }

    pub fn load(&self) -> BTreeSet<String> {
        load_json::<Vec<String>>(&self.path, "known contacts")
            .into_iter()
            .collect()
    }

    pub fn save(&self, known: &BTreeSet<String>) -> Result<()> {
        let ids: Vec<&String> = known.iter().collect();
        save_json(&self.path, &ids, "known contacts")
    }
}

/// Persists whether monitoring is user-enabled, across restarts.
#[derive(Debug, Clone)]
pub struct MonitoringStateStore {
    path: PathBuf,
}

impl MonitoringStateStore {
    pub fn new(paths: &StoragePaths) -> Self {
        Self {
            path: paths.monitoring_file(),
        }
    }

    pub fn load(&self) -> bool {
        load_json::<bool>(&self.path, "monitoring state")
    }

    pub fn save(&self, enabled: bool) -> Result<()> {
        save_json(&self.path, &enabled, "monitoring state")
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Failed to read {}; using default", what);
            return T::default();
        }
    };

    match serde_json::from_slice(&data) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Failed to parse {}; using default", what);
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| MonitorError::StorageWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let payload = serde_json::to_vec_pretty(value).map_err(|source| MonitorError::Serialization {
        context: what.to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(|source| MonitorError::StorageWrite {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| MonitorError::StorageWrite {
        path: path.to_path_buf(),
        source,
    })
}
