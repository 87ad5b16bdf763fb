//! Contact snapshot capability.
//!
//! The engine never talks to a platform contact API directly; each host
//! supplies a `ContactSnapshotSource`. `FileSnapshotSource` is the adapter
//! for dev machines and the CLI, reading a JSON contact list from disk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A raw contact as reported by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("contacts permission not granted")]
    PermissionDenied,

    #[error("snapshot read failed: {0}")]
    ReadFailed(String),
}

/// Reads the full current contact list from the host platform.
pub trait ContactSnapshotSource: Send + Sync {
    fn list_contacts(&self) -> Result<Vec<ContactRecord>, SnapshotError>;

    /// Whether the host can deliver contact-change events itself. When
    /// true, the scheduler starts no polling timers; the host is expected
    /// to invoke `check_for_new_contacts` on each change event.
    fn supports_change_events(&self) -> bool {
        false
    }
}

/// Snapshot source backed by a JSON file holding an array of
/// `ContactRecord` values. The file stands in for the device contact store
/// on hosts without one.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ContactSnapshotSource for FileSnapshotSource {
    fn list_contacts(&self) -> Result<Vec<ContactRecord>, SnapshotError> {
        let data = match fs_err::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(SnapshotError::PermissionDenied)
            }
            Err(err) => return Err(SnapshotError::ReadFailed(err.to_string())),
        };

        serde_json::from_slice(&data)
            .map_err(|err| SnapshotError::ReadFailed(format!("invalid contact list: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_contact_list_from_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("contacts.json");
        fs_err::write(
            &path,
            br#"[
                {"id": "a", "name": "Ada", "phones": ["+1 555 0100"], "emails": []},
                {"id": "b"}
            ]"#,
        )
        .expect("write fixture");

        let source = FileSnapshotSource::new(path);
        let contacts = source.list_contacts().expect("list contacts");
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].id, "a");
        assert_eq!(contacts[0].name.as_deref(), Some("Ada"));
        assert!(contacts[1].phones.is_empty());
    }

    #[test]
    fn missing_file_is_an_empty_list() {
        let temp = TempDir::new().expect("temp dir");
        let source = FileSnapshotSource::new(temp.path().join("absent.json"));
        assert!(source.list_contacts().expect("list contacts").is_empty());
    }

    #[test]
    fn malformed_file_is_a_read_failure() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("contacts.json");
        fs_err::write(&path, b"not json").expect("write garbage");

        let source = FileSnapshotSource::new(path);
        assert!(matches!(
            source.list_contacts(),
            Err(SnapshotError::ReadFailed(_))
        ));
    }

    #[test]
    fn file_source_does_not_claim_change_events() {
        let temp = TempDir::new().expect("temp dir");
        let source = FileSnapshotSource::new(temp.path().join("contacts.json"));
        assert!(!source.supports_change_events());
    }
}
