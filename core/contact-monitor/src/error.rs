//! Error types for contact-monitor operations.

use std::path::PathBuf;

use crate::source::SnapshotError;

/// All errors that can occur in the monitoring engine.
///
/// Only the one-shot calls (`initialize`, `start_monitoring`) surface these
/// to the caller; the polling loop catches every failure locally and
/// degrades to a logged no-op.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("contacts permission not granted")]
    PermissionDenied,

    #[error("engine not initialized; call initialize() first")]
    NotInitialized,

    #[error("home directory not found")]
    HomeDirNotFound,

    #[error("storage read failed: {path}: {source}")]
    StorageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage write failed: {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state serialization failed: {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("contact snapshot read failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("notification scheduling failed: {0}")]
    Notification(String),

    #[error("background task registration failed: {task_id}: {reason}")]
    BackgroundRegistration { task_id: String, reason: String },
}

/// Convenience alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;
