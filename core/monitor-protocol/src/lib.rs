//! Notification payload types and validation for the contact monitor.
//!
//! This crate is shared by the monitoring engine and the host shells that
//! handle notification taps, so both sides agree on the payload schema. The
//! engine is the authority on what it emits, but a tap handler relaunched
//! from cold must be able to reconstruct the detected contact from the
//! notification data alone.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PAYLOAD_VERSION: u32 = 1;
pub const MAX_CONTACT_ID_LEN: usize = 256;

/// Projection of a newly detected contact, queued for delivery to the
/// navigation layer. Carried both in the in-memory pending queue and in the
/// data field of a scheduled local notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingContact {
    /// Platform-assigned contact identifier.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// RFC3339 timestamp of the detection.
    pub detected_at: String,
}

impl PendingContact {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.id.trim().is_empty() {
            return Err(PayloadError::new("invalid_contact_id", "id is required"));
        }
        if self.id.len() > MAX_CONTACT_ID_LEN {
            return Err(PayloadError::new(
                "invalid_contact_id",
                format!("id must be {} characters or fewer", MAX_CONTACT_ID_LEN),
            ));
        }
        if DateTime::parse_from_rfc3339(&self.detected_at).is_err() {
            return Err(PayloadError::new(
                "invalid_timestamp",
                "detected_at must be RFC3339",
            ));
        }
        Ok(())
    }
}

/// Envelope embedded in the notification `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationPayload {
    pub payload_version: u32,
    pub contact: PendingContact,
}

impl NotificationPayload {
    pub fn new(contact: PendingContact) -> Self {
        Self {
            payload_version: PAYLOAD_VERSION,
            contact,
        }
    }

    pub fn to_value(&self) -> Result<Value, PayloadError> {
        serde_json::to_value(self).map_err(|err| {
            PayloadError::new(
                "serialization_failed",
                format!("payload did not serialize: {}", err),
            )
        })
    }
}

/// A local-notification request as handed to the host dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl NotificationRequest {
    /// Builds the request for a detected contact, embedding the round-trip
    /// payload in `data`.
    pub fn for_contact(contact: &PendingContact) -> Result<Self, PayloadError> {
        let display = contact.name.as_deref().unwrap_or("a new contact");
        Ok(Self {
            title: "New contact added".to_string(),
            body: format!("Capture context for {} while it's fresh", display),
            data: NotificationPayload::new(contact.clone()).to_value()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError {
    pub code: String,
    pub message: String,
}

impl PayloadError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PayloadError {}

/// Reconstructs the detected contact from notification tap data.
///
/// Rejects unknown schema versions so a relaunched app never acts on payload
/// shapes it no longer understands.
pub fn parse_notification_payload(data: Value) -> Result<PendingContact, PayloadError> {
    let payload: NotificationPayload = serde_json::from_value(data).map_err(|err| {
        PayloadError::new(
            "invalid_payload",
            format!("notification data is invalid: {}", err),
        )
    })?;
    if payload.payload_version != PAYLOAD_VERSION {
        return Err(PayloadError::new(
            "version_mismatch",
            format!(
                "unsupported payload version {} (expected {})",
                payload.payload_version, PAYLOAD_VERSION
            ),
        ));
    }
    payload.contact.validate()?;
    Ok(payload.contact)
}
