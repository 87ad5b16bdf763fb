//! The diffing and classification engine.
//!
//! Each check fetches a full contact snapshot, diffs it against the
//! persisted known-ID set, records newcomers, and routes them according to
//! app lifecycle state: straight to the navigation callback while
//! foregrounded, or into the pending queue plus a local notification while
//! backgrounded. The first classification pass after `initialize()` only
//! records (bootstrap suppression), so a fresh install never fires one
//! notification per pre-existing contact.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use contact_monitor_protocol::{NotificationRequest, PendingContact};

use crate::error::{MonitorError, Result};
use crate::notify::NotificationDispatcher;
use crate::source::{ContactRecord, ContactSnapshotSource, SnapshotError};
use crate::storage::StoragePaths;
use crate::store::KnownContactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Uninitialized,
    Initializing,
    Monitoring,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppLifecycle {
    Foreground,
    Background,
}

/// Single registered slot; re-registering overwrites, never composes.
pub type NavigationCallback = Arc<dyn Fn(PendingContact) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub phase: MonitorPhase,
    pub lifecycle: AppLifecycle,
    pub bootstrap_complete: bool,
    pub known_contacts: usize,
    pub pending_contacts: usize,
}

struct DetectorState {
    phase: MonitorPhase,
    lifecycle: AppLifecycle,
    monitoring_requested: bool,
    bootstrap_complete: bool,
    check_in_flight: bool,
    known: BTreeSet<String>,
    pending: VecDeque<PendingContact>,
    callback: Option<NavigationCallback>,
}

/// Routing work computed under the state lock, executed after it is
/// released so a callback can safely call back into the detector.
enum Delivery {
    Navigate(NavigationCallback, PendingContact),
    Notify(PendingContact),
}

pub struct ContactChangeDetector {
    source: Arc<dyn ContactSnapshotSource>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    known_store: KnownContactStore,
    state: Mutex<DetectorState>,
}

impl ContactChangeDetector {
    pub fn new(
        source: Arc<dyn ContactSnapshotSource>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        paths: &StoragePaths,
    ) -> Self {
        Self {
            source,
            dispatcher,
            known_store: KnownContactStore::new(paths),
            state: Mutex::new(DetectorState {
                phase: MonitorPhase::Uninitialized,
                lifecycle: AppLifecycle::Foreground,
                monitoring_requested: false,
                bootstrap_complete: false,
                check_in_flight: false,
                known: BTreeSet::new(),
                pending: VecDeque::new(),
                callback: None,
            }),
        }
    }

    /// Loads persisted state and runs the bootstrap scan. Safe to call
    /// again once initialized (no-op). Permission denial during the scan is
    /// surfaced so the UI layer can prompt; every other failure degrades to
    /// a logged empty scan.
    pub fn initialize(&self) -> Result<()> {
        {
            let Ok(mut state) = self.state.lock() else {
                warn!("Detector state lock poisoned; skipping initialize");
                return Ok(());
            };
            if state.phase != MonitorPhase::Uninitialized {
                debug!("Detector already initialized");
                return Ok(());
            }
            state.known = self.known_store.load();
            state.phase = MonitorPhase::Initializing;
            info!(known = state.known.len(), "Detector initialized");
        }

        match self.run_check() {
            Ok(_) => Ok(()),
            Err(MonitorError::Snapshot(SnapshotError::PermissionDenied)) => {
                Err(MonitorError::PermissionDenied)
            }
            Err(err) => {
                warn!(error = %err, "Bootstrap scan failed; will retry on next poll");
                Ok(())
            }
        }
    }

    /// Polls the snapshot source once. Never fails: snapshot errors are
    /// logged and count as zero new contacts, and a call while a previous
    /// check is still running is a no-op.
    pub fn check_for_new_contacts(&self) -> Result<()> {
        if let Err(err) = self.run_check() {
            warn!(error = %err, "Contact check failed; treating as zero new contacts");
        }
        Ok(())
    }

    fn run_check(&self) -> Result<usize> {
        {
            let Ok(mut state) = self.state.lock() else {
                warn!("Detector state lock poisoned; skipping check");
                return Ok(0);
            };
            if state.phase == MonitorPhase::Uninitialized {
                debug!("Check requested before initialize; skipping");
                return Ok(0);
            }
            if state.check_in_flight {
                debug!("Check already in flight; skipping");
                return Ok(0);
            }
            state.check_in_flight = true;
        }

        let contacts = match self.source.list_contacts() {
            Ok(contacts) => contacts,
            Err(err) => {
                self.clear_in_flight();
                return Err(err.into());
            }
        };

        let mut deliveries = Vec::new();
        let new_count;
        {
            let Ok(mut state) = self.state.lock() else {
                warn!("Detector state lock poisoned; dropping check results");
                return Ok(0);
            };

            // Snapshot-source iteration order is the routing order.
            let new_records: Vec<ContactRecord> = contacts
                .into_iter()
                .filter(|contact| !state.known.contains(&contact.id))
                .collect();
            new_count = new_records.len();

            for record in &new_records {
                state.known.insert(record.id.clone());
            }
            // One batched write per tick, before any routing, so a crash
            // during routing cannot re-detect these contacts later.
            if !new_records.is_empty() {
                if let Err(err) = self.known_store.save(&state.known) {
                    warn!(error = %err, "Failed to persist known contacts");
                }
            }

            if !state.bootstrap_complete {
                state.bootstrap_complete = true;
                if state.phase == MonitorPhase::Initializing && state.monitoring_requested {
                    state.phase = MonitorPhase::Monitoring;
                }
                info!(
                    recorded = new_count,
                    "Bootstrap scan complete; routing suppressed"
                );
            } else {
                let callback = if state.lifecycle == AppLifecycle::Foreground {
                    state.callback.clone()
                } else {
                    None
                };
                for record in new_records {
                    let contact = project_contact(&record);
                    match &callback {
                        Some(callback) => {
                            deliveries.push(Delivery::Navigate(Arc::clone(callback), contact));
                        }
                        None => {
                            state.pending.push_back(contact.clone());
                            deliveries.push(Delivery::Notify(contact));
                        }
                    }
                }
                if new_count > 0 {
                    info!(new = new_count, "New contacts detected");
                }
            }

            state.check_in_flight = false;
        }

        for delivery in deliveries {
            self.execute(delivery);
        }
        Ok(new_count)
    }

    fn execute(&self, delivery: Delivery) {
        match delivery {
            Delivery::Navigate(callback, contact) => callback(contact),
            Delivery::Notify(contact) => match NotificationRequest::for_contact(&contact) {
                Ok(request) => {
                    if let Err(err) = self.dispatcher.schedule(&request) {
                        warn!(error = %err, contact = %contact.id, "Failed to schedule notification");
                    }
                }
                Err(err) => {
                    warn!(error = %err, contact = %contact.id, "Failed to build notification payload");
                }
            },
        }
    }

    fn clear_in_flight(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.check_in_flight = false;
        }
    }

    /// Registers the navigation callback. Last registration wins.
    pub fn set_navigation_callback(&self, callback: NavigationCallback) {
        if let Ok(mut state) = self.state.lock() {
            state.callback = Some(callback);
        }
    }

    pub fn set_lifecycle(&self, lifecycle: AppLifecycle) {
        if let Ok(mut state) = self.state.lock() {
            if state.lifecycle != lifecycle {
                debug!(lifecycle = ?lifecycle, "App lifecycle changed");
                state.lifecycle = lifecycle;
            }
        }
    }

    /// Delivers the queue head to the navigation callback, leaving the
    /// remainder queued. The host advances the queue by calling this again
    /// when the user dismisses the current entry.
    pub fn deliver_next_pending(&self) -> bool {
        let (callback, contact) = {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            let Some(callback) = state.callback.clone() else {
                return false;
            };
            let Some(contact) = state.pending.pop_front() else {
                return false;
            };
            (callback, contact)
        };
        debug!(contact = %contact.id, "Delivering pending contact");
        callback(contact);
        true
    }

    pub fn has_pending(&self) -> bool {
        self.state
            .lock()
            .map(|state| !state.pending.is_empty())
            .unwrap_or(false)
    }

    pub(crate) fn resume(&self) -> Result<()> {
        let Ok(mut state) = self.state.lock() else {
            warn!("Detector state lock poisoned; cannot resume");
            return Ok(());
        };
        if state.phase == MonitorPhase::Uninitialized {
            return Err(MonitorError::NotInitialized);
        }
        state.monitoring_requested = true;
        state.phase = if state.bootstrap_complete {
            MonitorPhase::Monitoring
        } else {
            MonitorPhase::Initializing
        };
        Ok(())
    }

    pub(crate) fn suspend(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.monitoring_requested = false;
            if state.phase != MonitorPhase::Uninitialized {
                state.phase = MonitorPhase::Suspended;
            }
        }
    }

    /// Synthesizes one fake contact and routes it through the normal
    /// policy, for diagnostics.
    pub fn test_notification(&self) -> Result<()> {
        let contact = PendingContact {
            id: format!("diagnostic-{}", Utc::now().timestamp_millis()),
            name: Some("Test Contact".to_string()),
            phone: Some("+1 555 0199".to_string()),
            email: None,
            detected_at: Utc::now().to_rfc3339(),
        };

        let delivery = {
            let Ok(mut state) = self.state.lock() else {
                warn!("Detector state lock poisoned; skipping test notification");
                return Ok(());
            };
            let callback = if state.lifecycle == AppLifecycle::Foreground {
                state.callback.clone()
            } else {
                None
            };
            match callback {
                Some(callback) => Delivery::Navigate(callback, contact),
                None => {
                    state.pending.push_back(contact.clone());
                    Delivery::Notify(contact)
                }
            }
        };
        self.execute(delivery);
        Ok(())
    }

    /// Full reset: forgets every known contact and queued detection, and
    /// persists the empty set. The next check re-records the whole address
    /// book silently, as on first run.
    pub fn reset(&self) -> Result<()> {
        let Ok(mut state) = self.state.lock() else {
            warn!("Detector state lock poisoned; cannot reset");
            return Ok(());
        };
        state.known.clear();
        state.pending.clear();
        state.bootstrap_complete = false;
        self.known_store.save(&state.known)
    }

    pub fn source_supports_change_events(&self) -> bool {
        self.source.supports_change_events()
    }

    pub fn status(&self) -> DetectorStatus {
        match self.state.lock() {
            Ok(state) => DetectorStatus {
                phase: state.phase,
                lifecycle: state.lifecycle,
                bootstrap_complete: state.bootstrap_complete,
                known_contacts: state.known.len(),
                pending_contacts: state.pending.len(),
            },
            Err(_) => DetectorStatus {
                phase: MonitorPhase::Uninitialized,
                lifecycle: AppLifecycle::Foreground,
                bootstrap_complete: false,
                known_contacts: 0,
                pending_contacts: 0,
            },
        }
    }
}

fn project_contact(record: &ContactRecord) -> PendingContact {
    PendingContact {
        id: record.id.clone(),
        name: record.name.clone(),
        phone: record.phones.first().cloned(),
        email: record.emails.first().cloned(),
        detected_at: Utc::now().to_rfc3339(),
    }
}
