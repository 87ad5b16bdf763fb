//! Composition facade over the engine.
//!
//! One explicitly constructed `MonitorService` instance is owned by the
//! application's composition root and injected wherever needed. It wires
//! the detector, scheduler, and background registrar together and exposes
//! the surface the UI/navigation layer consumes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::background::{BackgroundJob, BackgroundRegistrar, BackgroundTaskSpec};
use crate::config::MonitorConfig;
use crate::detector::{
    AppLifecycle, ContactChangeDetector, MonitorPhase, NavigationCallback,
};
use crate::error::Result;
use crate::notify::NotificationDispatcher;
use crate::scheduler::LifecycleScheduler;
use crate::source::ContactSnapshotSource;
use crate::storage::StoragePaths;
use crate::store::MonitoringStateStore;

/// Point-in-time view of the engine, for status surfaces and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub phase: MonitorPhase,
    pub lifecycle: AppLifecycle,
    pub bootstrap_complete: bool,
    pub known_contacts: usize,
    pub pending_contacts: usize,
    pub monitoring_enabled: bool,
    pub background_registered: bool,
}

pub struct MonitorService {
    detector: Arc<ContactChangeDetector>,
    scheduler: LifecycleScheduler,
    registrar: Arc<dyn BackgroundRegistrar>,
    monitoring_store: MonitoringStateStore,
    paths: StoragePaths,
    config: MonitorConfig,
    background_registered: AtomicBool,
}

impl MonitorService {
    pub fn new(
        source: Arc<dyn ContactSnapshotSource>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        registrar: Arc<dyn BackgroundRegistrar>,
        paths: StoragePaths,
        config: MonitorConfig,
    ) -> Self {
        let detector = Arc::new(ContactChangeDetector::new(source, dispatcher, &paths));
        let scheduler = LifecycleScheduler::new(Arc::clone(&detector), config.clone());
        Self {
            detector,
            scheduler,
            registrar,
            monitoring_store: MonitoringStateStore::new(&paths),
            paths,
            config,
            background_registered: AtomicBool::new(false),
        }
    }

    /// Bootstrap: prepares storage, loads persisted state, runs the first
    /// scan, and auto-resumes polling if monitoring was enabled before the
    /// last shutdown. Safe to call more than once.
    pub fn initialize(&self) -> Result<()> {
        if let Err(err) = self.paths.ensure_dirs() {
            warn!(error = %err, "Failed to prepare storage root; persistence degraded");
        }
        self.detector.initialize()?;
        if self.monitoring_store.load() {
            info!("Monitoring was enabled before shutdown; resuming");
            self.start_monitoring()?;
        }
        Ok(())
    }

    pub fn start_monitoring(&self) -> Result<()> {
        self.detector.resume()?;
        if let Err(err) = self.monitoring_store.save(true) {
            warn!(error = %err, "Failed to persist monitoring state");
        }
        self.scheduler.start();

        let spec = BackgroundTaskSpec {
            task_id: self.config.background_task_id.clone(),
            min_interval: self.config.background_min_interval,
        };
        let detector = Arc::clone(&self.detector);
        let job: BackgroundJob = Arc::new(move || detector.check_for_new_contacts());
        match self.registrar.register(&spec, job) {
            Ok(()) => {
                info!(task_id = %spec.task_id, "Background refresh task registered");
                self.background_registered.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "Background task registration failed; foreground polling remains primary"
                );
                self.background_registered.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Stops polling and persists monitoring as disabled. Safe to call at
    /// any time, in any state; idempotent.
    pub fn stop_monitoring(&self) {
        self.scheduler.stop();
        if let Err(err) = self.registrar.unregister(&self.config.background_task_id) {
            warn!(error = %err, "Background task unregistration failed");
        }
        self.background_registered.store(false, Ordering::SeqCst);
        if let Err(err) = self.monitoring_store.save(false) {
            warn!(error = %err, "Failed to persist monitoring state");
        }
        self.detector.suspend();
    }

    pub fn monitoring_state(&self) -> bool {
        self.monitoring_store.load()
    }

    /// Registers the navigation callback; last registration wins.
    pub fn set_navigation_callback(&self, callback: NavigationCallback) {
        self.detector.set_navigation_callback(callback);
    }

    /// Manual or background-task entry point for one detection pass.
    pub fn check_for_new_contacts(&self) -> Result<()> {
        self.detector.check_for_new_contacts()
    }

    /// Routes one synthetic contact for diagnostics.
    pub fn test_notification(&self) -> Result<()> {
        self.detector.test_notification()
    }

    pub fn on_app_foreground(&self) {
        self.scheduler.on_app_foreground();
    }

    pub fn on_app_background(&self) {
        self.scheduler.on_app_background();
    }

    /// Delivers the next queued detection to the navigation callback, if
    /// any. Hosts call this when the user dismisses the current capture
    /// prompt.
    pub fn deliver_next_pending(&self) -> bool {
        self.detector.deliver_next_pending()
    }

    /// Forgets all known contacts and queued detections.
    pub fn reset(&self) -> Result<()> {
        self.detector.reset()
    }

    pub fn status(&self) -> MonitorStatus {
        let detector = self.detector.status();
        MonitorStatus {
            phase: detector.phase,
            lifecycle: detector.lifecycle,
            bootstrap_complete: detector.bootstrap_complete,
            known_contacts: detector.known_contacts,
            pending_contacts: detector.pending_contacts,
            monitoring_enabled: self.monitoring_store.load(),
            background_registered: self.background_registered.load(Ordering::SeqCst),
        }
    }
}
