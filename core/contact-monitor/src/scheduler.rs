//! Polling cadence and app-lifecycle transitions.
//!
//! One control thread owns the timer: a steady slow poll while monitoring
//! is active, a bounded high-frequency burst right after a foreground
//! transition, never both at once. Cadence changes and stop requests go
//! through a condvar so they take effect without waiting out the current
//! interval. In-flight checks are never aborted; stopping only suppresses
//! future firings.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::detector::{AppLifecycle, ContactChangeDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Steady,
    Burst { remaining: u32 },
}

struct Control {
    cadence: Cadence,
    stopped: bool,
    generation: u64,
}

pub struct LifecycleScheduler {
    detector: Arc<ContactChangeDetector>,
    config: MonitorConfig,
    control: Arc<(Mutex<Control>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleScheduler {
    pub fn new(detector: Arc<ContactChangeDetector>, config: MonitorConfig) -> Self {
        Self {
            detector,
            config,
            control: Arc::new((
                Mutex::new(Control {
                    cadence: Cadence::Steady,
                    stopped: true,
                    generation: 0,
                }),
                Condvar::new(),
            )),
            handle: Mutex::new(None),
        }
    }

    /// Starts the steady poll. No-op if already running, or if the
    /// snapshot source delivers its own change events (the host then feeds
    /// those events into `check_for_new_contacts` directly).
    pub fn start(&self) {
        if self.detector.source_supports_change_events() {
            info!("Snapshot source delivers change events; polling timers disabled");
            return;
        }

        let generation;
        {
            let (lock, cvar) = &*self.control;
            let Ok(mut control) = lock.lock() else {
                warn!("Scheduler control lock poisoned; cannot start");
                return;
            };
            if !control.stopped {
                debug!("Scheduler already running");
                return;
            }
            control.stopped = false;
            control.cadence = Cadence::Steady;
            control.generation += 1;
            generation = control.generation;
            cvar.notify_all();
        }

        let detector = Arc::clone(&self.detector);
        let control = Arc::clone(&self.control);
        let config = self.config.clone();
        let handle = thread::spawn(move || run_loop(detector, control, config, generation));
        if let Ok(mut slot) = self.handle.lock() {
            // A previous thread has already observed its stop; reap it.
            if let Some(old) = slot.take() {
                let _ = old.join();
            }
            *slot = Some(handle);
        }
    }

    /// Clears all timers (steady and burst) unconditionally. Safe to call
    /// at any time, including when never started; idempotent.
    pub fn stop(&self) {
        {
            let (lock, cvar) = &*self.control;
            if let Ok(mut control) = lock.lock() {
                control.stopped = true;
                cvar.notify_all();
            }
        }
        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }

    /// Foreground transition: deliver the pending-queue head if there is
    /// one (burst skipped), otherwise run a bounded high-frequency burst to
    /// catch contacts added while the app was being switched back to.
    pub fn on_app_foreground(&self) {
        self.detector.set_lifecycle(AppLifecycle::Foreground);

        if self.detector.has_pending() {
            if !self.detector.deliver_next_pending() {
                debug!("Pending contacts queued but no navigation callback registered");
            }
            return;
        }

        if self.detector.source_supports_change_events() {
            return;
        }
        let (lock, cvar) = &*self.control;
        if let Ok(mut control) = lock.lock() {
            if control.stopped {
                return;
            }
            control.cadence = Cadence::Burst {
                remaining: self.config.burst_iterations,
            };
            cvar.notify_all();
            debug!(
                iterations = self.config.burst_iterations,
                "Burst polling started"
            );
        }
    }

    /// Background transition: cancel any in-progress burst. The steady
    /// timer keeps running; on hosts that suspend threads the background
    /// registrar provides coverage instead.
    pub fn on_app_background(&self) {
        self.detector.set_lifecycle(AppLifecycle::Background);

        let (lock, cvar) = &*self.control;
        if let Ok(mut control) = lock.lock() {
            if matches!(control.cadence, Cadence::Burst { .. }) {
                control.cadence = Cadence::Steady;
                cvar.notify_all();
                debug!("Burst polling cancelled on background transition");
            }
        }
    }
}

impl Drop for LifecycleScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    detector: Arc<ContactChangeDetector>,
    control: Arc<(Mutex<Control>, Condvar)>,
    config: MonitorConfig,
    generation: u64,
) {
    debug!("Polling loop started");
    let (lock, cvar) = &*control;
    let Ok(mut guard) = lock.lock() else {
        return;
    };
    loop {
        if guard.stopped || guard.generation != generation {
            break;
        }
        let interval = match guard.cadence {
            Cadence::Steady => config.steady_interval,
            Cadence::Burst { .. } => config.burst_interval,
        };
        let (next, timeout) = match cvar.wait_timeout(guard, interval) {
            Ok(result) => result,
            Err(_) => return,
        };
        guard = next;
        if guard.stopped || guard.generation != generation {
            break;
        }
        if !timeout.timed_out() {
            // Cadence changed (or spurious wakeup); recompute the wait.
            continue;
        }

        if let Cadence::Burst { remaining } = guard.cadence {
            guard.cadence = if remaining <= 1 {
                debug!("Burst complete; reverting to steady polling");
                Cadence::Steady
            } else {
                Cadence::Burst {
                    remaining: remaining - 1,
                }
            };
        }

        drop(guard);
        if let Err(err) = detector.check_for_new_contacts() {
            warn!(error = %err, "Polling tick failed");
        }
        guard = match lock.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
    }
    debug!("Polling loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationDispatcher;
    use crate::source::{ContactRecord, ContactSnapshotSource, SnapshotError};
    use crate::storage::StoragePaths;
    use contact_monitor_protocol::{NotificationRequest, PendingContact};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingSource {
        contacts: Mutex<Vec<ContactRecord>>,
        calls: AtomicUsize,
        change_events: AtomicBool,
    }

    impl CountingSource {
        fn new(contacts: Vec<ContactRecord>) -> Arc<Self> {
            Arc::new(Self {
                contacts: Mutex::new(contacts),
                calls: AtomicUsize::new(0),
                change_events: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ContactSnapshotSource for CountingSource {
        fn list_contacts(&self) -> Result<Vec<ContactRecord>, SnapshotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.contacts.lock().expect("contacts lock").clone())
        }

        fn supports_change_events(&self) -> bool {
            self.change_events.load(Ordering::SeqCst)
        }
    }

    struct NullDispatcher;

    impl NotificationDispatcher for NullDispatcher {
        fn schedule(&self, _request: &NotificationRequest) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn record(id: &str) -> ContactRecord {
        ContactRecord {
            id: id.to_string(),
            name: None,
            phones: Vec::new(),
            emails: Vec::new(),
        }
    }

    fn config(steady_ms: u64, burst_ms: u64, iterations: u32) -> MonitorConfig {
        MonitorConfig {
            steady_interval: Duration::from_millis(steady_ms),
            burst_interval: Duration::from_millis(burst_ms),
            burst_iterations: iterations,
            ..MonitorConfig::default()
        }
    }

    struct Rig {
        _temp: TempDir,
        source: Arc<CountingSource>,
        detector: Arc<ContactChangeDetector>,
        scheduler: LifecycleScheduler,
    }

    fn rig(contacts: Vec<ContactRecord>, config: MonitorConfig) -> Rig {
        let temp = TempDir::new().expect("temp dir");
        let paths = StoragePaths::with_root(temp.path().to_path_buf());
        let source = CountingSource::new(contacts);
        let detector = Arc::new(ContactChangeDetector::new(
            source.clone(),
            Arc::new(NullDispatcher),
            &paths,
        ));
        detector.initialize().expect("initialize");
        let scheduler = LifecycleScheduler::new(detector.clone(), config);
        Rig {
            _temp: temp,
            source,
            detector,
            scheduler,
        }
    }

    #[test]
    fn steady_polling_fires_repeatedly() {
        let rig = rig(vec![record("a")], config(10, 10, 3));
        let baseline = rig.source.calls();

        rig.scheduler.start();
        thread::sleep(Duration::from_millis(200));
        rig.scheduler.stop();

        assert!(
            rig.source.calls() >= baseline + 3,
            "expected at least 3 steady ticks, saw {}",
            rig.source.calls() - baseline
        );
    }

    #[test]
    fn stop_is_idempotent_and_safe_when_never_started() {
        let rig = rig(vec![record("a")], config(10, 10, 3));
        rig.scheduler.stop();
        rig.scheduler.stop();

        rig.scheduler.start();
        rig.scheduler.stop();
        rig.scheduler.stop();
    }

    #[test]
    fn stop_halts_future_ticks() {
        let rig = rig(vec![record("a")], config(10, 10, 3));
        rig.scheduler.start();
        thread::sleep(Duration::from_millis(60));
        rig.scheduler.stop();

        let after_stop = rig.source.calls();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(rig.source.calls(), after_stop);
    }

    #[test]
    fn foreground_without_pending_runs_burst() {
        // Steady interval far beyond the observation window, so any tick
        // beyond bootstrap must come from the burst.
        let rig = rig(vec![record("a")], config(5_000, 10, 3));
        rig.scheduler.start();
        let baseline = rig.source.calls();

        rig.scheduler.on_app_background();
        rig.scheduler.on_app_foreground();
        thread::sleep(Duration::from_millis(300));

        let burst_ticks = rig.source.calls() - baseline;
        assert!(
            burst_ticks >= 3,
            "expected 3 burst ticks, saw {}",
            burst_ticks
        );
        // Burst is bounded; the cadence must have reverted rather than
        // kept firing every 10ms.
        assert!(
            burst_ticks <= 4,
            "burst did not stop after its iterations, saw {}",
            burst_ticks
        );
        rig.scheduler.stop();
    }

    #[test]
    fn background_transition_cancels_burst() {
        let rig = rig(vec![record("a")], config(5_000, 20, 200));
        rig.scheduler.start();

        rig.scheduler.on_app_background();
        rig.scheduler.on_app_foreground();
        thread::sleep(Duration::from_millis(50));
        rig.scheduler.on_app_background();

        let after_cancel = rig.source.calls();
        thread::sleep(Duration::from_millis(150));
        // Allow one in-flight tick to finish; nothing more may fire.
        assert!(
            rig.source.calls() <= after_cancel + 1,
            "burst kept firing after background transition"
        );
        rig.scheduler.stop();
    }

    #[test]
    fn foreground_with_pending_delivers_head_and_skips_burst() {
        let rig = rig(vec![record("a")], config(5_000, 10, 50));
        let delivered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        rig.detector
            .set_navigation_callback(Arc::new(move |contact: PendingContact| {
                sink.lock().expect("sink lock").push(contact.id);
            }));

        rig.scheduler.on_app_background();
        rig.source
            .contacts
            .lock()
            .expect("contacts lock")
            .extend([record("b"), record("c")]);
        rig.detector.check_for_new_contacts().expect("check");
        assert_eq!(rig.detector.status().pending_contacts, 2);

        rig.scheduler.start();
        let baseline = rig.source.calls();
        rig.scheduler.on_app_foreground();
        thread::sleep(Duration::from_millis(80));

        assert_eq!(*delivered.lock().expect("sink lock"), vec!["b".to_string()]);
        assert_eq!(rig.detector.status().pending_contacts, 1);
        // No burst: the only permissible extra tick is a steady one, and
        // the steady interval is far beyond the window.
        assert_eq!(rig.source.calls(), baseline);
        rig.scheduler.stop();
    }

    #[test]
    fn change_event_source_disables_polling() {
        let rig = rig(vec![record("a")], config(10, 10, 3));
        rig.source.change_events.store(true, Ordering::SeqCst);

        let baseline = rig.source.calls();
        rig.scheduler.start();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(rig.source.calls(), baseline);
        rig.scheduler.stop();
    }
}
