//! OS background-task capability.
//!
//! Background registration is best-effort supplementary coverage: the
//! foreground polling path stays authoritative, and a host without a
//! background scheduler (dev machines, some test rigs) simply reports
//! registration as unavailable.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Parameters for a periodic OS-level background task.
#[derive(Debug, Clone)]
pub struct BackgroundTaskSpec {
    pub task_id: String,
    pub min_interval: Duration,
}

/// The work a fired background task runs. The registrar implementation is
/// responsible for signalling completion (success or failure) back to the
/// OS within its deadline, based on the returned result.
pub type BackgroundJob = Arc<dyn Fn() -> Result<()> + Send + Sync>;

pub trait BackgroundRegistrar: Send + Sync {
    fn register(&self, spec: &BackgroundTaskSpec, job: BackgroundJob) -> Result<()>;

    /// Must be safe to call even if registration never succeeded.
    fn unregister(&self, task_id: &str) -> Result<()>;
}

/// Registrar for hosts without an OS background scheduler. Registration
/// reports unavailability; unregistration is always a successful no-op.
#[derive(Debug, Clone, Default)]
pub struct NoopRegistrar;

impl BackgroundRegistrar for NoopRegistrar {
    fn register(&self, spec: &BackgroundTaskSpec, _job: BackgroundJob) -> Result<()> {
        Err(MonitorError::BackgroundRegistration {
            task_id: spec.task_id.clone(),
            reason: "no background scheduler on this host".to_string(),
        })
    }

    fn unregister(&self, _task_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_registrar_reports_unavailable() {
        let registrar = NoopRegistrar;
        let spec = BackgroundTaskSpec {
            task_id: "task-1".to_string(),
            min_interval: Duration::from_secs(900),
        };
        let job: BackgroundJob = Arc::new(|| Ok(()));

        assert!(matches!(
            registrar.register(&spec, job),
            Err(MonitorError::BackgroundRegistration { .. })
        ));
    }

    #[test]
    fn unregister_is_safe_without_registration() {
        let registrar = NoopRegistrar;
        registrar.unregister("task-1").expect("unregister no-op");
        registrar.unregister("task-1").expect("unregister twice");
    }
}
