//! Engine tunables.

use std::time::Duration;

/// Polling cadence and background-task parameters.
///
/// Production hosts use `MonitorConfig::default()`; tests inject short
/// intervals to keep timer-driven assertions fast.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval of the steady poll while monitoring is active.
    pub steady_interval: Duration,
    /// Interval of the bounded high-frequency burst after a foreground
    /// transition.
    pub burst_interval: Duration,
    /// Number of burst iterations before reverting to the steady cadence.
    pub burst_iterations: u32,
    /// Identifier for the OS-level periodic background task.
    pub background_task_id: String,
    /// Minimum interval the OS scheduler is asked for. Platforms impose
    /// their own floor; 15 minutes is the common one.
    pub background_min_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            steady_interval: Duration::from_secs(5),
            burst_interval: Duration::from_secs(1),
            burst_iterations: 10,
            background_task_id: "com.contextcrm.contact-refresh".to_string(),
            background_min_interval: Duration::from_secs(15 * 60),
        }
    }
}
