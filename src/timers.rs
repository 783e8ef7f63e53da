//! Timing for audit runs.

use std::time::{Duration, Instant};

use crate::sink::RunStats;
use crate::types::AuditReport;

/// Clock for one audit run of a provider, turned into [`RunStats`] once the run's
/// report is complete.
///
/// ```rust
/// use chrono::Utc;
/// use watchdog_core::timers::RunTimer;
/// use watchdog_core::types::AuditReport;
///
/// let timer = RunTimer::start("slack");
/// let report = AuditReport {
///     provider: "slack".to_string(),
///     evaluated_at: Utc::now(),
///     entities: vec![],
/// };
/// let stats = timer.finish(&report);
/// assert_eq!(stats.provider, "slack");
/// assert_eq!(stats.evaluated, 0);
/// ```
#[derive(Debug)]
pub struct RunTimer {
    provider: String,
    started: Instant,
}

impl RunTimer {
    pub fn start(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            started: Instant::now(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the clock and summarize `report`.
    pub fn finish(self, report: &AuditReport) -> RunStats {
        RunStats {
            duration: self.started.elapsed(),
            evaluated: report.entities.len(),
            non_compliant: report.failure_count(),
            provider: self.provider,
        }
    }
}
