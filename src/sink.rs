//! Pluggable sink for audit results.
//!
//! The auditor never reports anywhere by itself. Attach an [`AuditSink`] with
//! `Auditor::with_sink` to forward per-entity verdicts and run summaries to a
//! reporter, a metrics backend or a test harness.
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use watchdog_core::sink::{AuditSink, RunStats};
//! use watchdog_core::EntityReport;
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! impl AuditSink for FailureCounter {
//!     fn on_entity(&self, _provider: &str, report: &EntityReport) {
//!         if !report.is_compliant() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn on_run(&self, stats: &RunStats) {
//!         eprintln!("{} took {:?}", stats.provider, stats.duration);
//!     }
//! }
//! ```

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::types::EntityReport;

/// Summary of one `Auditor::audit` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub provider: String,
    /// Wall-clock time spent evaluating the whole batch.
    pub duration: Duration,
    pub evaluated: usize,
    pub non_compliant: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadStats {
    pub reload_time: SystemTime,
    /// Providers present in the new configuration.
    pub providers: usize,
}

/// Receiver for audit events.
///
/// Sinks are shared between threads evaluating in parallel, hence `Send + Sync`.
/// Calls are synchronous and should return quickly.
pub trait AuditSink: Send + Sync {
    /// Called once per evaluated entity, compliant or not.
    fn on_entity(&self, provider: &str, report: &EntityReport);

    /// Called after each batch audit.
    fn on_run(&self, stats: &RunStats);

    /// Called after a successful configuration reload.
    fn on_reload(&self, _stats: &ReloadStats) {}
}
