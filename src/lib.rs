//! # watchdog-core
//!
//! The evaluation core of Watchdog, an auditor for accounts, integrations and network
//! exposure across SaaS and cloud providers.
//!
//! Fetchers (not part of this crate) normalize vendor payloads into [`EntityRecord`]s.
//! The [`Auditor`] checks each record against the provider's compiled [`AuditConfig`]
//! and returns exactly one [`EntityReport`] per entity:
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use watchdog_core::{Auditor, EntityRecord, Verdict};
//!
//! let auditor = Auditor::new_from_str(r#"{
//!     "directory": ["alice@example.com"],
//!     "providers": { "slack": { "accounts": {} } }
//! }"#).unwrap();
//!
//! let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
//! let report = auditor
//!     .audit_at("slack", &[
//!         EntityRecord::account("Alice@Example.com"),
//!         EntityRecord::account("mallory@example.net"),
//!     ], now)
//!     .unwrap();
//!
//! assert_eq!(report.entities[0].verdict, Verdict::Compliant);
//! assert_eq!(report.failure_count(), 1);
//! ```
pub use auditor::Auditor;
pub use config::{AuditConfig, ProviderPolicy, TwoFactorPolicy};
pub use error::AuditError;
pub use loader::compile_config;
pub use network::{NetworkGrant, NetworkPolicy};
pub use registry::{ExceptionRegistry, LookupMode};
pub use types::{
    AttrValue, AuditReport, Basis, Check, EntityKind, EntityRecord, EntityReport,
    ExceptionDescriptor, Failure, Requirement, Verdict, attrs,
};
pub use validity::AllowedUntil;

mod auditor;
pub mod config;
mod error;
mod loader;
pub mod network;
pub mod registry;
pub mod rules;
pub mod sink;
pub mod structural;
pub mod timers;
pub mod types;
pub mod validity;
