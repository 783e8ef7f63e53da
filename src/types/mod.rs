//! Data model: entity records, exception descriptors and verdicts.
//!
//! Canonical key forms:
//! - Account: lower-cased email or username, e.g. `alice@example.com`
//! - Hook: free-form, typically `org/repo#id`
//! - NetworkGrant: `PROTOCOL-FROMPORT-TOPORT-NETWORK/MASK`, e.g. `TCP-443-443-0.0.0.0/0`
//! - Repository: repository name

mod attr_value;
mod entity;
mod exception;
mod report;

pub use attr_value::AttrValue;
pub use entity::{EntityKind, EntityRecord, attrs};
pub use exception::{ExceptionDescriptor, Requirement};
pub use report::{AuditReport, Basis, Check, EntityReport, Failure, Verdict};
