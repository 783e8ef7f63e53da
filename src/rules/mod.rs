//! Per-kind evaluation of entity records against a provider policy.
//!
//! Every evaluator is a pure function of `(policy, entity, now)`: no shared state,
//! no clock reads, no I/O. Entity faults become failures on that entity; only a
//! missing policy section is an error.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ProviderPolicy;
use crate::error::AuditError;
use crate::types::{Basis, EntityKind, EntityRecord, EntityReport, Failure};

pub mod accounts;
pub mod hooks;
pub mod network;
pub mod repositories;

/// What an evaluator found: why the entity passed (if it did) and every failed check.
pub(crate) type Outcome = (Option<Basis>, Vec<Failure>);

fn missing_section(provider: &str, kind: EntityKind) -> AuditError {
    AuditError::MissingConfig(format!("providers.{provider} has no policy for {kind} entities"))
}

/// Fail with `MissingConfig` unless `policy` has a section for `kind`.
pub fn ensure_section(
    provider: &str,
    policy: &ProviderPolicy,
    kind: EntityKind,
) -> Result<(), AuditError> {
    let present = match kind {
        EntityKind::Account => policy.accounts.is_some(),
        EntityKind::Hook => policy.hooks.is_some(),
        EntityKind::NetworkGrant => policy.network.is_some(),
        EntityKind::Repository => policy.repositories.is_some(),
    };
    if present {
        Ok(())
    } else {
        Err(missing_section(provider, kind))
    }
}

/// Evaluate one entity against the policy of `provider`.
pub fn evaluate_entity(
    provider: &str,
    policy: &ProviderPolicy,
    entity: &EntityRecord,
    now: DateTime<Utc>,
) -> Result<EntityReport, AuditError> {
    let missing = || missing_section(provider, entity.kind());

    let (basis, failures) = match entity.kind() {
        EntityKind::Account => {
            accounts::evaluate(policy.accounts.as_ref().ok_or_else(missing)?, entity, now)
        }
        EntityKind::Hook => hooks::evaluate(policy.hooks.as_deref().ok_or_else(missing)?, entity),
        EntityKind::NetworkGrant => {
            network::evaluate(policy.network.as_ref().ok_or_else(missing)?, entity)
        }
        EntityKind::Repository => {
            repositories::evaluate(policy.repositories.as_ref().ok_or_else(missing)?, entity)
        }
    };

    let report = EntityReport::new(entity, basis, failures);
    debug!(
        event = "Evaluate",
        phase = "Verdict",
        provider = provider,
        kind = entity.kind().as_ref(),
        key = entity.key(),
        compliant = report.is_compliant()
    );
    Ok(report)
}
