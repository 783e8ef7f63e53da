//! Per-entity verdicts and run reports.

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use super::entity::{EntityKind, EntityRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Compliant,
    NonCompliant,
}

/// The predicate that failed for an entity.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Check {
    KnownIdentity,
    ExceptionExpired,
    ExceptionAttribute,
    TwoFactor,
    SingleKey,
    KeyActivity,
    LoginActivity,
    VaultLease,
    HookAllowed,
    GlobalException,
    KnownNetwork,
    GrantFormat,
    PrivateRepository,
}

/// Why an entity was accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Basis {
    KnownIdentity,
    Exception { key: String },
    AllowedSuffix { suffix: String },
    KnownName,
    VaultUser,
    AllowListEntry { index: usize },
    GlobalException,
    IpException { description: String },
    IgnoredGroup,
    IgnoredPrefix,
    /// Grants outside CIDR syntax are not classified.
    Unclassified,
    PrivateRepository,
}

impl Display for Basis {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Basis::KnownIdentity => write!(f, "known identity"),
            Basis::Exception { key } => write!(f, "exception {key}"),
            Basis::AllowedSuffix { suffix } => write!(f, "allowed suffix {suffix}"),
            Basis::KnownName => write!(f, "known display name"),
            Basis::VaultUser => write!(f, "vault user"),
            Basis::AllowListEntry { index } => write!(f, "allow-list entry #{index}"),
            Basis::GlobalException => write!(f, "global exception"),
            Basis::IpException { description } => write!(f, "ip exception ({description})"),
            Basis::IgnoredGroup => write!(f, "ignored group"),
            Basis::IgnoredPrefix => write!(f, "ignored prefix"),
            Basis::Unclassified => write!(f, "unclassified grant"),
            Basis::PrivateRepository => write!(f, "private repository"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub struct Failure {
    pub check: Check,
    pub reason: String,
}

impl Failure {
    pub fn new(check: Check, reason: impl Into<String>) -> Self {
        Self {
            check,
            reason: reason.into(),
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.check, self.reason)
    }
}

/// The single verdict for one entity.
///
/// The verdict is `NonCompliant` exactly when `failures` is non-empty; each failure
/// names its own check so independent predicates stay individually attributable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct EntityReport {
    pub key: String,
    pub kind: EntityKind,
    pub verdict: Verdict,
    pub basis: Option<Basis>,
    pub failures: Vec<Failure>,
}

impl EntityReport {
    pub fn new(entity: &EntityRecord, basis: Option<Basis>, failures: Vec<Failure>) -> Self {
        let verdict = if failures.is_empty() {
            Verdict::Compliant
        } else {
            Verdict::NonCompliant
        };
        Self {
            key: entity.key().to_string(),
            kind: entity.kind(),
            verdict,
            basis,
            failures,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.verdict == Verdict::Compliant
    }

    pub fn failed_checks(&self) -> Vec<Check> {
        self.failures.iter().map(|f| f.check).collect()
    }
}

impl Display for EntityReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match (self.verdict, &self.basis) {
            (Verdict::Compliant, Some(basis)) => {
                write!(f, "PASS {} {} ({basis})", self.kind, self.key)
            }
            (Verdict::Compliant, None) => write!(f, "PASS {} {}", self.kind, self.key),
            (Verdict::NonCompliant, _) => write!(
                f,
                "FAIL {} {}: {}",
                self.kind,
                self.key,
                self.failures.iter().join("; ")
            ),
        }
    }
}

/// All verdicts of one audit run against one provider, in input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AuditReport {
    pub provider: String,
    pub evaluated_at: DateTime<Utc>,
    pub entities: Vec<EntityReport>,
}

impl AuditReport {
    pub fn failures(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|e| !e.is_compliant())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn compliant_count(&self) -> usize {
        self.entities.len() - self.failure_count()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

impl Display for AuditReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}: {} evaluated, {} non-compliant",
            self.provider,
            self.entities.len(),
            self.failure_count()
        )
    }
}
