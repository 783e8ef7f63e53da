//! Compiled, immutable audit configuration.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::error::AuditError;
use crate::network::NetworkPolicy;
use crate::registry::ExceptionRegistry;

/// Authoritative set of canonical identities. Membership is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownIdentities(HashSet<String>);

impl KnownIdentities {
    pub fn new<S: AsRef<str>>(identities: impl IntoIterator<Item = S>) -> Self {
        Self(
            identities
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(&key.trim().to_lowercase())
    }

    pub fn extend(&mut self, other: &KnownIdentities) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// When an account must have two-factor authentication enabled.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TwoFactorPolicy {
    #[default]
    Never,
    Always,
    /// Required unless an exception matches the account key, valid or not.
    UnlessExcepted,
    /// Required only for accounts with `has_password = true`.
    WithPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub max_active_keys: i64,
    /// A key last used this many days ago (or more) is stale.
    pub key_max_idle_days: i64,
    /// A password user must have logged in within this many days.
    pub login_max_idle_days: i64,
}

/// Dynamically issued users named `vault-{auth}-{user}-{policy}-{epoch}-{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPolicy {
    pub users: HashSet<String>,
    pub auth_mechanism: String,
    pub lease_seconds: i64,
}

impl VaultPolicy {
    pub const DEFAULT_AUTH_MECHANISM: &'static str = "ldap";
    pub const DEFAULT_LEASE_SECONDS: i64 = 3600;
    pub const GRACE_SECONDS: i64 = 120;
}

#[derive(Debug, Clone, Default)]
pub struct AccountPolicy {
    pub known_identities: KnownIdentities,
    /// Upper-cased display names accepted when the key is unknown.
    pub known_names: HashSet<String>,
    pub allowed_suffixes: Vec<String>,
    pub exceptions: ExceptionRegistry,
    pub two_factor: TwoFactorPolicy,
    pub credentials: Option<CredentialPolicy>,
    pub vault: Option<VaultPolicy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryPolicy {
    pub require_private: bool,
}

/// Everything needed to audit one provider's entities.
///
/// A section left as `None` means the provider does not audit that entity kind;
/// feeding it such entities is a configuration error.
#[derive(Debug, Clone, Default)]
pub struct ProviderPolicy {
    pub accounts: Option<AccountPolicy>,
    pub hooks: Option<Vec<Value>>,
    pub network: Option<NetworkPolicy>,
    pub repositories: Option<RepositoryPolicy>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditConfig {
    providers: BTreeMap<String, ProviderPolicy>,
}

impl AuditConfig {
    pub fn new(providers: BTreeMap<String, ProviderPolicy>) -> Self {
        Self { providers }
    }

    pub fn with_provider(mut self, name: impl Into<String>, policy: ProviderPolicy) -> Self {
        self.providers.insert(name.into(), policy);
        self
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderPolicy, AuditError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuditError::MissingConfig(format!("no provider named '{name}'")))
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
