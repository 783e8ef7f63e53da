//! Normalized entity records handed to the auditor by vendor fetchers.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use super::attr_value::AttrValue;

/// Well-known attribute names.
pub mod attrs {
    pub const HAS_TWO_FACTOR: &str = "has_two_factor";
    pub const IS_RESTRICTED: &str = "is_restricted";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const RAW: &str = "raw";
    pub const GROUP: &str = "group";
    pub const REGION: &str = "region";
    pub const ACTIVE_KEY_COUNT: &str = "active_key_count";
    pub const KEY_LAST_USED: &str = "key_last_used";
    pub const HAS_PASSWORD: &str = "has_password";
    pub const PASSWORD_LAST_USED: &str = "password_last_used";
    pub const IS_PRIVATE: &str = "is_private";
}

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
pub enum EntityKind {
    /// A user or service account (email, username).
    Account,
    /// A webhook or other structured integration.
    Hook,
    /// An inbound network rule, keyed `PROTOCOL-FROMPORT-TOPORT-NETWORK`.
    NetworkGrant,
    /// A source repository.
    Repository,
}

/// One externally observed principal or grant.
///
/// Account keys are case-folded on construction, so every comparison against the
/// known-identity set and the exception registry is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawEntityRecord")]
pub struct EntityRecord {
    kind: EntityKind,
    key: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, AttrValue>,
}

#[derive(Deserialize)]
struct RawEntityRecord {
    kind: EntityKind,
    key: String,
    #[serde(default)]
    attrs: BTreeMap<String, AttrValue>,
}

impl From<RawEntityRecord> for EntityRecord {
    fn from(raw: RawEntityRecord) -> Self {
        EntityRecord {
            key: canonical_key(raw.kind, &raw.key),
            kind: raw.kind,
            attrs: raw.attrs,
        }
    }
}

fn canonical_key(kind: EntityKind, key: &str) -> String {
    match kind {
        EntityKind::Account => key.trim().to_lowercase(),
        _ => key.trim().to_string(),
    }
}

impl Display for EntityRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {}", self.kind, self.key)
    }
}

impl EntityRecord {
    pub fn new(kind: EntityKind, key: impl AsRef<str>) -> Self {
        Self {
            key: canonical_key(kind, key.as_ref()),
            kind,
            attrs: BTreeMap::new(),
        }
    }

    pub fn account(key: impl AsRef<str>) -> Self {
        Self::new(EntityKind::Account, key)
    }

    /// A hook with its raw vendor payload stored under `raw`.
    pub fn hook(key: impl AsRef<str>, raw: Value) -> Self {
        Self::new(EntityKind::Hook, key).with_attr(attrs::RAW, AttrValue::Structured(raw))
    }

    /// A network grant owned by `group`.
    pub fn network_grant(rule: impl AsRef<str>, group: impl Into<String>) -> Self {
        Self::new(EntityKind::NetworkGrant, rule)
            .with_attr(attrs::GROUP, AttrValue::String(group.into()))
    }

    pub fn repository(name: impl AsRef<str>, is_private: bool) -> Self {
        Self::new(EntityKind::Repository, name)
            .with_attr(attrs::IS_PRIVATE, AttrValue::Bool(is_private))
    }

    /// Add an attribute, returning the updated record.
    pub fn with_attr(mut self, k: impl Into<String>, v: impl Into<AttrValue>) -> Self {
        self.attrs.insert(k.into(), v.into());
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn bool_attr(&self, name: &str) -> Option<bool> {
        self.attr(name).and_then(AttrValue::as_bool)
    }

    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(AttrValue::as_str)
    }
}
