//! Classification of inbound network grants.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AuditError;

/// The all-addresses network.
pub const UNIVERSAL_NETWORK: &str = "0.0.0.0/0";

// Anchored at the start only: trailing text after the mask still classifies as CIDR.
static CIDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}/\d{1,2}").expect("static regex")
});

/// A grant rule string split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkGrant<'a> {
    pub protocol: &'a str,
    pub from_port: &'a str,
    pub to_port: &'a str,
    /// May itself contain `-`, e.g. a security group reference.
    pub network: &'a str,
}

impl<'a> NetworkGrant<'a> {
    /// Split `PROTOCOL-FROMPORT-TOPORT-NETWORK`. The all-protocols marker `-1` is
    /// accepted as a protocol.
    pub fn parse(rule: &'a str) -> Result<Self, AuditError> {
        let malformed = || {
            AuditError::InvalidFormat(format!(
                "'{rule}' is not a PROTOCOL-FROMPORT-TOPORT-NETWORK grant"
            ))
        };

        let (protocol, rest) = match rule.strip_prefix("-1-") {
            Some(rest) => (&rule[..2], rest),
            None => rule.split_once('-').ok_or_else(malformed)?,
        };
        let mut parts = rest.splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(from_port), Some(to_port), Some(network))
                if !protocol.is_empty() && !network.is_empty() =>
            {
                Ok(Self {
                    protocol,
                    from_port,
                    to_port,
                    network,
                })
            }
            _ => Err(malformed()),
        }
    }

    /// Build the canonical rule string, upper-casing the protocol.
    pub fn rule_string(
        protocol: &str,
        from_port: impl Display,
        to_port: impl Display,
        network: &str,
    ) -> String {
        format!("{}-{from_port}-{to_port}-{network}", protocol.to_uppercase())
    }

    pub fn is_universal(&self) -> bool {
        self.network == UNIVERSAL_NETWORK
    }

    pub fn is_cidr(&self) -> bool {
        CIDR.is_match(self.network)
    }
}

impl Display for NetworkGrant<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}-{}-{}-{}",
            self.protocol, self.from_port, self.to_port, self.network
        )
    }
}

/// Network exposure rules for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Groups whose grants are never evaluated.
    pub ignore_groups: HashSet<String>,
    /// Networks starting with this prefix are internal and skipped.
    pub ignore_prefix: Option<String>,
    /// Known networks (bare `X.X.X.X/MASK`) and their descriptions.
    pub ip_exceptions: BTreeMap<String, String>,
    /// Full rule strings allowed to open `0.0.0.0/0`, per group.
    pub global_exceptions: BTreeMap<String, Vec<String>>,
}

/// Outcome of classifying a single grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantClass {
    IgnoredGroup,
    GlobalAllowed,
    GlobalDenied,
    IgnoredPrefix,
    KnownNetwork { description: String },
    UnknownNetwork,
    /// Not CIDR syntax; accepted without further checks.
    Unclassified,
}

impl NetworkPolicy {
    pub fn classify(&self, group: &str, grant: &NetworkGrant<'_>) -> GrantClass {
        if self.ignore_groups.contains(group) {
            return GrantClass::IgnoredGroup;
        }

        if grant.is_universal() {
            let rule = grant.to_string();
            let allowed = self
                .global_exceptions
                .get(group)
                .is_some_and(|rules| rules.iter().any(|r| *r == rule));
            return if allowed {
                GrantClass::GlobalAllowed
            } else {
                GrantClass::GlobalDenied
            };
        }

        if !grant.is_cidr() {
            return GrantClass::Unclassified;
        }

        if self
            .ignore_prefix
            .as_deref()
            .is_some_and(|prefix| grant.network.starts_with(prefix))
        {
            return GrantClass::IgnoredPrefix;
        }

        match self.ip_exceptions.get(grant.network) {
            Some(description) => GrantClass::KnownNetwork {
                description: description.clone(),
            },
            None => GrantClass::UnknownNetwork,
        }
    }
}
