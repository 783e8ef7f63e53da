use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{
    AccountPolicy, AuditConfig, CredentialPolicy, KnownIdentities, ProviderPolicy,
    RepositoryPolicy, TwoFactorPolicy, VaultPolicy,
};
use crate::error::AuditError;
use crate::network::NetworkPolicy;
use crate::registry::{ExceptionRegistry, LookupMode};
use crate::types::{AttrValue, ExceptionDescriptor, Requirement, attrs};
use crate::validity::AllowedUntil;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    directory: Vec<String>,
    providers: Option<BTreeMap<String, RawProvider>>,
}

#[derive(Debug, Deserialize)]
struct RawProvider {
    accounts: Option<RawAccounts>,
    hooks: Option<Vec<Value>>,
    network: Option<RawNetwork>,
    repositories: Option<RawRepositories>,
}

#[derive(Debug, Deserialize)]
struct RawAccounts {
    #[serde(default)]
    known_identities: Vec<String>,
    #[serde(default = "default_true")]
    include_directory: bool,
    #[serde(default)]
    known_names: Vec<String>,
    #[serde(default)]
    allowed_suffixes: Vec<String>,
    #[serde(default)]
    two_factor: TwoFactorPolicy,
    #[serde(default)]
    exception_mode: LookupMode,
    #[serde(default)]
    exceptions: Map<String, Value>,
    credentials: Option<RawCredentials>,
    vault: Option<RawVault>,
}

#[derive(Debug, Deserialize)]
struct RawException {
    description: Option<String>,
    allowed_until: Option<String>,
    #[serde(default, alias = "single_channel")]
    restricted: bool,
    prefix: Option<String>,
    prefix_attribute: Option<String>,
    #[serde(default)]
    required_attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawCredentials {
    max_active_keys: Option<i64>,
    key_max_idle_days: Option<i64>,
    login_max_idle_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawVault {
    #[serde(default)]
    users: Vec<String>,
    auth_mechanism: Option<String>,
    lease_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawNetwork {
    #[serde(default)]
    ignore_groups: Vec<String>,
    ignore_prefix: Option<String>,
    #[serde(default)]
    ip_exceptions: BTreeMap<String, String>,
    #[serde(default)]
    global_exceptions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawRepositories {
    #[serde(default = "default_true")]
    require_private: bool,
}

fn default_true() -> bool {
    true
}

/// Compile JSON configuration text into an `AuditConfig`.
///
/// Dates, patterns and required keys are all validated here, so a configuration
/// that compiles cannot fail later on account of its own contents.
///
/// Example:
/// ```rust
/// use watchdog_core::compile_config;
/// let config = compile_config(r#"{
///     "directory": ["alice@example.com"],
///     "providers": { "pagerduty": { "accounts": {} } }
/// }"#).unwrap();
/// assert!(config.provider("pagerduty").is_ok());
/// ```
pub fn compile_config(text: &str) -> Result<AuditConfig, AuditError> {
    let raw: RawConfig = serde_json::from_str(text)?;
    let directory = KnownIdentities::new(&raw.directory);
    let providers = raw
        .providers
        .ok_or_else(|| AuditError::MissingConfig("providers".to_string()))?;

    let mut compiled = BTreeMap::new();
    for (name, provider) in providers {
        let policy = compile_provider(&name, provider, &directory)?;
        compiled.insert(name, policy);
    }

    info!(
        event = "Config",
        phase = "Compiled",
        providers = compiled.len(),
        directory = directory.len()
    );
    Ok(AuditConfig::new(compiled))
}

fn compile_provider(
    name: &str,
    raw: RawProvider,
    directory: &KnownIdentities,
) -> Result<ProviderPolicy, AuditError> {
    let path = format!("providers.{name}");

    let accounts = raw
        .accounts
        .map(|accounts| compile_accounts(&format!("{path}.accounts"), accounts, directory))
        .transpose()?;

    let hooks = raw
        .hooks
        .map(|rules| {
            rules
                .into_iter()
                .enumerate()
                .map(|(i, rule)| match rule {
                    Value::Object(_) => Ok(rule),
                    _ => Err(AuditError::ParseError(format!(
                        "{path}.hooks[{i}] must be an object"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let network = raw.network.map(|network| NetworkPolicy {
        ignore_groups: network.ignore_groups.into_iter().collect(),
        ignore_prefix: network.ignore_prefix.filter(|p| !p.is_empty()),
        ip_exceptions: network.ip_exceptions,
        global_exceptions: network.global_exceptions,
    });

    let repositories = raw.repositories.map(|r| RepositoryPolicy {
        require_private: r.require_private,
    });

    debug!(
        event = "Config",
        phase = "Provider",
        provider = name,
        accounts = accounts.is_some(),
        hooks = hooks.as_ref().map_or(0, Vec::len),
        network = network.is_some(),
        repositories = repositories.is_some()
    );

    Ok(ProviderPolicy {
        accounts,
        hooks,
        network,
        repositories,
    })
}

fn compile_accounts(
    path: &str,
    raw: RawAccounts,
    directory: &KnownIdentities,
) -> Result<AccountPolicy, AuditError> {
    let mut known_identities = KnownIdentities::new(&raw.known_identities);
    if raw.include_directory {
        known_identities.extend(directory);
    }

    let mut entries = Vec::with_capacity(raw.exceptions.len());
    for (key, value) in raw.exceptions {
        let descriptor = compile_exception(path, &key, value)?;
        entries.push((key, descriptor));
    }
    let exceptions = match raw.exception_mode {
        LookupMode::Exact => ExceptionRegistry::exact(entries),
        LookupMode::Pattern => ExceptionRegistry::pattern(entries)?,
    };

    let credentials = raw
        .credentials
        .map(|c| compile_credentials(&format!("{path}.credentials"), c))
        .transpose()?;

    let vault = raw
        .vault
        .map(|v| compile_vault(&format!("{path}.vault"), v))
        .transpose()?;

    Ok(AccountPolicy {
        known_identities,
        known_names: raw
            .known_names
            .iter()
            .map(|n| n.to_uppercase())
            .collect::<HashSet<_>>(),
        allowed_suffixes: raw
            .allowed_suffixes
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect(),
        exceptions,
        two_factor: raw.two_factor,
        credentials,
        vault,
    })
}

fn compile_exception(
    path: &str,
    key: &str,
    value: Value,
) -> Result<ExceptionDescriptor, AuditError> {
    let raw: RawException = serde_json::from_value(value)
        .map_err(|e| AuditError::ParseError(format!("{path}.exceptions['{key}']: {e}")))?;

    let allowed_until = raw
        .allowed_until
        .as_deref()
        .map(AllowedUntil::parse)
        .transpose()
        .map_err(|e| AuditError::InvalidDate(format!("{path}.exceptions['{key}']: {e}")))?;

    let mut requirements = Vec::new();
    if raw.restricted {
        requirements.push(Requirement::equals(attrs::IS_RESTRICTED, true));
    }
    if let Some(prefix) = raw.prefix {
        let attribute = raw
            .prefix_attribute
            .unwrap_or_else(|| attrs::DISPLAY_NAME.to_string());
        requirements.push(Requirement::starts_with(attribute, prefix));
    }
    for (attribute, expected) in &raw.required_attributes {
        requirements.push(Requirement::equals(
            attribute.as_str(),
            AttrValue::from_json(expected),
        ));
    }

    Ok(ExceptionDescriptor {
        description: raw.description,
        allowed_until,
        requirements,
    })
}

fn compile_vault(path: &str, raw: RawVault) -> Result<VaultPolicy, AuditError> {
    let lease_seconds = raw
        .lease_seconds
        .unwrap_or(VaultPolicy::DEFAULT_LEASE_SECONDS);
    if lease_seconds < 0 {
        return Err(AuditError::InvalidFormat(format!(
            "{path}.lease_seconds must not be negative, got {lease_seconds}"
        )));
    }
    Ok(VaultPolicy {
        users: raw.users.iter().map(|u| u.trim().to_lowercase()).collect(),
        auth_mechanism: raw
            .auth_mechanism
            .unwrap_or_else(|| VaultPolicy::DEFAULT_AUTH_MECHANISM.to_string())
            .to_lowercase(),
        lease_seconds,
    })
}

fn compile_credentials(path: &str, raw: RawCredentials) -> Result<CredentialPolicy, AuditError> {
    let required = |value: Option<i64>, field: &str| {
        value.ok_or_else(|| AuditError::MissingConfig(format!("{path}.{field}")))
    };
    Ok(CredentialPolicy {
        max_active_keys: raw.max_active_keys.unwrap_or(1),
        key_max_idle_days: required(raw.key_max_idle_days, "key_max_idle_days")?,
        login_max_idle_days: required(raw.login_max_idle_days, "login_max_idle_days")?,
    })
}
