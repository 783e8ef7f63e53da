//! Account identity, two-factor and credential checks.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{AccountPolicy, CredentialPolicy, TwoFactorPolicy, VaultPolicy};
use crate::registry::ExceptionMatch;
use crate::types::{Basis, Check, EntityRecord, Failure, attrs};

use super::Outcome;

const VAULT_PREFIX: &str = "vault-";

/// The identity check runs first and decides the basis; two-factor and credential
/// checks are independent predicates that add their own failures.
pub(crate) fn evaluate(
    policy: &AccountPolicy,
    entity: &EntityRecord,
    now: DateTime<Utc>,
) -> Outcome {
    let mut failures = Vec::new();
    let exception = policy.exceptions.lookup(entity.key());

    let basis = identity(policy, entity, exception, now, &mut failures);
    two_factor(policy.two_factor, entity, exception.is_some(), &mut failures);
    if let Some(credentials) = &policy.credentials {
        credential_hygiene(credentials, entity, now, &mut failures);
    }

    (basis, failures)
}

fn identity(
    policy: &AccountPolicy,
    entity: &EntityRecord,
    exception: Option<ExceptionMatch<'_>>,
    now: DateTime<Utc>,
    failures: &mut Vec<Failure>,
) -> Option<Basis> {
    let key = entity.key();

    if let Some(vault) = &policy.vault
        && let Some(tokens) = vault_tokens(key)
    {
        return vault_user(vault, key, &tokens, now, failures);
    }

    if let Some(hit) = exception {
        return exception_basis(hit, entity, now, failures);
    }

    if policy.known_identities.contains(key) {
        return Some(Basis::KnownIdentity);
    }

    if let Some(suffix) = policy
        .allowed_suffixes
        .iter()
        .find(|suffix| key.ends_with(suffix.to_lowercase().as_str()))
    {
        return Some(Basis::AllowedSuffix {
            suffix: suffix.clone(),
        });
    }

    if entity
        .str_attr(attrs::DISPLAY_NAME)
        .is_some_and(|name| policy.known_names.contains(&name.to_uppercase()))
    {
        return Some(Basis::KnownName);
    }

    failures.push(Failure::new(
        Check::KnownIdentity,
        format!("{key} is not a known identity and has no exception"),
    ));
    None
}

/// A matched exception decides the identity check on its own, even for keys that
/// are also known identities.
fn exception_basis(
    hit: ExceptionMatch<'_>,
    entity: &EntityRecord,
    now: DateTime<Utc>,
    failures: &mut Vec<Failure>,
) -> Option<Basis> {
    let key = entity.key();
    let before = failures.len();

    if let Some(until) = &hit.descriptor.allowed_until
        && !until.is_valid_at(now)
    {
        failures.push(Failure::new(
            Check::ExceptionExpired,
            format!("{key}: exception {} expired on {until}", hit.key),
        ));
    }

    for requirement in hit.descriptor.unmet_requirements(entity) {
        failures.push(Failure::new(
            Check::ExceptionAttribute,
            format!(
                "{key}: exception {} requires {requirement} (found {})",
                hit.key,
                entity
                    .attr(requirement.attribute())
                    .map_or_else(|| "nothing".to_string(), ToString::to_string)
            ),
        ));
    }

    debug!(
        event = "Evaluate",
        phase = "Exception",
        key = key,
        exception = hit.key,
        failures = failures.len() - before
    );

    (failures.len() == before).then(|| Basis::Exception {
        key: hit.key.to_string(),
    })
}

/// Split `vault-{auth}-{user}-{policy}-{epoch}-{suffix}`.
fn vault_tokens(key: &str) -> Option<Vec<&str>> {
    if !key.starts_with(VAULT_PREFIX) {
        return None;
    }
    let tokens: Vec<&str> = key.split('-').collect();
    (tokens.len() == 6).then_some(tokens)
}

fn vault_user(
    vault: &VaultPolicy,
    key: &str,
    tokens: &[&str],
    now: DateTime<Utc>,
    failures: &mut Vec<Failure>,
) -> Option<Basis> {
    let before = failures.len();
    let mut fail = |reason: String| failures.push(Failure::new(Check::VaultLease, reason));

    if tokens[1] != vault.auth_mechanism {
        fail(format!(
            "{key} was issued through '{}', expected '{}'",
            tokens[1], vault.auth_mechanism
        ));
    }
    if !vault.users.contains(tokens[3]) {
        fail(format!("{key} belongs to unknown vault user '{}'", tokens[3]));
    }

    let earliest = now
        .timestamp()
        .saturating_sub(vault.lease_seconds)
        .saturating_sub(VaultPolicy::GRACE_SECONDS);
    match tokens[4].parse::<i64>() {
        Ok(created) if created > earliest => {}
        Ok(created) => fail(format!(
            "{key} was created at {created}, outside the {}s lease",
            vault.lease_seconds
        )),
        Err(_) => fail(format!("{key} has no creation time ('{}')", tokens[4])),
    }

    (failures.len() == before).then_some(Basis::VaultUser)
}

fn two_factor(
    policy: TwoFactorPolicy,
    entity: &EntityRecord,
    excepted: bool,
    failures: &mut Vec<Failure>,
) {
    let required = match policy {
        TwoFactorPolicy::Never => false,
        TwoFactorPolicy::Always => true,
        TwoFactorPolicy::UnlessExcepted => !excepted,
        TwoFactorPolicy::WithPassword => entity.bool_attr(attrs::HAS_PASSWORD) == Some(true),
    };
    if !required {
        return;
    }

    let key = entity.key();
    match entity.bool_attr(attrs::HAS_TWO_FACTOR) {
        Some(true) => {}
        Some(false) => failures.push(Failure::new(
            Check::TwoFactor,
            format!("{key} does not have two-factor authentication enabled"),
        )),
        None => failures.push(Failure::new(
            Check::TwoFactor,
            format!("{key} has no two-factor status"),
        )),
    }
}

fn credential_hygiene(
    policy: &CredentialPolicy,
    entity: &EntityRecord,
    now: DateTime<Utc>,
    failures: &mut Vec<Failure>,
) {
    let key = entity.key();

    if let Some(count) = entity
        .attr(attrs::ACTIVE_KEY_COUNT)
        .and_then(|v| v.as_long())
        && count > policy.max_active_keys
    {
        failures.push(Failure::new(
            Check::SingleKey,
            format!(
                "{key} has {count} active access keys (at most {} allowed)",
                policy.max_active_keys
            ),
        ));
    }

    // Never-used keys have no timestamp and pass.
    if let Some(days) = days_since(entity, attrs::KEY_LAST_USED, now)
        && days >= policy.key_max_idle_days
    {
        failures.push(Failure::new(
            Check::KeyActivity,
            format!(
                "{key} last used an access key {days} days ago (limit {})",
                policy.key_max_idle_days
            ),
        ));
    }

    if entity.bool_attr(attrs::HAS_PASSWORD) == Some(true) {
        match days_since(entity, attrs::PASSWORD_LAST_USED, now) {
            Some(days) if days <= policy.login_max_idle_days => {}
            Some(days) => failures.push(Failure::new(
                Check::LoginActivity,
                format!(
                    "{key} last logged in {days} days ago (limit {})",
                    policy.login_max_idle_days
                ),
            )),
            None => failures.push(Failure::new(
                Check::LoginActivity,
                format!("{key} has a password but has never logged in"),
            )),
        }
    }
}

/// Whole days between the timestamp attribute and `now`.
fn days_since(entity: &EntityRecord, attribute: &str, now: DateTime<Utc>) -> Option<i64> {
    entity
        .attr(attribute)
        .and_then(|v| v.as_timestamp())
        .map(|at| (now - at).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnownIdentities;
    use crate::registry::ExceptionRegistry;
    use crate::types::{ExceptionDescriptor, Requirement};
    use crate::validity::AllowedUntil;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use yare::parameterized;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn policy() -> AccountPolicy {
        AccountPolicy {
            known_identities: KnownIdentities::new(["alice@example.com", "bob@example.com"]),
            exceptions: ExceptionRegistry::exact([
                (
                    "guest@partner.com",
                    ExceptionDescriptor::until(AllowedUntil::parse("01/01/2099").unwrap())
                        .with_requirement(Requirement::equals(attrs::IS_RESTRICTED, true)),
                ),
                (
                    "bob@example.com",
                    ExceptionDescriptor::until(AllowedUntil::parse("01/01/2020").unwrap()),
                ),
            ]),
            ..AccountPolicy::default()
        }
    }

    fn checks(outcome: &Outcome) -> Vec<Check> {
        outcome.1.iter().map(|f| f.check).collect()
    }

    #[test]
    fn test_known_identity() {
        let outcome = evaluate(&policy(), &EntityRecord::account("Alice@Example.com"), now());
        assert_eq!(outcome, (Some(Basis::KnownIdentity), vec![]));
    }

    #[test]
    fn test_unknown_identity() {
        let outcome = evaluate(&policy(), &EntityRecord::account("mallory@evil.com"), now());
        assert_eq!(outcome.0, None);
        assert_eq!(checks(&outcome), vec![Check::KnownIdentity]);
        assert!(outcome.1[0].reason.contains("mallory@evil.com"));
    }

    #[parameterized(
        restricted = { true, vec![] },
        full_member = { false, vec![Check::ExceptionAttribute] },
    )]
    fn test_exception_requirements(restricted: bool, expected: Vec<Check>) {
        let entity =
            EntityRecord::account("guest@partner.com").with_attr(attrs::IS_RESTRICTED, restricted);
        assert_eq!(checks(&evaluate(&policy(), &entity, now())), expected);
    }

    #[test]
    fn test_missing_attribute_fails_requirement() {
        let outcome = evaluate(&policy(), &EntityRecord::account("guest@partner.com"), now());
        assert_eq!(checks(&outcome), vec![Check::ExceptionAttribute]);
        assert!(outcome.1[0].reason.contains("found nothing"));
    }

    #[test]
    fn test_matched_exception_is_authoritative() {
        // bob is a known identity, but his expired exception still decides.
        let outcome = evaluate(&policy(), &EntityRecord::account("bob@example.com"), now());
        assert_eq!(outcome.0, None);
        assert_eq!(checks(&outcome), vec![Check::ExceptionExpired]);
    }

    #[test]
    fn test_allowed_suffix_and_known_name() {
        let policy = AccountPolicy {
            allowed_suffixes: vec![".gserviceaccount.com".to_string()],
            known_names: HashSet::from(["JANE DOE".to_string()]),
            ..policy()
        };

        let service = EntityRecord::account("builder@project.iam.gserviceaccount.com");
        assert_eq!(
            evaluate(&policy, &service, now()).0,
            Some(Basis::AllowedSuffix {
                suffix: ".gserviceaccount.com".to_string()
            })
        );

        let named = EntityRecord::account("1234567890").with_attr(attrs::DISPLAY_NAME, "Jane Doe");
        assert_eq!(evaluate(&policy, &named, now()), (Some(Basis::KnownName), vec![]));

        let shouting = AccountPolicy {
            allowed_suffixes: vec![".GServiceAccount.COM".to_string()],
            ..policy.clone()
        };
        assert!(matches!(
            evaluate(&shouting, &service, now()).0,
            Some(Basis::AllowedSuffix { .. })
        ));

        let stranger = EntityRecord::account("987").with_attr(attrs::DISPLAY_NAME, "John Roe");
        assert_eq!(checks(&evaluate(&policy, &stranger, now())), vec![Check::KnownIdentity]);
    }

    #[parameterized(
        never_without_status = { TwoFactorPolicy::Never, None, None, vec![] },
        always_enabled = { TwoFactorPolicy::Always, Some(true), None, vec![] },
        always_disabled = { TwoFactorPolicy::Always, Some(false), None, vec![Check::TwoFactor] },
        always_missing = { TwoFactorPolicy::Always, None, None, vec![Check::TwoFactor] },
        password_user = { TwoFactorPolicy::WithPassword, Some(false), Some(true), vec![Check::TwoFactor] },
        key_only_user = { TwoFactorPolicy::WithPassword, Some(false), Some(false), vec![] },
        unless_excepted_known = { TwoFactorPolicy::UnlessExcepted, Some(false), None, vec![Check::TwoFactor] },
    )]
    fn test_two_factor_policy(
        two_factor: TwoFactorPolicy,
        enabled: Option<bool>,
        has_password: Option<bool>,
        expected: Vec<Check>,
    ) {
        let policy = AccountPolicy {
            two_factor,
            ..policy()
        };
        let mut entity = EntityRecord::account("alice@example.com");
        if let Some(enabled) = enabled {
            entity = entity.with_attr(attrs::HAS_TWO_FACTOR, enabled);
        }
        if let Some(has_password) = has_password {
            entity = entity.with_attr(attrs::HAS_PASSWORD, has_password);
        }
        let outcome = evaluate(&policy, &entity, now());
        assert_eq!(outcome.0, Some(Basis::KnownIdentity));
        assert_eq!(checks(&outcome), expected);
    }

    #[test]
    fn test_two_factor_and_identity_fail_independently() {
        let policy = AccountPolicy {
            two_factor: TwoFactorPolicy::Always,
            ..policy()
        };
        let entity = EntityRecord::account("mallory@evil.com").with_attr(attrs::HAS_TWO_FACTOR, false);
        assert_eq!(
            checks(&evaluate(&policy, &entity, now())),
            vec![Check::KnownIdentity, Check::TwoFactor]
        );
    }

    #[test]
    fn test_unless_excepted_ignores_exception_validity() {
        let policy = AccountPolicy {
            two_factor: TwoFactorPolicy::UnlessExcepted,
            ..policy()
        };
        // The exception is expired, yet it still exempts bob from two-factor.
        let entity = EntityRecord::account("bob@example.com").with_attr(attrs::HAS_TWO_FACTOR, false);
        assert_eq!(
            checks(&evaluate(&policy, &entity, now())),
            vec![Check::ExceptionExpired]
        );
    }

    fn credential_policy() -> AccountPolicy {
        AccountPolicy {
            credentials: Some(CredentialPolicy {
                max_active_keys: 1,
                key_max_idle_days: 90,
                login_max_idle_days: 30,
            }),
            ..policy()
        }
    }

    #[parameterized(
        one_key = { 1, None, vec![] },
        two_keys = { 2, None, vec![Check::SingleKey] },
        recently_used = { 1, Some(89), vec![] },
        idle_exactly_at_limit = { 1, Some(90), vec![Check::KeyActivity] },
        idle_and_duplicated = { 3, Some(200), vec![Check::SingleKey, Check::KeyActivity] },
    )]
    fn test_access_keys(active: i64, last_used_days_ago: Option<i64>, expected: Vec<Check>) {
        let mut entity =
            EntityRecord::account("alice@example.com").with_attr(attrs::ACTIVE_KEY_COUNT, active);
        if let Some(days) = last_used_days_ago {
            entity = entity.with_attr(attrs::KEY_LAST_USED, now() - Duration::days(days));
        }
        assert_eq!(checks(&evaluate(&credential_policy(), &entity, now())), expected);
    }

    #[parameterized(
        recent_login = { Some(30), vec![] },
        stale_login = { Some(31), vec![Check::LoginActivity] },
        never_logged_in = { None, vec![Check::LoginActivity] },
    )]
    fn test_password_login_activity(days_ago: Option<i64>, expected: Vec<Check>) {
        let mut entity =
            EntityRecord::account("alice@example.com").with_attr(attrs::HAS_PASSWORD, true);
        if let Some(days) = days_ago {
            entity = entity.with_attr(attrs::PASSWORD_LAST_USED, now() - Duration::days(days));
        }
        assert_eq!(checks(&evaluate(&credential_policy(), &entity, now())), expected);
    }

    #[test]
    fn test_login_activity_ignored_without_password() {
        let entity = EntityRecord::account("alice@example.com").with_attr(attrs::HAS_PASSWORD, false);
        assert!(evaluate(&credential_policy(), &entity, now()).1.is_empty());
    }

    fn vault_policy() -> AccountPolicy {
        AccountPolicy {
            vault: Some(VaultPolicy {
                users: HashSet::from(["alice".to_string()]),
                auth_mechanism: "ldap".to_string(),
                lease_seconds: 3600,
            }),
            ..policy()
        }
    }

    fn vault_key(auth: &str, user: &str, created: i64) -> String {
        format!("vault-{auth}-{user}-readonly-{created}-a1b2c3")
    }

    #[test]
    fn test_vault_user_within_lease() {
        let key = vault_key("ldap", "alice", now().timestamp() - 600);
        let outcome = evaluate(&vault_policy(), &EntityRecord::account(key), now());
        assert_eq!(outcome, (Some(Basis::VaultUser), vec![]));
    }

    #[parameterized(
        wrong_mechanism = { "token", "alice", 0, 1 },
        unknown_user = { "ldap", "mallory", 0, 1 },
        lease_expired = { "ldap", "alice", 3721, 1 },
        all_wrong = { "aws", "mallory", 7200, 3 },
    )]
    fn test_vault_user_failures(auth: &str, user: &str, age_seconds: i64, expected: usize) {
        let key = vault_key(auth, user, now().timestamp() - age_seconds);
        let outcome = evaluate(&vault_policy(), &EntityRecord::account(key), now());
        assert_eq!(outcome.0, None);
        assert_eq!(outcome.1.len(), expected);
        assert!(outcome.1.iter().all(|f| f.check == Check::VaultLease));
    }

    #[test]
    fn test_vault_epoch_must_be_numeric() {
        let entity = EntityRecord::account("vault-ldap-alice-readonly-soon-a1b2c3");
        let outcome = evaluate(&vault_policy(), &entity, now());
        assert_eq!(checks(&outcome), vec![Check::VaultLease]);
        assert!(outcome.1[0].reason.contains("no creation time"));
    }

    #[test]
    fn test_vault_lease_boundary() {
        let earliest = now().timestamp() - 3600 - 120;
        let at_boundary = EntityRecord::account(vault_key("ldap", "alice", earliest));
        let after_boundary = EntityRecord::account(vault_key("ldap", "alice", earliest + 1));
        assert_eq!(
            checks(&evaluate(&vault_policy(), &at_boundary, now())),
            vec![Check::VaultLease]
        );
        assert!(evaluate(&vault_policy(), &after_boundary, now()).1.is_empty());
    }

    #[parameterized(
        too_few_tokens = { "vault-ldap-alice-1700000000" },
        not_a_vault_key = { "ldap-alice-readonly-1700000000-x-y" },
    )]
    fn test_non_vault_keys_use_identity_check(key: &str) {
        assert_eq!(
            checks(&evaluate(&vault_policy(), &EntityRecord::account(key), now())),
            vec![Check::KnownIdentity]
        );
    }

    #[parameterized(
        endless_lease = { i64::MAX, true },
        inverted_lease = { i64::MIN, false },
    )]
    fn test_vault_lease_extremes(lease_seconds: i64, compliant: bool) {
        let mut policy = vault_policy();
        if let Some(vault) = policy.vault.as_mut() {
            vault.lease_seconds = lease_seconds;
        }
        let entity = EntityRecord::account(vault_key("ldap", "alice", 0));
        assert_eq!(evaluate(&policy, &entity, now()).1.is_empty(), compliant);
    }

    #[test]
    fn test_vault_keys_without_vault_policy() {
        let key = vault_key("ldap", "alice", now().timestamp());
        assert_eq!(
            checks(&evaluate(&policy(), &EntityRecord::account(key), now())),
            vec![Check::KnownIdentity]
        );
    }
}
