use chrono::TimeZone;
use insta::{assert_json_snapshot, assert_snapshot};
use itertools::Itertools;
use yare::parameterized;

use super::*;
use crate::types::{Basis, Check, EntityKind, Verdict, attrs};


const TEST_CONFIG: &str = r#"{
    "directory": ["alice@example.com", "bob@example.com", "carol@example.com"],
    "providers": {
        "slack": {
            "accounts": {
                "two_factor": "unless_excepted",
                "exceptions": {
                    "partner@external.com": {
                        "description": "Agency contact",
                        "allowed_until": "01/07/2025",
                        "restricted": true
                    },
                    "bot@example.com": { "description": "Deploy notifications" }
                }
            }
        },
        "atlassian": {
            "accounts": {
                "exception_mode": "pattern",
                "exceptions": {
                    "^ext-.*@partner\\.com$": { "allowed_until": "01/01/2099" },
                    "^contractor-": {
                        "allowed_until": "01/01/2099",
                        "prefix": "EXT ",
                        "prefix_attribute": "display_name"
                    }
                }
            }
        },
        "github": {
            "accounts": { "known_identities": ["octocat"], "two_factor": "always" },
            "hooks": [
                { "config": { "url": "https://hooks.slack.com/services/" } },
                { "name": "travis", "config": { "domain": "notify.travis-ci.org" } }
            ],
            "repositories": { "require_private": true }
        },
        "aws": {
            "accounts": {
                "include_directory": false,
                "known_identities": ["deploy"],
                "two_factor": "with_password",
                "credentials": { "key_max_idle_days": 90, "login_max_idle_days": 30 },
                "vault": { "users": ["alice"] }
            },
            "network": {
                "ignore_groups": ["autoscaling-generated"],
                "ignore_prefix": "10.",
                "ip_exceptions": { "203.0.113.10/32": "office egress" },
                "global_exceptions": { "web-sg": ["TCP-443-443-0.0.0.0/0"] }
            }
        }
    }
}"#;

fn auditor() -> Auditor {
    Auditor::new_from_str(TEST_CONFIG).unwrap()
}

fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
}

fn now() -> DateTime<Utc> {
    at(2025, 6, 15, 12, 0, 0)
}

fn verdict(provider: &str, entity: &EntityRecord) -> Verdict {
    auditor().evaluate_at(provider, entity, now()).unwrap().verdict
}

#[parameterized(
    slack_directory_user = { "slack", "Alice@Example.com", Verdict::Compliant },
    slack_stranger = { "slack", "mallory@evil.com", Verdict::NonCompliant },
    atlassian_directory_user = { "atlassian", "carol@example.com", Verdict::Compliant },
    aws_directory_excluded = { "aws", "alice@example.com", Verdict::NonCompliant },
    aws_known_user = { "aws", "deploy", Verdict::Compliant },
)]
fn test_known_identity_set(provider: &str, key: &str, expected: Verdict) {
    assert_eq!(verdict(provider, &EntityRecord::account(key)), expected);
}

#[test]
fn test_evaluation_is_idempotent() {
    let auditor = auditor();
    let entity = EntityRecord::account("partner@external.com").with_attr(attrs::IS_RESTRICTED, true);
    let first = auditor.evaluate_at("slack", &entity, now()).unwrap();
    let second = auditor.evaluate_at("slack", &entity, now()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_provider_is_a_configuration_error() {
    let result = auditor().evaluate_at("okta", &EntityRecord::account("alice@example.com"), now());
    assert!(matches!(result, Err(AuditError::MissingConfig(_))));
}

#[parameterized(
    hooks_on_slack = { "slack", EntityKind::Hook },
    grants_on_github = { "github", EntityKind::NetworkGrant },
    repositories_on_aws = { "aws", EntityKind::Repository },
)]
fn test_missing_policy_section(provider: &str, kind: EntityKind) {
    let err = auditor()
        .evaluate_at(provider, &EntityRecord::new(kind, "x"), now())
        .unwrap_err();
    assert_eq!(
        err,
        AuditError::MissingConfig(format!("providers.{provider} has no policy for {kind} entities"))
    );
}

#[test]
fn test_repository_visibility() {
    assert_eq!(
        verdict("github", &EntityRecord::repository("acme/api", true)),
        Verdict::Compliant
    );
    assert_eq!(
        verdict("github", &EntityRecord::repository("acme/website", false)),
        Verdict::NonCompliant
    );
}

#[test]
fn test_audit_reports_every_entity_in_order() {
    let entities = vec![
        EntityRecord::account("alice@example.com"),
        EntityRecord::account("mallory@evil.com"),
        EntityRecord::account("eve@evil.com"),
        EntityRecord::account("bot@example.com"),
    ];
    let report = auditor().audit_at("slack", &entities, now()).unwrap();

    assert_eq!(report.entities.len(), 4);
    assert_eq!(report.failure_count(), 2);
    assert_eq!(report.compliant_count(), 2);
    assert!(!report.is_clean());
    assert_eq!(
        report.entities.iter().map(|e| e.key.as_str()).collect_vec(),
        vec!["alice@example.com", "mallory@evil.com", "eve@evil.com", "bot@example.com"]
    );
    // One attributable failure per entity, never merged.
    assert_eq!(
        report.failures().map(|e| e.key.as_str()).collect_vec(),
        vec!["mallory@evil.com", "eve@evil.com"]
    );
}

#[test]
fn test_audit_rendering() {
    let entities = vec![
        EntityRecord::account("alice@example.com").with_attr(attrs::HAS_TWO_FACTOR, true),
        EntityRecord::account("bot@example.com"),
        EntityRecord::account("mallory@evil.com").with_attr(attrs::HAS_TWO_FACTOR, false),
    ];
    let report = auditor().audit_at("slack", &entities, now()).unwrap();
    let rendered = std::iter::once(report.to_string())
        .chain(report.entities.iter().map(ToString::to_string))
        .join("\n");

    assert_snapshot!(rendered, @r"
    slack: 3 evaluated, 1 non-compliant
    PASS account alice@example.com (known identity)
    PASS account bot@example.com (exception bot@example.com)
    FAIL account mallory@evil.com: known_identity: mallory@evil.com is not a known identity and has no exception; two_factor: mallory@evil.com does not have two-factor authentication enabled
    ");
}

#[test]
fn test_entity_report_json() {
    let entity = EntityRecord::account("partner@external.com").with_attr(attrs::IS_RESTRICTED, false);
    let report = auditor().evaluate_at("slack", &entity, now()).unwrap();

    assert_json_snapshot!(report, @r#"
    {
      "key": "partner@external.com",
      "kind": "account",
      "verdict": "non_compliant",
      "basis": null,
      "failures": [
        {
          "check": "exception_attribute",
          "reason": "partner@external.com: exception partner@external.com requires is_restricted == true (found false)"
        }
      ]
    }
    "#);
}

#[test]
fn test_parallel_evaluation_matches_sequential() {
    let auditor = auditor();
    let entities = (0..64)
        .map(|i| match i % 4 {
            0 => EntityRecord::account(format!("user{i}@example.com")),
            1 => EntityRecord::account("alice@example.com"),
            2 => EntityRecord::account("partner@external.com").with_attr(attrs::IS_RESTRICTED, i % 8 == 2),
            _ => EntityRecord::account("bot@example.com"),
        })
        .collect_vec();

    let sequential = auditor.audit_at("slack", &entities, now()).unwrap().entities;

    let parallel: Vec<EntityReport> = std::thread::scope(|scope| {
        let handles = entities
            .chunks(16)
            .map(|chunk| {
                let auditor = auditor.clone();
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|e| auditor.evaluate_at("slack", e, now()).unwrap())
                        .collect_vec()
                })
            })
            .collect_vec();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(parallel, sequential);
}

#[test]
fn test_basis_is_reported() {
    let report = auditor()
        .evaluate_at("github", &EntityRecord::repository("acme/api", true), now())
        .unwrap();
    assert_eq!(report.basis, Some(Basis::PrivateRepository));
    assert!(report.failed_checks().is_empty());

    let report = auditor()
        .evaluate_at("github", &EntityRecord::repository("acme/site", false), now())
        .unwrap();
    assert_eq!(report.failed_checks(), vec![Check::PrivateRepository]);
}
