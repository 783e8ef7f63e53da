use tracing::debug;

use crate::network::{GrantClass, NetworkGrant, NetworkPolicy};
use crate::types::{Basis, Check, EntityRecord, Failure, attrs};

use super::Outcome;

pub(crate) fn evaluate(policy: &NetworkPolicy, entity: &EntityRecord) -> Outcome {
    let rule = entity.key();
    let Some(group) = entity.str_attr(attrs::GROUP) else {
        return fail(Check::GrantFormat, format!("grant {rule} has no owning group"));
    };
    let place = match entity.str_attr(attrs::REGION) {
        Some(region) => format!("{group} ({region})"),
        None => group.to_string(),
    };

    let grant = match NetworkGrant::parse(rule) {
        Ok(grant) => grant,
        Err(e) => return fail(Check::GrantFormat, format!("{place}: {e}")),
    };

    let class = policy.classify(group, &grant);
    debug!(
        event = "Evaluate",
        phase = "Grant",
        group = group,
        rule = rule,
        class = ?class
    );

    match class {
        GrantClass::IgnoredGroup => (Some(Basis::IgnoredGroup), vec![]),
        GrantClass::GlobalAllowed => (Some(Basis::GlobalException), vec![]),
        GrantClass::IgnoredPrefix => (Some(Basis::IgnoredPrefix), vec![]),
        GrantClass::KnownNetwork { description } => {
            (Some(Basis::IpException { description }), vec![])
        }
        GrantClass::Unclassified => (Some(Basis::Unclassified), vec![]),
        GrantClass::GlobalDenied => fail(
            Check::GlobalException,
            format!("{place} opens {rule} to the world without a global exception"),
        ),
        GrantClass::UnknownNetwork => fail(
            Check::KnownNetwork,
            format!("{place} grants {rule} to unknown network {}", grant.network),
        ),
    }
}

fn fail(check: Check, reason: String) -> Outcome {
    (None, vec![Failure::new(check, reason)])
}
