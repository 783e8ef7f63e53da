use crate::config::RepositoryPolicy;
use crate::types::{Basis, Check, EntityRecord, Failure, attrs};

use super::Outcome;

pub(crate) fn evaluate(policy: &RepositoryPolicy, entity: &EntityRecord) -> Outcome {
    if !policy.require_private {
        return (None, vec![]);
    }
    match entity.bool_attr(attrs::IS_PRIVATE) {
        Some(true) => (Some(Basis::PrivateRepository), vec![]),
        Some(false) => (
            None,
            vec![Failure::new(
                Check::PrivateRepository,
                format!("repository {} is public", entity.key()),
            )],
        ),
        None => (
            None,
            vec![Failure::new(
                Check::PrivateRepository,
                format!("repository {} has no visibility", entity.key()),
            )],
        ),
    }
}
