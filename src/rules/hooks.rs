use serde_json::Value;
use tracing::debug;

use crate::structural::first_match;
use crate::types::{Basis, Check, EntityRecord, Failure, attrs};

use super::Outcome;

/// A hook passes when at least one allow-list rule is a loose subset of its payload.
pub(crate) fn evaluate(rules: &[Value], entity: &EntityRecord) -> Outcome {
    let key = entity.key();
    let Some(raw) = entity.attr(attrs::RAW).and_then(|v| v.as_structured()) else {
        return (
            None,
            vec![Failure::new(
                Check::HookAllowed,
                format!("hook {key} carries no payload to match"),
            )],
        );
    };

    match first_match(rules, raw) {
        Some(index) => {
            debug!(event = "Evaluate", phase = "Hook", key = key, rule = index);
            (Some(Basis::AllowListEntry { index }), vec![])
        }
        None => (
            None,
            vec![Failure::new(
                Check::HookAllowed,
                format!(
                    "hook {key} matches none of the {} allowed hook rules",
                    rules.len()
                ),
            )],
        ),
    }
}
