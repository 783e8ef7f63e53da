//! Loose-subset matching of structured payloads against allow-list rules.

use serde_json::Value;

/// Returns true when `rule` is a loose subset of `record`.
///
/// For every key of a rule mapping the record must carry that key. Nested mappings
/// recurse, text values must occur as a substring of the record's value (rendered
/// as text when it is not a string), and every other value must be equal. Any miss
/// is a plain `false`; nothing here is an error.
pub fn loose_subset(rule: &Value, record: &Value) -> bool {
    match rule {
        Value::Object(fields) => {
            let Value::Object(record_fields) = record else {
                return false;
            };
            fields.iter().all(|(key, expected)| {
                record_fields
                    .get(key)
                    .is_some_and(|actual| loose_subset(expected, actual))
            })
        }
        Value::String(needle) => match record {
            Value::String(haystack) => haystack.contains(needle.as_str()),
            other => other.to_string().contains(needle.as_str()),
        },
        Value::Number(expected) => match record {
            Value::Number(actual) => expected == actual || expected.as_f64() == actual.as_f64(),
            _ => false,
        },
        other => other == record,
    }
}

/// Index of the first allow-list rule matching `record`.
pub fn first_match(rules: &[Value], record: &Value) -> Option<usize> {
    rules.iter().position(|rule| loose_subset(rule, record))
}
