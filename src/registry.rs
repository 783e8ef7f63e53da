//! Exception registry lookup.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::debug;

use crate::error::AuditError;
use crate::types::ExceptionDescriptor;

/// How registry keys are compared against entity keys.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LookupMode {
    /// Keys are canonical entity keys; lookup is a membership test.
    #[default]
    Exact,
    /// Keys are regular expressions matched from the start of the entity key.
    Pattern,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    key: String,
    matcher: Option<Regex>,
    descriptor: ExceptionDescriptor,
}

/// A registry hit: the configured key and its descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExceptionMatch<'a> {
    pub key: &'a str,
    pub descriptor: &'a ExceptionDescriptor,
}

/// Ordered exception registry. Iteration order is the configuration order.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRegistry {
    mode: LookupMode,
    entries: Vec<RegistryEntry>,
}

impl ExceptionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an exact-key registry. Keys are case-folded like account keys.
    pub fn exact<K: AsRef<str>>(
        entries: impl IntoIterator<Item = (K, ExceptionDescriptor)>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, descriptor)| RegistryEntry {
                key: key.as_ref().trim().to_lowercase(),
                matcher: None,
                descriptor,
            })
            .collect();
        Self {
            mode: LookupMode::Exact,
            entries,
        }
    }

    /// Build a pattern registry, compiling every key.
    ///
    /// Patterns are anchored at the start of the entity key only; add `$` to require a
    /// full match. Matching ignores case, like every other key comparison.
    pub fn pattern<K: AsRef<str>>(
        entries: impl IntoIterator<Item = (K, ExceptionDescriptor)>,
    ) -> Result<Self, AuditError> {
        let entries = entries
            .into_iter()
            .map(|(key, descriptor)| {
                let key = key.as_ref();
                let matcher = RegexBuilder::new(&format!("^(?:{key})"))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| AuditError::InvalidPattern(format!("'{key}': {e}")))?;
                Ok(RegistryEntry {
                    key: key.to_string(),
                    matcher: Some(matcher),
                    descriptor,
                })
            })
            .collect::<Result<Vec<_>, AuditError>>()?;
        Ok(Self {
            mode: LookupMode::Pattern,
            entries,
        })
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Find the exception governing `key`, if any.
    ///
    /// In pattern mode every entry is tested and the *last* match in configuration
    /// order wins. Overlapping patterns are a configuration smell; the shadowed
    /// matches are logged at debug level.
    pub fn lookup(&self, key: &str) -> Option<ExceptionMatch<'_>> {
        let found = match self.mode {
            LookupMode::Exact => {
                let key = key.to_lowercase();
                self.entries.iter().rfind(|e| e.key == key)
            }
            LookupMode::Pattern => {
                let mut last = None;
                for entry in &self.entries {
                    if !entry.matcher.as_ref().is_some_and(|m| m.is_match(key)) {
                        continue;
                    }
                    if let Some(previous) = last.replace(entry) {
                        debug!(
                            event = "Lookup",
                            phase = "Pattern",
                            key = key,
                            shadowed = previous.key.as_str(),
                            winner = entry.key.as_str()
                        );
                    }
                }
                last
            }
        };

        found.map(|e| ExceptionMatch {
            key: &e.key,
            descriptor: &e.descriptor,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }
}
