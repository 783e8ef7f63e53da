//! Exception descriptors and the attribute requirements they carry.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::validity::AllowedUntil;

use super::attr_value::AttrValue;
use super::entity::EntityRecord;

/// A constraint an entity must satisfy for an exception to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// The attribute must be present and equal to `expected`.
    Equals { attribute: String, expected: AttrValue },
    /// The attribute must be a string starting with `prefix`.
    StartsWith { attribute: String, prefix: String },
}

impl Requirement {
    pub fn equals(attribute: impl Into<String>, expected: impl Into<AttrValue>) -> Self {
        Requirement::Equals {
            attribute: attribute.into(),
            expected: expected.into(),
        }
    }

    pub fn starts_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Requirement::StartsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Requirement::Equals { attribute, .. } | Requirement::StartsWith { attribute, .. } => {
                attribute
            }
        }
    }

    pub fn is_satisfied_by(&self, entity: &EntityRecord) -> bool {
        match self {
            Requirement::Equals {
                attribute,
                expected,
            } => entity.attr(attribute) == Some(expected),
            Requirement::StartsWith { attribute, prefix } => entity
                .str_attr(attribute)
                .is_some_and(|value| value.starts_with(prefix.as_str())),
        }
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Requirement::Equals {
                attribute,
                expected,
            } => write!(f, "{attribute} == {expected}"),
            Requirement::StartsWith { attribute, prefix } => {
                write!(f, "{attribute} starts with {prefix:?}")
            }
        }
    }
}

/// A configured waiver for an otherwise unknown entity.
///
/// No `allowed_until` means the exception never expires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionDescriptor {
    pub description: Option<String>,
    pub allowed_until: Option<AllowedUntil>,
    pub requirements: Vec<Requirement>,
}

impl ExceptionDescriptor {
    pub fn permanent() -> Self {
        Self::default()
    }

    pub fn until(allowed_until: AllowedUntil) -> Self {
        Self {
            allowed_until: Some(allowed_until),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Requirements the entity does not satisfy, in configuration order.
    pub fn unmet_requirements<'a>(
        &'a self,
        entity: &'a EntityRecord,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.requirements
            .iter()
            .filter(move |r| !r.is_satisfied_by(entity))
    }
}
