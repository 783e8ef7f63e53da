//! Time windows for exceptions.

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AuditError;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// The `allowed_until` date of an exception, parsed as midnight UTC of that day.
///
/// An exception expires at the *start* of its `allowed_until` day: evaluation at
/// `00:00:00` of that date is already out of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedUntil {
    raw: String,
    expires_at: DateTime<Utc>,
}

impl AllowedUntil {
    /// Parse a `d/m/Y` date. Single-digit days and months are accepted.
    pub fn parse(value: &str) -> Result<Self, AuditError> {
        let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
            AuditError::InvalidDate(format!("'{value}' is not a dd/mm/yyyy date ({e})"))
        })?;
        Ok(Self {
            raw: value.trim().to_string(),
            expires_at: date.and_time(chrono::NaiveTime::MIN).and_utc(),
        })
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl Display for AllowedUntil {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.raw)
    }
}
