use std::sync::{Arc, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuditConfig;

#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditError {
    #[error("invalid exception date: {0}")]
    InvalidDate(String),

    #[error("invalid exception pattern: {0}")]
    InvalidPattern(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Poisoned lock error: {0}")]
    PoisonedLockError(String),
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::ParseError(err.to_string())
    }
}

impl From<PoisonError<RwLockReadGuard<'_, Arc<AuditConfig>>>> for AuditError {
    fn from(err: PoisonError<RwLockReadGuard<'_, Arc<AuditConfig>>>) -> Self {
        AuditError::PoisonedLockError(err.to_string())
    }
}

impl From<PoisonError<RwLockWriteGuard<'_, Arc<AuditConfig>>>> for AuditError {
    fn from(err: PoisonError<RwLockWriteGuard<'_, Arc<AuditConfig>>>) -> Self {
        AuditError::PoisonedLockError(err.to_string())
    }
}
