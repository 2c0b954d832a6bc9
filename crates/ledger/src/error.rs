//! The module contains the errors the ledger caches can throw.
//!
//! Two families are kept apart:
//!
//! - precondition violations from the controller ([`KeyNotFound`],
//!   [`ExistingKey`]): the caller asked for something the cache cannot do
//!   without breaking its indices.
//! - data errors ([`InvalidRecord`], [`UnknownAccount`],
//!   [`MissingDependency`], [`DependencyCycle`]): the stored data itself is
//!   inconsistent.
//!
//!  [`KeyNotFound`]: LedgerError::KeyNotFound
//!  [`ExistingKey`]: LedgerError::ExistingKey
//!  [`InvalidRecord`]: LedgerError::InvalidRecord
//!  [`UnknownAccount`]: LedgerError::UnknownAccount
//!  [`MissingDependency`]: LedgerError::MissingDependency
//!  [`DependencyCycle`]: LedgerError::DependencyCycle
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid month: {0}")]
    InvalidMonth(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(i64),
    #[error("Recurring operation {operation} depends on missing operation {dependency}")]
    MissingDependency { operation: i64, dependency: i64 },
    #[error("Dependency cycle through recurring operation {0}")]
    DependencyCycle(i64),
    #[error("No identifier left to mint")]
    IdsExhausted,
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidMonth(a), Self::InvalidMonth(b)) => a == b,
            (Self::InvalidRecord(a), Self::InvalidRecord(b)) => a == b,
            (Self::UnknownAccount(a), Self::UnknownAccount(b)) => a == b,
            (
                Self::MissingDependency {
                    operation: a,
                    dependency: b,
                },
                Self::MissingDependency {
                    operation: c,
                    dependency: d,
                },
            ) => a == c && b == d,
            (Self::DependencyCycle(a), Self::DependencyCycle(b)) => a == b,
            (Self::IdsExhausted, Self::IdsExhausted) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (Self::Csv(a), Self::Csv(b)) => a.to_string() == b.to_string(),
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
