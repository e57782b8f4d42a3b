// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors surfaced by the ledger operations.
///
/// `Validation` and `NotFound` are meant for the caller as-is. `Integrity`
/// comes from a store constraint and is normally retried or rewrapped by the
/// operation that triggered it. `Sql` is an unexpected store failure that the
/// outermost boundary logs verbatim and reports generically.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    /// The entity does not exist or belongs to another owner. Both cases
    /// render identically.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store error: {0}")]
    Sql(rusqlite::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    /// True for failures whose details must not reach the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, LedgerError::Sql(_))
    }

    /// Rewrites a unique-constraint failure into a caller-facing validation
    /// message, leaving every other error untouched.
    pub fn or_duplicate(self, msg: &str) -> Self {
        match self {
            LedgerError::Integrity(_) => LedgerError::Validation(msg.to_string()),
            other => other,
        }
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        if is_constraint_violation(&value) {
            return LedgerError::Integrity(value.to_string());
        }
        match value {
            rusqlite::Error::QueryReturnedNoRows => LedgerError::NotFound("row"),
            value => {
                tracing::error!("unhandled store error: {}", value);
                LedgerError::Sql(value)
            }
        }
    }
}
