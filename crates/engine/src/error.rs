//! The module contains the error the engine can throw.
//!
//! Every variant maps onto one of four [`ErrorKind`]s, which is what callers
//! translate into client-facing responses:
//!
//! - [`KeyNotFound`] a referenced transaction or origin is absent.
//! - [`ExistingKey`] the store rejected a write on a unique constraint.
//! - [`StaleRecord`] a record changed between read and conditional write.
//! - [`InvalidArgument`] bad pagination, unknown direction, bad amount.
//! - [`Internal`] and [`PartialReconciliation`] storage failures.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`StaleRecord`]: EngineError::StaleRecord
//!  [`InvalidArgument`]: EngineError::InvalidArgument
//!  [`Internal`]: EngineError::Internal
//!  [`PartialReconciliation`]: EngineError::PartialReconciliation
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Coarse classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidArgument,
    Internal,
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("\"{0}\" was modified concurrently!")]
    StaleRecord(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Internal error: {0}")]
    Internal(String),
    /// A two-leg reconciliation stopped after the first leg was applied.
    ///
    /// The balance of `applied_origin_id` already reflects the mutation while
    /// `pending_origin_id` does not. Never retry automatically: the first leg
    /// would be applied twice.
    #[error(
        "partial reconciliation of transaction {transaction_id}: \
         origin {applied_origin_id} adjusted, origin {pending_origin_id} not adjusted: {source}"
    )]
    PartialReconciliation {
        transaction_id: String,
        applied_origin_id: String,
        pending_origin_id: String,
        #[source]
        source: Box<EngineError>,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::ExistingKey(_) | Self::StaleRecord(_) => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Internal(_) | Self::PartialReconciliation { .. } => ErrorKind::Internal,
            Self::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::StaleRecord(a), Self::StaleRecord(b)) => a == b,
            (Self::InvalidArgument(a), Self::InvalidArgument(b)) => a == b,
            (Self::Internal(a), Self::Internal(b)) => a == b,
            (
                Self::PartialReconciliation {
                    transaction_id: a_tx,
                    applied_origin_id: a_applied,
                    pending_origin_id: a_pending,
                    ..
                },
                Self::PartialReconciliation {
                    transaction_id: b_tx,
                    applied_origin_id: b_applied,
                    pending_origin_id: b_pending,
                    ..
                },
            ) => a_tx == b_tx && a_applied == b_applied && a_pending == b_pending,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_reconciliation_is_internal() {
        let err = EngineError::PartialReconciliation {
            transaction_id: "tx".to_string(),
            applied_origin_id: "a".to_string(),
            pending_origin_id: "b".to_string(),
            source: Box::new(EngineError::KeyNotFound("origin not exists".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("origin a adjusted"));
    }

    #[test]
    fn database_errors_are_internal() {
        let err = EngineError::from(DbErr::Custom("boom".to_string()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(
            EngineError::ExistingKey("Cash".to_string()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::StaleRecord("tx".to_string()).kind(),
            ErrorKind::Conflict
        );
    }
}
