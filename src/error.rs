// src/error.rs
use std::time::Duration;

/// Failure classes surfaced to callers of the ledger.
///
/// `Conflict` is the only kind worth retrying as a whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Internal,
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
            Self::Validation => "validation",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Deadline of {0:?} exceeded, unit discarded")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Persistence(_) | Self::DeadlineExceeded(_) => ErrorKind::Internal,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// SQLSTATE codes the store maps onto ledger error kinds.
mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(sqlstate::SERIALIZATION_FAILURE) | Some(sqlstate::DEADLOCK_DETECTED) => {
                    Self::Conflict(db_err.message().to_string())
                }
                Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                    Self::NotFound(db_err.message().to_string())
                }
                _ => Self::Persistence(err.to_string()),
            },
            _ => Self::Persistence(err.to_string()),
        }
    }
}

/// Request-level validation failures, raised before the ledger is touched.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid {field}: must be >= {min}, got {actual}")]
    TooSmall {
        field: &'static str,
        min: i64,
        actual: i64,
    },

    #[error("Invalid {field}: expected {min}-{max}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Invalid {field}: must be <= {max}, got {actual}")]
    TooLarge {
        field: &'static str,
        max: i64,
        actual: i64,
    },

    #[error("Missing required field: {0}")]
    Missing(&'static str),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Unsupported currency: '{0}'")]
    UnsupportedCurrency(String),

    #[error("Cannot transfer from an account to itself: {0}")]
    SameAccount(i64),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        actual: String,
        expected: String,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LedgerError::NotFound("account 1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::Conflict("serialize".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LedgerError::Persistence("check constraint".into()).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            LedgerError::DeadlineExceeded(Duration::from_millis(5)).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            LedgerError::from(ValidationError::SameAccount(3)).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(LedgerError::Conflict("x".into()).is_retryable());
        assert!(!LedgerError::NotFound("x".into()).is_retryable());
        assert!(!LedgerError::Persistence("x".into()).is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pool_errors_map_to_persistence() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }
}
