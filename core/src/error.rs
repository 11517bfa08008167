use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoyaltyError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Store error ({kind:?}): {source}")]
    Store {
        kind: StoreErrorKind,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

impl LoyaltyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The data-access classification, if this error came from the store.
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Self::Store { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Typed classification of data-access failures.
/// Callers branch on this, never on the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    ConstraintViolation,
    PermissionDenied,
    InvalidStatement,
    Busy,
    Other,
}

impl StoreErrorKind {
    pub fn classify(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                ErrorCode::ConstraintViolation => Self::ConstraintViolation,
                ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied => Self::PermissionDenied,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Busy,
                // SQLITE_ERROR: bad SQL or a missing table/column.
                ErrorCode::Unknown if e.extended_code == 1 => Self::InvalidStatement,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

impl From<rusqlite::Error> for LoyaltyError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Store {
            kind: StoreErrorKind::classify(&source),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_is_not_found() {
        let err: LoyaltyError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.store_kind(), Some(StoreErrorKind::NotFound));
    }

    #[test]
    fn missing_table_is_classified_without_reading_the_message() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: LoyaltyError = conn
            .prepare("SELECT * FROM does_not_exist")
            .map(|_| ())
            .unwrap_err()
            .into();
        assert_eq!(err.store_kind(), Some(StoreErrorKind::InvalidStatement));
    }

    #[test]
    fn validation_is_not_a_store_error() {
        assert_eq!(LoyaltyError::validation("bad").store_kind(), None);
    }
}
