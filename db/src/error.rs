//! Error types for query execution and row decoding.
//!
//! Two families are kept apart:
//! - [`ParseError`] is produced while decoding a row and travels as a value inside
//!   [`ParseResult`](crate::parse::ParseResult), so parser composition can short-circuit.
//! - [`DbError`] terminates a call at the runner boundary (driver failures,
//!   cardinality, cancellation, misuse of disposed resources, transactions).

use thiserror::Error;

/// Failure raised while decoding a single row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The cell was SQL NULL but a value was required.
    ///
    /// This is the only failure that `Optional`-style parsers recover from.
    #[error("Unexpected NULL in column {column}")]
    UnexpectedNull { column: usize },

    #[error("Failed to decode column {column}: {message}")]
    Decode { column: usize, message: String },

    #[error("Missing column '{name}' in query result")]
    ColumnNotFound { name: String },

    #[error("Column index {index} out of range for row with {len} columns")]
    ColumnOutOfRange { index: usize, len: usize },

    #[error("{0}")]
    Custom(String),
}

impl ParseError {
    /// Returns true for the distinguished "cell was NULL" failure.
    pub fn is_unexpected_null(&self) -> bool {
        matches!(self, ParseError::UnexpectedNull { .. })
    }

    pub fn decode(column: usize, message: impl Into<String>) -> Self {
        ParseError::Decode {
            column,
            message: message.into(),
        }
    }
}

/// Failure surfaced by a runner, transaction, result stream or shared handle.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open connection: {message}")]
    ConnectionFailed { message: String },

    #[error("Query failed: {message}")]
    QueryFailed { message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Expected a single value, but got nothing")]
    NoRows,

    #[error("Expected a single value, but got more than that")]
    TooManyRows,

    #[error("Reference already disposed")]
    HandleDisposed,

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Cursor is not positioned on a row")]
    CursorNotPositioned,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Connection is busy: {message}")]
    Busy { message: String },

    #[error("Invalid query binding: {message}")]
    Binding { message: String },

    #[error("Transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("Rollback failed: {message} (while handling: {original})")]
    RollbackFailed { message: String, original: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl DbError {
    /// Returns true when the failure came from a cancelled token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DbError::Cancelled)
    }

    pub(crate) fn query(message: impl Into<String>) -> Self {
        DbError::QueryFailed {
            message: message.into(),
        }
    }
}

/// Result alias used across the crate.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_unexpected_null_is_distinguished() {
        assert!(ParseError::UnexpectedNull { column: 0 }.is_unexpected_null());
        assert!(!ParseError::decode(0, "bad").is_unexpected_null());
        assert!(!ParseError::ColumnNotFound { name: "a".into() }.is_unexpected_null());
    }

    #[rstest]
    fn test_parse_error_converts_into_db_error() {
        let err: DbError = ParseError::UnexpectedNull { column: 2 }.into();
        assert!(matches!(err, DbError::Parse(ParseError::UnexpectedNull { column: 2 })));
        assert_eq!(err.to_string(), "Unexpected NULL in column 2");
    }

    #[rstest]
    #[case(DbError::NoRows, "Expected a single value, but got nothing")]
    #[case(DbError::TooManyRows, "Expected a single value, but got more than that")]
    #[case(DbError::HandleDisposed, "Reference already disposed")]
    fn test_error_messages(#[case] err: DbError, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }

    #[rstest]
    fn test_is_cancelled() {
        assert!(DbError::Cancelled.is_cancelled());
        assert!(!DbError::NoRows.is_cancelled());
    }
}
