//! Driver boundary.
//!
//! This module provides trait definitions for the database primitives the runner
//! consumes: connections, commands, forward-only row cursors and transactions.
//! Every operation that can block is `async` and takes the caller's
//! cancellation token. Drivers release their resources in `close`, and must also
//! release them without blocking when dropped unclosed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{DbResult, ParseError};
use crate::query::Query;
use crate::value::{SqlValue, Value};

/// Trait for accessing column values in a database row.
///
/// A row represents a single result row from a query, providing access
/// to individual column values by index or by name.
pub trait Row: Send + Sync {
    /// Retrieves the value at the specified column index.
    fn get(&self, index: usize) -> Option<&dyn Value>;

    /// Returns the number of columns in this row.
    fn len(&self) -> usize;

    /// Returns the names of the columns, in position order.
    fn columns(&self) -> &[String];

    /// Returns true if the row is empty (contains no columns).
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a column name (case-insensitive) to its position.
    fn column_index(&self, name: &str) -> Result<usize, ParseError> {
        self.columns()
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Returns whether the cell at `index` is SQL NULL.
    fn is_null(&self, index: usize) -> Result<bool, ParseError> {
        self.get(index)
            .map(|v| v.is_null())
            .ok_or(ParseError::ColumnOutOfRange {
                index,
                len: self.len(),
            })
    }
}

/// Owned row of [`SqlValue`] cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl ValueRow {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

impl Row for ValueRow {
    fn get(&self, index: usize) -> Option<&dyn Value> {
        self.values.get(index).map(|v| v as &dyn Value)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Transaction isolation levels a driver may honour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// An open database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Creates a command for the statement and bindings of `query`.
    fn create_command(&self, query: &Query) -> DbResult<Box<dyn Command>>;

    /// Starts a transaction on this connection.
    async fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
        cancel: &CancellationToken,
    ) -> DbResult<Box<dyn DbTransaction>>;

    /// Closes the connection. Further use fails.
    async fn close(&self);
}

/// A statement ready to run on its connection.
#[async_trait]
pub trait Command: Send {
    /// Runs the statement and returns the number of affected rows.
    async fn execute_non_query(&mut self, cancel: &CancellationToken) -> DbResult<u64>;

    /// Runs the statement and returns a cursor positioned before the first row
    /// of the first result set.
    async fn execute_reader(&mut self, cancel: &CancellationToken) -> DbResult<Box<dyn RowCursor>>;

    /// Releases the command.
    async fn close(&mut self);
}

/// Driver-native forward-only cursor over one or more result sets.
#[async_trait]
pub trait RowCursor: Send {
    /// Advances to the next row; false at end of the current result set.
    async fn read(&mut self, cancel: &CancellationToken) -> DbResult<bool>;

    /// Advances to the next result set of a batch; false when there is none.
    async fn next_result(&mut self, cancel: &CancellationToken) -> DbResult<bool>;

    /// The row the cursor is positioned on, if any.
    fn row(&self) -> Option<&dyn Row>;

    /// Rows changed by the statement, when the driver reports it.
    fn records_affected(&self) -> Option<u64>;

    /// Releases the cursor.
    async fn close(&mut self);
}

/// A transaction scope on one connection.
#[async_trait]
pub trait DbTransaction: Send {
    async fn commit(&mut self, cancel: &CancellationToken) -> DbResult<()>;

    async fn rollback(&mut self, cancel: &CancellationToken) -> DbResult<()>;
}

#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_row() -> ValueRow {
        ValueRow::new(
            vec!["id".into(), "Name".into(), "note".into()],
            vec![SqlValue::Int(1), SqlValue::Str("a".into()), SqlValue::Null],
        )
    }

    #[rstest]
    fn test_row_access() {
        let row = sample_row();

        assert_eq!(row.len(), 3);
        assert!(!row.is_empty());
        assert!(row.get(0).is_some());
        assert!(row.get(3).is_none());
        assert_eq!(row.get(0).and_then(|v| v.as_i64()), Some(1));
    }

    #[rstest]
    #[case("id", Some(0))]
    #[case("name", Some(1))]
    #[case("NOTE", Some(2))]
    #[case("missing", None)]
    fn test_column_index(#[case] name: &str, #[case] expected: Option<usize>) {
        assert_eq!(sample_row().column_index(name).ok(), expected);
    }

    #[rstest]
    fn test_is_null() {
        let row = sample_row();
        assert_eq!(row.is_null(0), Ok(false));
        assert_eq!(row.is_null(2), Ok(true));
        assert_eq!(row.is_null(9), Err(ParseError::ColumnOutOfRange { index: 9, len: 3 }));
    }

    #[rstest]
    fn test_isolation_level_serde_names() {
        let level: IsolationLevel = serde_json::from_str("\"read_committed\"").unwrap();
        assert_eq!(level, IsolationLevel::ReadCommitted);
    }
}
