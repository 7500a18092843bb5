//! Resource-safe query execution: composable row parsers, a runner that owns
//! connection lifetimes, transactions, and streaming results that release
//! their connection exactly once.

pub mod backend;
pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod parse;
pub mod query;
pub mod runner;
pub mod shared;
pub mod value;

#[cfg(all(any(test, feature = "test-utils"), feature = "backend-sqlite"))]
pub mod test_utils;

// Re-export commonly used items
pub use backend::{Command, Connection, DbTransaction, IsolationLevel, Row, RowCursor, ValueRow};
pub use config::{DatabaseConfig, RunnerConfig, CONFIG_FILE_NAME};
pub use cursor::{BlockingIter, QueryResult, Records, ResultSet};
pub use error::{DbError, DbResult, ParseError};
pub use parse::{CellParser, Maybe, NoValue, Nothing, ParseResult, RowParser};
pub use query::Query;
pub use runner::{Execute, Runner, TransactionRunner};
pub use shared::Shared;
pub use value::{FromValue, SqlValue, Value};

#[cfg(feature = "backend-sqlite")]
pub use backend::sqlite::{memory_runner, sqlite_runner, sqlite_runner_with_timeout, SqliteConnection};

pub use tokio_util::sync::CancellationToken;
