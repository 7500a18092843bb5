//! Query execution over a connection provider.
//!
//! Every execution mode follows the same skeleton:
//!
//! ```text
//! acquire connection -> build command -> execute -> continuation
//!                                                    |- release now        (no result, single)
//!                                                    '- hand off to stream (run, run_many)
//! ```
//!
//! [`Runner`] acquires a fresh connection per call; [`TransactionRunner`] reuses
//! the connection of an open transaction. Both share the continuations below and
//! implement [`Execute`].

pub mod transaction;

pub use transaction::TransactionRunner;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::backend::{Command, Connection, IsolationLevel, RowCursor};
use crate::cursor::{read_single, Completion, QueryResult, ResultSet};
use crate::error::{DbError, DbResult};
use crate::parse::RowParser;
use crate::query::Query;
use crate::shared::Shared;

/// Opens a connection for one call.
pub type ConnectionProvider =
    Arc<dyn Fn() -> BoxFuture<'static, DbResult<Box<dyn Connection>>> + Send + Sync>;

/// Releases a connection once nothing uses it any more.
pub type ConnectionDisposer = Arc<dyn Fn(Box<dyn Connection>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Connection shared between a call, its result streams and its transaction.
pub type SharedConnection = Shared<Box<dyn Connection>>;

/// The four execution modes.
///
/// Streamed results own a share of their connection, so they stay valid after
/// the call that produced them returns.
#[async_trait]
pub trait Execute: Send + Sync {
    /// Runs a statement for its side effects and returns the affected-row count.
    async fn run_no_result(&self, query: &Query, cancel: &CancellationToken) -> DbResult<u64>;

    /// Reads exactly one row.
    ///
    /// Fails with [`DbError::NoRows`] or [`DbError::TooManyRows`] otherwise; the
    /// connection is released before returning either way.
    async fn run_single<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<T>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send;

    /// Streams the rows of a single result set.
    async fn run<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<QueryResult<T>>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send;

    /// Streams the result sets of a multi-statement batch.
    async fn run_many(&self, query: &Query, cancel: &CancellationToken) -> DbResult<ResultSet>;
}

/// Runs queries on connections obtained from a provider.
///
/// The runner holds no connection between calls. Cloning is cheap.
#[derive(Clone)]
pub struct Runner {
    provider: ConnectionProvider,
    disposer: ConnectionDisposer,
    default_isolation: Option<IsolationLevel>,
}

impl Runner {
    pub fn new(
        provider: impl Fn() -> BoxFuture<'static, DbResult<Box<dyn Connection>>> + Send + Sync + 'static,
        disposer: impl Fn(Box<dyn Connection>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            disposer: Arc::new(disposer),
            default_isolation: None,
        }
    }

    /// Isolation level used by [`transaction`](Self::transaction).
    pub fn with_default_isolation(mut self, isolation: Option<IsolationLevel>) -> Self {
        self.default_isolation = isolation;
        self
    }

    pub fn default_isolation(&self) -> Option<IsolationLevel> {
        self.default_isolation
    }

    /// Opens a connection and wraps it in a handle whose last disposal hands it
    /// back to the disposer.
    pub(crate) async fn acquire(&self, cancel: &CancellationToken) -> DbResult<SharedConnection> {
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        let conn = tokio::select! {
            conn = (self.provider)() => conn?,
            _ = cancel.cancelled() => return Err(DbError::Cancelled),
        };
        tracing::debug!("Connection acquired");

        let disposer = Arc::clone(&self.disposer);
        Ok(Shared::new(conn, move |conn| {
            let release = disposer(conn);
            async move {
                release.await;
                tracing::debug!("Connection released");
            }
            .boxed()
        }))
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("default_isolation", &self.default_isolation)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Execute for Runner {
    async fn run_no_result(&self, query: &Query, cancel: &CancellationToken) -> DbResult<u64> {
        let conn = self.acquire(cancel).await?;
        no_result(conn, query, cancel).await
    }

    async fn run_single<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<T>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send,
    {
        let parser = parser.into();
        let conn = self.acquire(cancel).await?;
        single(conn, query, parser, cancel).await
    }

    async fn run<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<QueryResult<T>>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send,
    {
        let parser = parser.into();
        let conn = self.acquire(cancel).await?;
        stream(conn, query, parser, cancel, None).await
    }

    async fn run_many(&self, query: &Query, cancel: &CancellationToken) -> DbResult<ResultSet> {
        let conn = self.acquire(cancel).await?;
        batch(conn, query, cancel, None).await
    }
}

/// A connection share plus the command built on it.
struct Lease {
    conn: SharedConnection,
    command: Box<dyn Command>,
}

impl Lease {
    /// Builds the command; the share is disposed if that fails.
    async fn open(mut conn: SharedConnection, query: &Query) -> DbResult<Self> {
        let command = match conn.value().and_then(|c| c.create_command(query)) {
            Ok(command) => command,
            Err(e) => {
                conn.dispose().await;
                return Err(e);
            }
        };
        tracing::debug!(statement = %query.statement(), "Executing statement");
        Ok(Self { conn, command })
    }

    async fn release(mut self) {
        self.command.close().await;
        self.conn.dispose().await;
    }

    /// Moves the lease into a completion owned by a result stream.
    fn hand_off(self) -> Completion {
        Completion::new(move || self.release().boxed())
    }
}

pub(crate) async fn no_result(conn: SharedConnection, query: &Query, cancel: &CancellationToken) -> DbResult<u64> {
    let mut lease = Lease::open(conn, query).await?;
    let affected = lease.command.execute_non_query(cancel).await;
    lease.release().await;
    affected
}

pub(crate) async fn single<T: Send + 'static>(
    conn: SharedConnection,
    query: &Query,
    parser: RowParser<T>,
    cancel: &CancellationToken,
) -> DbResult<T> {
    let mut lease = Lease::open(conn, query).await?;
    let opened = lease.command.execute_reader(cancel).await;
    let value = match opened {
        Ok(mut cursor) => {
            let value = read_single(cursor.as_mut(), &parser, cancel).await;
            cursor.close().await;
            value
        }
        Err(e) => Err(e),
    };
    lease.release().await;
    value
}

/// Opens the stream of one result set. Reads also answer to `call` when given.
pub(crate) async fn stream<T: Send + 'static>(
    conn: SharedConnection,
    query: &Query,
    parser: RowParser<T>,
    cancel: &CancellationToken,
    call: Option<&CancellationToken>,
) -> DbResult<QueryResult<T>> {
    let mut lease = Lease::open(conn, query).await?;
    let opened = lease.command.execute_reader(cancel).await;
    match opened {
        Ok(cursor) => {
            let cursor = with_call(cursor, call);
            Ok(QueryResult::new(cursor, parser, cancel.clone(), lease.hand_off()))
        }
        Err(e) => {
            lease.release().await;
            Err(e)
        }
    }
}

pub(crate) async fn batch(
    conn: SharedConnection,
    query: &Query,
    cancel: &CancellationToken,
    call: Option<&CancellationToken>,
) -> DbResult<ResultSet> {
    let mut lease = Lease::open(conn, query).await?;
    let opened = lease.command.execute_reader(cancel).await;
    match opened {
        Ok(cursor) => Ok(ResultSet::new(with_call(cursor, call), cancel.clone(), lease.hand_off())),
        Err(e) => {
            lease.release().await;
            Err(e)
        }
    }
}

fn with_call(cursor: Box<dyn RowCursor>, call: Option<&CancellationToken>) -> Box<dyn RowCursor> {
    match call {
        Some(call) => transaction::link_cursor(cursor, call),
        None => cursor,
    }
}
