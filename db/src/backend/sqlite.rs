//! SQLite backend implementation.
//!
//! Each [`SqliteConnection`] owns a dedicated worker thread holding the
//! `rusqlite::Connection`. Async callers send requests over a channel and wait on
//! a oneshot reply, so the blocking SQLite API never runs on the async runtime
//! and rows are stepped one at a time as the cursor is advanced.
//!
//! A worker serves at most one open cursor. While it is open the connection
//! still accepts plain executions, which is what lets a transaction commit with
//! a result stream pending.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Batch, ErrorCode, InterruptHandle, Rows, Statement};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{Command, Connection, DbTransaction, IsolationLevel, Row, RowCursor, ValueRow};
use crate::error::{DbError, DbResult};
use crate::query::Query;
use crate::runner::Runner;
use crate::value::SqlValue;

/// Busy timeout applied when none is configured.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const PARAMETER_PREFIXES: [char; 3] = [':', '@', '$'];

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => DbError::Cancelled,
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => DbError::Busy {
                message: err.to_string(),
            },
            _ => DbError::query(err.to_string()),
        }
    }
}

type Reply<T> = oneshot::Sender<DbResult<T>>;
type Bindings = Vec<(String, SqlValue)>;

/// Shape of the result set a cursor was just positioned on.
#[derive(Debug)]
struct ResultSetInfo {
    /// Column names, or `None` when the batch has no further result set.
    columns: Option<Vec<String>>,
    affected: Option<u64>,
}

enum Request {
    Execute {
        sql: String,
        bindings: Bindings,
        reply: Reply<u64>,
    },
    OpenReader {
        sql: String,
        bindings: Bindings,
        reply: Reply<ResultSetInfo>,
    },
    Read {
        reply: Reply<Option<Vec<SqlValue>>>,
    },
    NextResult {
        reply: Reply<ResultSetInfo>,
    },
    CloseCursor {
        reply: Option<Reply<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Where the worker goes after a cursor is finished.
enum Flow {
    Continue,
    Shutdown(Option<oneshot::Sender<()>>),
}

enum RowsOutcome {
    NextResult(Reply<ResultSetInfo>),
    Closed,
    Shutdown(Option<oneshot::Sender<()>>),
}

enum Target {
    File(PathBuf),
    Memory,
}

/// Request channel to a connection's worker, shared with its commands,
/// cursors and transactions.
#[derive(Clone)]
struct Channel {
    requests: Sender<Request>,
    interrupt: Arc<InterruptHandle>,
}

fn closed_error() -> DbError {
    DbError::query("connection is closed")
}

impl Channel {
    /// Sends a request and waits for its reply, interrupting SQLite when
    /// `cancel` fires first.
    async fn call<T>(
        &self,
        cancel: &CancellationToken,
        make: impl FnOnce(Reply<T>) -> Request,
    ) -> DbResult<T> {
        self.call_or_discard(cancel, make, |_| {}).await
    }

    /// Like [`call`](Self::call), handing a success that arrives after
    /// cancellation to `discard` so the worker can undo it.
    async fn call_or_discard<T>(
        &self,
        cancel: &CancellationToken,
        make: impl FnOnce(Reply<T>) -> Request,
        discard: impl FnOnce(T),
    ) -> DbResult<T> {
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        let (tx, mut rx) = oneshot::channel();
        self.requests.send(make(tx)).map_err(|_| closed_error())?;

        tokio::select! {
            reply = &mut rx => reply.map_err(|_| closed_error())?,
            _ = cancel.cancelled() => {
                self.interrupt.interrupt();
                // keep the worker in step before reporting
                if let Ok(Ok(late)) = rx.await {
                    discard(late);
                }
                Err(DbError::Cancelled)
            }
        }
    }

    fn post(&self, request: Request) {
        let _ = self.requests.send(request);
    }
}

/// A SQLite connection served by its own worker thread.
pub struct SqliteConnection {
    channel: Channel,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Self> {
        Self::start(Target::File(path.as_ref().to_path_buf()), busy_timeout).await
    }

    /// Opens a private in-memory database that lives as long as this connection.
    pub async fn open_in_memory() -> DbResult<Self> {
        Self::start(Target::Memory, DEFAULT_BUSY_TIMEOUT).await
    }

    async fn start(target: Target, busy_timeout: Duration) -> DbResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (requests, inbox) = mpsc::channel();

        thread::Builder::new()
            .name("rowrunner-sqlite".to_string())
            .spawn(move || {
                let opened = match &target {
                    Target::File(path) => rusqlite::Connection::open(path),
                    Target::Memory => rusqlite::Connection::open_in_memory(),
                }
                .and_then(|conn| conn.busy_timeout(busy_timeout).map(|_| conn));

                match opened {
                    Ok(conn) => {
                        let interrupt = Arc::new(conn.get_interrupt_handle());
                        if ready_tx.send(Ok(interrupt)).is_ok() {
                            run_worker(conn, inbox);
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(DbError::ConnectionFailed {
                            message: e.to_string(),
                        }));
                    }
                }
            })
            .map_err(|e| DbError::ConnectionFailed {
                message: format!("failed to start worker thread: {}", e),
            })?;

        let interrupt = ready_rx.await.map_err(|_| DbError::ConnectionFailed {
            message: "worker thread exited during open".to_string(),
        })??;
        tracing::debug!("Opened SQLite connection");

        Ok(Self {
            channel: Channel { requests, interrupt },
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(closed_error());
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn create_command(&self, query: &Query) -> DbResult<Box<dyn Command>> {
        self.ensure_open()?;
        Ok(Box::new(SqliteCommand {
            channel: self.channel.clone(),
            sql: query.statement().to_string(),
            bindings: query
                .bindings()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }))
    }

    async fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
        cancel: &CancellationToken,
    ) -> DbResult<Box<dyn DbTransaction>> {
        self.ensure_open()?;
        let sql = match isolation {
            Some(IsolationLevel::Serializable) => "BEGIN IMMEDIATE",
            Some(IsolationLevel::ReadUncommitted) => "PRAGMA read_uncommitted = 1; BEGIN",
            _ => "BEGIN DEFERRED",
        };
        self.channel
            .call(cancel, |reply| Request::Execute {
                sql: sql.to_string(),
                bindings: Vec::new(),
                reply,
            })
            .await?;

        Ok(Box::new(SqliteTransaction {
            channel: self.channel.clone(),
            active: true,
        }))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.channel.post(Request::Close { reply: tx });
        let _ = rx.await;
        tracing::debug!("Closed SQLite connection");
    }
}

struct SqliteCommand {
    channel: Channel,
    sql: String,
    bindings: Bindings,
}

#[async_trait]
impl Command for SqliteCommand {
    async fn execute_non_query(&mut self, cancel: &CancellationToken) -> DbResult<u64> {
        let (sql, bindings) = (self.sql.clone(), self.bindings.clone());
        self.channel
            .call(cancel, |reply| Request::Execute { sql, bindings, reply })
            .await
    }

    async fn execute_reader(&mut self, cancel: &CancellationToken) -> DbResult<Box<dyn RowCursor>> {
        let (sql, bindings) = (self.sql.clone(), self.bindings.clone());
        let info = self
            .channel
            .call_or_discard(
                cancel,
                |reply| Request::OpenReader { sql, bindings, reply },
                |_| {
                    tracing::debug!("Reader opened after cancellation; closing it");
                    self.channel.post(Request::CloseCursor { reply: None });
                },
            )
            .await?;

        let mut cursor = SqliteCursor {
            channel: self.channel.clone(),
            columns: Vec::new(),
            has_result: false,
            current: None,
            affected: None,
            closed: false,
        };
        cursor.position(info);
        Ok(Box::new(cursor))
    }

    async fn close(&mut self) {}
}

struct SqliteCursor {
    channel: Channel,
    columns: Vec<String>,
    has_result: bool,
    current: Option<ValueRow>,
    affected: Option<u64>,
    closed: bool,
}

impl SqliteCursor {
    fn position(&mut self, info: ResultSetInfo) {
        self.has_result = info.columns.is_some();
        self.columns = info.columns.unwrap_or_default();
        self.affected = info.affected;
        self.current = None;
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::query("cursor is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl RowCursor for SqliteCursor {
    async fn read(&mut self, cancel: &CancellationToken) -> DbResult<bool> {
        self.ensure_open()?;
        self.current = None;
        if !self.has_result {
            return Ok(false);
        }
        let values = self.channel.call(cancel, |reply| Request::Read { reply }).await?;
        self.current = values.map(|values| ValueRow::new(self.columns.clone(), values));
        Ok(self.current.is_some())
    }

    async fn next_result(&mut self, cancel: &CancellationToken) -> DbResult<bool> {
        self.ensure_open()?;
        let info = self
            .channel
            .call(cancel, |reply| Request::NextResult { reply })
            .await?;
        self.position(info);
        Ok(self.has_result)
    }

    fn row(&self) -> Option<&dyn Row> {
        self.current.as_ref().map(|row| row as &dyn Row)
    }

    fn records_affected(&self) -> Option<u64> {
        self.affected
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.current = None;
        let (tx, rx) = oneshot::channel();
        self.channel.post(Request::CloseCursor { reply: Some(tx) });
        let _ = rx.await;
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        if !self.closed {
            self.channel.post(Request::CloseCursor { reply: None });
        }
    }
}

struct SqliteTransaction {
    channel: Channel,
    active: bool,
}

impl SqliteTransaction {
    async fn finish(&mut self, sql: &str, cancel: &CancellationToken) -> DbResult<()> {
        if !self.active {
            return Err(DbError::TransactionFailed {
                message: "transaction already completed".to_string(),
            });
        }
        let sql = sql.to_string();
        self.channel
            .call(cancel, |reply| Request::Execute {
                sql,
                bindings: Vec::new(),
                reply,
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DbTransaction for SqliteTransaction {
    async fn commit(&mut self, cancel: &CancellationToken) -> DbResult<()> {
        self.finish("COMMIT", cancel).await?;
        self.active = false;
        Ok(())
    }

    async fn rollback(&mut self, cancel: &CancellationToken) -> DbResult<()> {
        let result = self.finish("ROLLBACK", cancel).await;
        self.active = false;
        result
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.active {
            tracing::warn!("Transaction dropped while active; rolling back");
            let (reply, _) = oneshot::channel();
            self.channel.post(Request::Execute {
                sql: "ROLLBACK".to_string(),
                bindings: Vec::new(),
                reply,
            });
        }
    }
}

/// Builds a [`Runner`] that opens a fresh connection to `path` for every call
/// and closes it when the call's resources are released.
pub fn sqlite_runner(path: impl AsRef<Path>) -> Runner {
    sqlite_runner_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Like [`sqlite_runner`] with an explicit busy timeout.
pub fn sqlite_runner_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Runner {
    let path = Arc::new(path.as_ref().to_path_buf());
    Runner::new(
        move || {
            let path = Arc::clone(&path);
            async move {
                let conn = SqliteConnection::open(path.as_path(), busy_timeout).await?;
                Ok::<Box<dyn Connection>, DbError>(Box::new(conn))
            }
            .boxed()
        },
        close_connection,
    )
}

/// Builds a [`Runner`] whose connections each get a private in-memory database.
///
/// Nothing survives between calls; useful for one-shot batches.
pub fn memory_runner() -> Runner {
    Runner::new(
        || {
            async move {
                let conn = SqliteConnection::open_in_memory().await?;
                Ok::<Box<dyn Connection>, DbError>(Box::new(conn))
            }
            .boxed()
        },
        close_connection,
    )
}

fn close_connection(conn: Box<dyn Connection>) -> futures::future::BoxFuture<'static, ()> {
    async move { conn.close().await }.boxed()
}

// Worker side

fn run_worker(conn: rusqlite::Connection, inbox: Receiver<Request>) {
    let mut close_reply = None;
    while let Ok(request) = inbox.recv() {
        let flow = match request {
            Request::OpenReader {
                sql,
                bindings,
                reply,
            } => serve_cursor(&conn, &inbox, &sql, &bindings, reply),
            Request::Close { reply } => Flow::Shutdown(Some(reply)),
            other => {
                handle_idle(&conn, other);
                Flow::Continue
            }
        };
        if let Flow::Shutdown(reply) = flow {
            close_reply = reply;
            break;
        }
    }
    drop(conn);
    if let Some(reply) = close_reply {
        let _ = reply.send(());
    }
}

/// Serves requests that do not need an open cursor.
fn handle_idle(conn: &rusqlite::Connection, request: Request) {
    match request {
        Request::Execute {
            sql,
            bindings,
            reply,
        } => {
            let _ = reply.send(execute_all(conn, &sql, &bindings));
        }
        Request::OpenReader { reply, .. } => {
            let _ = reply.send(Err(DbError::Busy {
                message: "connection already has an open cursor".to_string(),
            }));
        }
        Request::Read { reply } => {
            let _ = reply.send(Err(DbError::query("no open cursor")));
        }
        Request::NextResult { reply } => {
            let _ = reply.send(Err(DbError::query("no open cursor")));
        }
        Request::CloseCursor { reply } => {
            if let Some(reply) = reply {
                let _ = reply.send(Ok(()));
            }
        }
        Request::Close { reply } => {
            let _ = reply.send(());
        }
    }
}

/// Runs every statement of `sql`, draining any rows, and sums the changes of
/// the writing statements.
fn execute_all(conn: &rusqlite::Connection, sql: &str, bindings: &[(String, SqlValue)]) -> DbResult<u64> {
    let mut batch = Batch::new(conn, sql);
    let mut total = 0u64;
    while let Some(mut stmt) = batch.next()? {
        bind_all(&mut stmt, bindings)?;
        if stmt.column_count() > 0 {
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
        } else {
            let writes = !stmt.readonly();
            let changes = stmt.raw_execute()?;
            if writes {
                total += changes as u64;
            }
        }
    }
    Ok(total)
}

/// Holds the cursor for one reader until it is closed, serving interleaved
/// plain executions on the same connection.
fn serve_cursor(
    conn: &rusqlite::Connection,
    inbox: &Receiver<Request>,
    sql: &str,
    bindings: &[(String, SqlValue)],
    reply: Reply<ResultSetInfo>,
) -> Flow {
    let mut batch = Batch::new(conn, sql);
    let mut exhausted = false;
    let mut opened = false;
    let mut reply = reply;

    loop {
        let mut affected = None;
        let advanced = if exhausted {
            Ok(None)
        } else {
            advance(&mut batch, bindings, &mut affected)
        };
        let (mut current, info) = match advanced {
            Ok(stmt) => {
                let columns = stmt.as_ref().map(|stmt| {
                    stmt.column_names()
                        .into_iter()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                });
                (stmt, Ok(ResultSetInfo { columns, affected }))
            }
            Err(e) if !opened => {
                // no cursor exists on the caller side
                let _ = reply.send(Err(e));
                return Flow::Continue;
            }
            Err(e) => (None, Err(e)),
        };
        exhausted |= current.is_none();
        opened = true;
        let _ = reply.send(info);

        match serve_rows(conn, inbox, current.as_mut()) {
            RowsOutcome::NextResult(next) => reply = next,
            RowsOutcome::Closed => return Flow::Continue,
            RowsOutcome::Shutdown(close) => return Flow::Shutdown(close),
        }
    }
}

/// Moves to the next statement of the batch that yields columns, executing
/// the ones that do not.
fn advance<'conn>(
    batch: &mut Batch<'conn, '_>,
    bindings: &[(String, SqlValue)],
    affected: &mut Option<u64>,
) -> DbResult<Option<Statement<'conn>>> {
    while let Some(mut stmt) = batch.next()? {
        bind_all(&mut stmt, bindings)?;
        if stmt.column_count() > 0 {
            return Ok(Some(stmt));
        }
        let writes = !stmt.readonly();
        let changes = stmt.raw_execute()?;
        if writes {
            *affected = Some(affected.unwrap_or(0) + changes as u64);
        }
    }
    Ok(None)
}

fn serve_rows(
    conn: &rusqlite::Connection,
    inbox: &Receiver<Request>,
    stmt: Option<&mut Statement<'_>>,
) -> RowsOutcome {
    let width = stmt.as_ref().map_or(0, |s| s.column_count());
    let mut rows = stmt.map(|s| s.raw_query());

    loop {
        let Ok(request) = inbox.recv() else {
            return RowsOutcome::Shutdown(None);
        };
        match request {
            Request::Read { reply } => {
                let row = match rows.as_mut() {
                    Some(rows) => read_row(rows, width),
                    None => Ok(None),
                };
                let _ = reply.send(row);
            }
            Request::NextResult { reply } => return RowsOutcome::NextResult(reply),
            Request::CloseCursor { reply } => {
                drop(rows);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
                return RowsOutcome::Closed;
            }
            Request::Close { reply } => return RowsOutcome::Shutdown(Some(reply)),
            other => handle_idle(conn, other),
        }
    }
}

fn read_row(rows: &mut Rows<'_>, width: usize) -> DbResult<Option<Vec<SqlValue>>> {
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let values = (0..width)
        .map(|i| row.get_ref(i).map(from_sqlite))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(values))
}

fn bind_all(stmt: &mut Statement<'_>, bindings: &[(String, SqlValue)]) -> DbResult<()> {
    for (name, value) in bindings {
        if let Some(index) = parameter_index(stmt, name)? {
            stmt.raw_bind_parameter(index, to_sqlite(value))
                .map_err(|e| DbError::Binding {
                    message: format!("{}: {}", name, e),
                })?;
        }
    }
    Ok(())
}

/// Finds the placeholder for a binding key; keys without a prefix match any
/// of `:name`, `@name` and `$name`.
fn parameter_index(stmt: &Statement<'_>, name: &str) -> DbResult<Option<usize>> {
    if name.starts_with(PARAMETER_PREFIXES) {
        return Ok(stmt.parameter_index(name)?);
    }
    for prefix in PARAMETER_PREFIXES {
        if let Some(index) = stmt.parameter_index(&format!("{}{}", prefix, name))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn to_sqlite(value: &SqlValue) -> SqliteValue {
    match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Int(i) => SqliteValue::Integer(*i),
        SqlValue::Float(f) => SqliteValue::Real(*f),
        SqlValue::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        SqlValue::Str(s) => SqliteValue::Text(s.clone()),
        SqlValue::Blob(b) => SqliteValue::Blob(b.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(t) => SqlValue::Str(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}
