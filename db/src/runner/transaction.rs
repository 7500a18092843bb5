//! Transactions and the runner bound to one.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::{batch, no_result, single, stream, Execute, Runner, SharedConnection};
use crate::backend::{DbTransaction, IsolationLevel, Row, RowCursor};
use crate::cursor::{QueryResult, ResultSet};
use crate::error::{DbError, DbResult};
use crate::parse::RowParser;
use crate::query::Query;

/// Runner over the connection of an open transaction.
///
/// Each call takes its own share of the connection, so a [`QueryResult`] or
/// [`ResultSet`] produced here may be consumed after the transaction has been
/// committed; the connection is released once the last share is gone.
///
/// Calls observe both the token passed to them and the token the transaction
/// was started with. Streams returned by [`run`](Execute::run) and
/// [`run_many`](Execute::run_many) keep observing both on every later read.
pub struct TransactionRunner {
    conn: SharedConnection,
    cancel: CancellationToken,
}

impl TransactionRunner {
    pub(crate) fn new(conn: SharedConnection, cancel: CancellationToken) -> Self {
        Self { conn, cancel }
    }

    /// Token the transaction was started with.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `op` under a child of the transaction token that is also cancelled
    /// when `call` fires while the operation is in flight.
    async fn linked<R, F, Fut>(&self, call: &CancellationToken, op: F) -> DbResult<R>
    where
        F: FnOnce(SharedConnection, CancellationToken) -> Fut,
        Fut: Future<Output = DbResult<R>>,
    {
        let token = self.cancel.child_token();
        let conn = self.conn.try_clone()?;
        follow(call, &token, op(conn, token.clone())).await
    }
}

/// Drives `op`, cancelling `token` if `call` fires first.
async fn follow<R>(call: &CancellationToken, token: &CancellationToken, op: impl Future<Output = R>) -> R {
    if call.is_cancelled() {
        token.cancel();
    }
    tokio::pin!(op);

    tokio::select! {
        biased;
        out = &mut op => return out,
        _ = call.cancelled() => token.cancel(),
    }
    op.await
}

/// Cursor of a transaction stream; each read also answers to the token of the
/// call that opened it.
struct CallLinkedCursor {
    inner: Box<dyn RowCursor>,
    call: CancellationToken,
}

pub(super) fn link_cursor(inner: Box<dyn RowCursor>, call: &CancellationToken) -> Box<dyn RowCursor> {
    Box::new(CallLinkedCursor {
        inner,
        call: call.clone(),
    })
}

#[async_trait]
impl RowCursor for CallLinkedCursor {
    async fn read(&mut self, cancel: &CancellationToken) -> DbResult<bool> {
        let token = cancel.child_token();
        follow(&self.call, &token, self.inner.read(&token)).await
    }

    async fn next_result(&mut self, cancel: &CancellationToken) -> DbResult<bool> {
        let token = cancel.child_token();
        follow(&self.call, &token, self.inner.next_result(&token)).await
    }

    fn row(&self) -> Option<&dyn Row> {
        self.inner.row()
    }

    fn records_affected(&self) -> Option<u64> {
        self.inner.records_affected()
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

impl std::fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRunner")
            .field("shares", &self.conn.ref_count())
            .finish()
    }
}

#[async_trait]
impl Execute for TransactionRunner {
    async fn run_no_result(&self, query: &Query, cancel: &CancellationToken) -> DbResult<u64> {
        self.linked(cancel, |conn, token| async move { no_result(conn, query, &token).await })
            .await
    }

    async fn run_single<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<T>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send,
    {
        let parser = parser.into();
        self.linked(cancel, |conn, token| async move { single(conn, query, parser, &token).await })
            .await
    }

    async fn run<T, P>(&self, query: &Query, parser: P, cancel: &CancellationToken) -> DbResult<QueryResult<T>>
    where
        T: Send + 'static,
        P: Into<RowParser<T>> + Send,
    {
        let parser = parser.into();
        self.linked(cancel, |conn, token| async move {
            stream(conn, query, parser, &token, Some(cancel)).await
        })
        .await
    }

    async fn run_many(&self, query: &Query, cancel: &CancellationToken) -> DbResult<ResultSet> {
        self.linked(cancel, |conn, token| async move { batch(conn, query, &token, Some(cancel)).await })
            .await
    }
}

impl Runner {
    /// Runs `f` inside a transaction with the runner's default isolation level.
    ///
    /// See [`transaction_with`](Self::transaction_with).
    pub async fn transaction<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError> + Display,
        F: FnOnce(TransactionRunner) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.transaction_with(self.default_isolation(), &CancellationToken::new(), f)
            .await
    }

    /// Runs `f` inside a transaction on a freshly acquired connection.
    ///
    /// The transaction commits when `f` succeeds and rolls back when it fails
    /// or panics; the original error (or panic) is passed on. If the rollback
    /// itself fails the caller gets [`DbError::RollbackFailed`], which carries
    /// the original error's message.
    pub async fn transaction_with<T, E, F, Fut>(
        &self,
        isolation: Option<IsolationLevel>,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, E>
    where
        E: From<DbError> + Display,
        F: FnOnce(TransactionRunner) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut conn = self.acquire(cancel).await?;
        let begun = match conn.value() {
            Ok(c) => c.begin_transaction(isolation, cancel).await,
            Err(e) => Err(e),
        };
        let mut tx = match begun {
            Ok(tx) => tx,
            Err(e) => {
                conn.dispose().await;
                return Err(e.into());
            }
        };
        tracing::debug!(?isolation, "Transaction started");

        let runner = match conn.try_clone() {
            Ok(shared) => TransactionRunner::new(shared, cancel.clone()),
            Err(e) => {
                let _ = rollback(tx.as_mut()).await;
                conn.dispose().await;
                return Err(e.into());
            }
        };
        let outcome = AssertUnwindSafe(f(runner)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(value)) => match tx.commit(cancel).await {
                Ok(()) => {
                    tracing::debug!("Transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Commit failed, rolling back");
                    let _ = rollback(tx.as_mut()).await;
                    Err(e.into())
                }
            },
            Ok(Err(err)) => match rollback(tx.as_mut()).await {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(DbError::RollbackFailed {
                    message: rollback_err.to_string(),
                    original: err.to_string(),
                }
                .into()),
            },
            Err(panic) => {
                let _ = rollback(tx.as_mut()).await;
                drop(tx);
                conn.dispose().await;
                std::panic::resume_unwind(panic);
            }
        };

        drop(tx);
        conn.dispose().await;
        result
    }
}

/// Rolls back on a fresh token so a cancelled call can still undo its work.
async fn rollback(tx: &mut dyn DbTransaction) -> DbResult<()> {
    match tx.rollback(&CancellationToken::new()).await {
        Ok(()) => {
            tracing::debug!("Transaction rolled back");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Rollback failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, Connection};
    use crate::parse::{integer, long};
    use crate::test_utils::seeded_runner;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn count(runner: &Runner) -> i64 {
        runner
            .run_single(&Query::plain("SELECT count(*) FROM t"), long(0), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_commit_on_success() {
        let (runner, tracker, _dir) = seeded_runner().await;

        let inserted: DbResult<u64> = runner
            .transaction(|tx| async move {
                let cancel = CancellationToken::new();
                tx.run_no_result(&Query::plain("INSERT INTO t VALUES (9, 9, 9)"), &cancel)
                    .await
            })
            .await;

        assert_eq!(inserted.unwrap(), 1);
        assert_eq!(count(&runner).await, 4);
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_rollback_on_error_returns_original() {
        let (runner, tracker, _dir) = seeded_runner().await;

        let result: DbResult<()> = runner
            .transaction(|tx| async move {
                let cancel = CancellationToken::new();
                tx.run_no_result(&Query::plain("DELETE FROM t"), &cancel).await?;
                Err(DbError::TooManyRows)
            })
            .await;

        assert!(matches!(result, Err(DbError::TooManyRows)));
        assert_eq!(count(&runner).await, 3);
        tracker.assert_all_released();
    }

    async fn delete_then_panic(tx: TransactionRunner) -> DbResult<()> {
        tx.run_no_result(&Query::plain("DELETE FROM t"), &CancellationToken::new())
            .await?;
        panic!("callback blew up");
    }

    #[rstest]
    #[tokio::test]
    async fn test_rollback_on_panic() {
        let (runner, tracker, _dir) = seeded_runner().await;

        let outcome = AssertUnwindSafe(runner.transaction(delete_then_panic))
            .catch_unwind()
            .await;

        assert!(outcome.is_err());
        assert_eq!(count(&runner).await, 3);
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_stream_outlives_transaction() {
        let (runner, tracker, _dir) = seeded_runner().await;
        let parser = integer(0).and(integer(1)).and(integer(2)).map(|((a, b), c)| a * b * c);

        let leaked = runner
            .transaction(|tx| async move {
                tx.run(&Query::plain("SELECT a, b, c FROM t"), parser, &CancellationToken::new())
                    .await
            })
            .await
            .unwrap();

        assert_eq!(tracker.live(), 1);
        assert_eq!(leaked.fold(0, |acc, v| acc + v).await.unwrap(), 240);
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_call_token_cancels_inside_transaction() {
        let (runner, tracker, _dir) = seeded_runner().await;

        let result: DbResult<u64> = runner
            .transaction(|tx| async move {
                let cancel = CancellationToken::new();
                cancel.cancel();
                tx.run_no_result(&Query::plain("DELETE FROM t"), &cancel).await
            })
            .await;

        assert!(matches!(result, Err(DbError::Cancelled)));
        assert_eq!(count(&runner).await, 3);
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_call_token_cancels_stream_after_return() {
        let (runner, tracker, _dir) = seeded_runner().await;
        let call = CancellationToken::new();
        let token = call.clone();

        let mut leaked = runner
            .transaction(|tx| async move { tx.run(&Query::plain("SELECT a FROM t"), long(0), &token).await })
            .await
            .unwrap();
        assert_eq!(tracker.live(), 1);

        call.cancel();
        let err = leaked.move_next().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(leaked.is_completed());
        tracker.assert_all_released();
    }

    #[rstest]
    #[tokio::test]
    async fn test_call_token_cancels_batch_after_return() {
        let (runner, tracker, _dir) = seeded_runner().await;
        let call = CancellationToken::new();
        let token = call.clone();

        let mut sets = runner
            .transaction(|tx| async move { tx.run_many(&Query::plain("SELECT a FROM t; SELECT b FROM t"), &token).await })
            .await
            .unwrap();
        assert_eq!(sets.all_records(long(0)).to_vec().await.unwrap(), vec![1, 2, 5]);

        call.cancel();
        assert!(sets.next_result().await.unwrap_err().is_cancelled());
        tracker.assert_all_released();
    }

    /// Transaction whose commit and rollback can be made to fail.
    struct ScriptedTransaction {
        fail_commit: bool,
        fail_rollback: bool,
        rollbacks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DbTransaction for ScriptedTransaction {
        async fn commit(&mut self, _cancel: &CancellationToken) -> DbResult<()> {
            if self.fail_commit {
                return Err(DbError::TransactionFailed {
                    message: "disk full".to_string(),
                });
            }
            Ok(())
        }

        async fn rollback(&mut self, _cancel: &CancellationToken) -> DbResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            if self.fail_rollback {
                return Err(DbError::query("connection reset"));
            }
            Ok(())
        }
    }

    struct ScriptedConnection {
        fail_commit: bool,
        fail_rollback: bool,
        rollbacks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        fn create_command(&self, _query: &Query) -> DbResult<Box<dyn Command>> {
            Err(DbError::Unsupported {
                operation: "commands".to_string(),
            })
        }

        async fn begin_transaction(
            &self,
            _isolation: Option<IsolationLevel>,
            _cancel: &CancellationToken,
        ) -> DbResult<Box<dyn DbTransaction>> {
            Ok(Box::new(ScriptedTransaction {
                fail_commit: self.fail_commit,
                fail_rollback: self.fail_rollback,
                rollbacks: Arc::clone(&self.rollbacks),
            }))
        }

        async fn close(&self) {}
    }

    struct Scripted {
        runner: Runner,
        rollbacks: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    fn scripted(fail_commit: bool, fail_rollback: bool) -> Scripted {
        let rollbacks = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let opened_rollbacks = Arc::clone(&rollbacks);
        let closed = Arc::clone(&released);
        let runner = Runner::new(
            move || {
                let conn = ScriptedConnection {
                    fail_commit,
                    fail_rollback,
                    rollbacks: Arc::clone(&opened_rollbacks),
                };
                async move { Ok::<Box<dyn Connection>, DbError>(Box::new(conn)) }.boxed()
            },
            move |_conn| {
                let closed = Arc::clone(&closed);
                async move {
                    closed.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            },
        );
        Scripted {
            runner,
            rollbacks,
            released,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let s = scripted(true, false);

        let result: DbResult<u32> = s.runner.transaction(|_tx| async move { Ok(7) }).await;

        assert!(matches!(result, Err(DbError::TransactionFailed { message }) if message == "disk full"));
        assert_eq!(s.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(s.released.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_rollback_failure_carries_original() {
        let s = scripted(false, true);

        let result: DbResult<()> = s.runner.transaction(|_tx| async move { Err(DbError::TooManyRows) }).await;

        match result {
            Err(DbError::RollbackFailed { message, original }) => {
                assert!(message.contains("connection reset"));
                assert_eq!(original, DbError::TooManyRows.to_string());
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
        assert_eq!(s.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(s.released.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_rollback_success_returns_original() {
        let s = scripted(false, false);

        let result: DbResult<()> = s.runner.transaction(|_tx| async move { Err(DbError::NoRows) }).await;

        assert!(matches!(result, Err(DbError::NoRows)));
        assert_eq!(s.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(s.released.load(Ordering::SeqCst), 1);
    }
}
