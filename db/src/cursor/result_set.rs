//! Result sets of a batched statement.

use tokio_util::sync::CancellationToken;

use crate::backend::{Row, RowCursor};
use crate::cursor::completion::Completion;
use crate::cursor::read_single;
use crate::cursor::result::Records;
use crate::error::{DbError, DbResult};
use crate::parse::RowParser;

/// Cursor over the successive result sets of one multi-statement command.
///
/// Result sets are visited strictly in order: rows of the current set are read
/// through [`single_record`](Self::single_record) or
/// [`all_records`](Self::all_records), then [`next_result`](Self::next_result)
/// moves on. Running out of result sets releases the command and connection.
pub struct ResultSet {
    cursor: Option<Box<dyn RowCursor>>,
    cancel: CancellationToken,
    completion: Completion,
}

impl ResultSet {
    pub(crate) fn new(cursor: Box<dyn RowCursor>, cancel: CancellationToken, completion: Completion) -> Self {
        Self {
            cursor: Some(cursor),
            cancel,
            completion,
        }
    }

    /// Advances to the next result set; `false` (after teardown) when the
    /// batch has no more.
    pub async fn next_result(&mut self) -> DbResult<bool> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };
        match cursor.next_result(&self.cancel).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.teardown().await;
                Ok(false)
            }
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// Reads the only row of the current result set.
    pub async fn single_record<T: Send + 'static>(&mut self, parser: impl Into<RowParser<T>>) -> DbResult<T> {
        let parser = parser.into();
        let cursor = self.cursor.as_mut().ok_or(DbError::HandleDisposed)?;
        match read_single(cursor.as_mut(), &parser, &self.cancel).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_cancelled() {
                    self.teardown().await;
                }
                Err(e)
            }
        }
    }

    /// Borrowed stream over the rows of the current result set.
    pub fn all_records<T: 'static>(&mut self, parser: impl Into<RowParser<T>>) -> Records<'_, T> {
        Records::new(self, parser.into())
    }

    /// Rows changed by statements run before the current result set.
    pub fn records_affected(&self) -> Option<u64> {
        self.cursor.as_ref().and_then(|cursor| cursor.records_affected())
    }

    /// Releases the cursor, command and connection. Safe to call repeatedly.
    pub async fn dispose(&mut self) {
        self.teardown().await;
    }

    /// Blocking form of [`dispose`](Self::dispose).
    ///
    /// Must not be called from inside an async task.
    pub fn blocking_dispose(&mut self) {
        futures::executor::block_on(self.teardown());
    }

    pub fn is_completed(&self) -> bool {
        self.cursor.is_none() && self.completion.is_done()
    }

    /// Reads the next row of the current result set. A failed read tears the
    /// whole set down.
    pub(crate) async fn read(&mut self) -> DbResult<bool> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };
        match cursor.read(&self.cancel).await {
            Ok(more) => Ok(more),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    pub(crate) fn row(&self) -> Option<&dyn Row> {
        self.cursor.as_ref().and_then(|cursor| cursor.row())
    }

    async fn teardown(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close().await;
        }
        if !self.completion.is_done() {
            tracing::trace!("Result sets exhausted, releasing resources");
            self.completion.run().await;
        }
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("open", &self.cursor.is_some())
            .field("completion", &self.completion)
            .finish()
    }
}
