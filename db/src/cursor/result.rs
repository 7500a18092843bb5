//! Streamed single result set.

use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::backend::RowCursor;
use crate::cursor::completion::Completion;
use crate::cursor::result_set::ResultSet;
use crate::error::{DbError, DbResult};
use crate::parse::RowParser;

/// Lazily decoded rows of one result set.
///
/// Rows are pulled from the driver only when the caller asks for the next one.
/// Reaching the end, failing, or calling [`dispose`](Self::dispose) closes the
/// cursor and runs the completion; a result dropped before that releases in the
/// background.
pub struct QueryResult<T> {
    // declared before `completion` so the cursor is dropped first
    cursor: Option<Box<dyn RowCursor>>,
    parser: RowParser<T>,
    cancel: CancellationToken,
    completion: Completion,
    positioned: bool,
    affected: Option<u64>,
}

impl<T: 'static> QueryResult<T> {
    pub(crate) fn new(
        cursor: Box<dyn RowCursor>,
        parser: RowParser<T>,
        cancel: CancellationToken,
        completion: Completion,
    ) -> Self {
        Self {
            affected: cursor.records_affected(),
            cursor: Some(cursor),
            parser,
            cancel,
            completion,
            positioned: false,
        }
    }

    /// Advances to the next row; `false` once the rows are exhausted.
    ///
    /// The first `false` (or error) tears the result down.
    pub async fn move_next(&mut self) -> DbResult<bool> {
        self.positioned = false;
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(false);
        };
        match cursor.read(&self.cancel).await {
            Ok(true) => {
                self.positioned = true;
                Ok(true)
            }
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

    /// Decodes the row the result is positioned on.
    pub fn current(&self) -> DbResult<T> {
        if !self.positioned {
            return Err(DbError::CursorNotPositioned);
        }
        let row = self
            .cursor
            .as_ref()
            .and_then(|cursor| cursor.row())
            .ok_or(DbError::CursorNotPositioned)?;
        Ok(self.parser.parse(row).value()?)
    }

    /// Advances and decodes in one step; `None` at the end.
    ///
    /// A decode failure also tears the result down.
    pub async fn try_next(&mut self) -> DbResult<Option<T>> {
        if !self.move_next().await? {
            return Ok(None);
        }
        match self.current() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// Folds every remaining row into an accumulator.
    pub async fn fold<A>(mut self, init: A, mut f: impl FnMut(A, T) -> A) -> DbResult<A> {
        let mut acc = init;
        while let Some(value) = self.try_next().await? {
            acc = f(acc, value);
        }
        Ok(acc)
    }

    pub async fn to_vec(self) -> DbResult<Vec<T>> {
        self.fold(Vec::new(), |mut out, value| {
            out.push(value);
            out
        })
        .await
    }

    /// Rows changed by statements of the batch that ran before this result set.
    pub fn records_affected(&self) -> Option<u64> {
        self.affected
    }

    /// Rewinding a forward-only cursor is not supported.
    pub fn reset(&mut self) -> DbResult<()> {
        Err(DbError::Unsupported {
            operation: "reset of a forward-only result".to_string(),
        })
    }

    /// Releases the cursor and runs the completion. Safe to call repeatedly.
    pub async fn dispose(&mut self) {
        self.teardown().await;
    }

    /// Blocking form of [`dispose`](Self::dispose).
    ///
    /// Must not be called from inside an async task.
    pub fn blocking_dispose(&mut self) {
        futures::executor::block_on(self.teardown());
    }

    /// True once the result has released its resources.
    pub fn is_completed(&self) -> bool {
        self.cursor.is_none() && self.completion.is_done()
    }

    /// Consumes the result as a stream of decoded rows.
    pub fn into_stream(self) -> impl Stream<Item = DbResult<T>> + Send
    where
        T: Send,
    {
        futures::stream::try_unfold(self, |mut result| async move {
            let next = result.try_next().await?;
            Ok::<_, DbError>(next.map(|value| (value, result)))
        })
    }

    /// Consumes the result as a blocking iterator, for synchronous callers.
    pub fn blocking_iter(self) -> BlockingIter<T> {
        BlockingIter { inner: self }
    }

    async fn teardown(&mut self) {
        self.positioned = false;
        if let Some(mut cursor) = self.cursor.take() {
            self.affected = cursor.records_affected().or(self.affected);
            cursor.close().await;
        }
        if !self.completion.is_done() {
            tracing::trace!("Result stream complete, releasing resources");
            self.completion.run().await;
        }
    }
}

impl<T> std::fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("open", &self.cursor.is_some())
            .field("positioned", &self.positioned)
            .field("completion", &self.completion)
            .finish()
    }
}

/// Synchronous iterator over a [`QueryResult`].
///
/// Each step blocks the calling thread; dropping the iterator disposes the result.
pub struct BlockingIter<T: 'static> {
    inner: QueryResult<T>,
}

impl<T: 'static> Iterator for BlockingIter<T> {
    type Item = DbResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        futures::executor::block_on(self.inner.try_next()).transpose()
    }
}

impl<T: 'static> Drop for BlockingIter<T> {
    fn drop(&mut self) {
        self.inner.blocking_dispose();
    }
}

/// Borrowed view over the current result set of a [`ResultSet`].
///
/// Reaching the end of the rows does not release anything; the owning set does
/// that when it runs out of result sets or is disposed.
pub struct Records<'a, T> {
    set: &'a mut ResultSet,
    parser: RowParser<T>,
    positioned: bool,
}

impl<'a, T: 'static> Records<'a, T> {
    pub(crate) fn new(set: &'a mut ResultSet, parser: RowParser<T>) -> Self {
        Self {
            set,
            parser,
            positioned: false,
        }
    }

    pub async fn move_next(&mut self) -> DbResult<bool> {
        self.positioned = self.set.read().await?;
        Ok(self.positioned)
    }

    pub fn current(&self) -> DbResult<T> {
        if !self.positioned {
            return Err(DbError::CursorNotPositioned);
        }
        let row = self.set.row().ok_or(DbError::CursorNotPositioned)?;
        Ok(self.parser.parse(row).value()?)
    }

    pub async fn try_next(&mut self) -> DbResult<Option<T>> {
        if !self.move_next().await? {
            return Ok(None);
        }
        self.current().map(Some)
    }

    pub async fn fold<A>(mut self, init: A, mut f: impl FnMut(A, T) -> A) -> DbResult<A> {
        let mut acc = init;
        while let Some(value) = self.try_next().await? {
            acc = f(acc, value);
        }
        Ok(acc)
    }

    pub async fn to_vec(self) -> DbResult<Vec<T>> {
        self.fold(Vec::new(), |mut out, value| {
            out.push(value);
            out
        })
        .await
    }
}
