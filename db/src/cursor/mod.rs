//! Lazy, resource-owning wrappers around driver cursors.
//!
//! [`QueryResult`] streams one result set; [`ResultSet`] walks the result sets of
//! a batch. Both own the cursor and a [`Completion`] that releases whatever the
//! runner handed over (command, connection share) exactly once, whether the
//! stream ends, fails, is cancelled or is disposed early.

pub mod completion;
pub mod result;
pub mod result_set;

pub use completion::Completion;
pub use result::{BlockingIter, QueryResult, Records};
pub use result_set::ResultSet;

use tokio_util::sync::CancellationToken;

use crate::backend::RowCursor;
use crate::error::{DbError, DbResult};
use crate::parse::RowParser;

/// Reads exactly one row of the cursor's current result set.
///
/// Fails with [`DbError::NoRows`] when the set is empty and with
/// [`DbError::TooManyRows`] when a second row follows the first.
pub(crate) async fn read_single<T: 'static>(
    cursor: &mut dyn RowCursor,
    parser: &RowParser<T>,
    cancel: &CancellationToken,
) -> DbResult<T> {
    if !cursor.read(cancel).await? {
        return Err(DbError::NoRows);
    }
    let row = cursor.row().ok_or(DbError::CursorNotPositioned)?;
    let value = parser.parse(row).value()?;
    if cursor.read(cancel).await? {
        return Err(DbError::TooManyRows);
    }
    Ok(value)
}
