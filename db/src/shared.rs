//! Reference-counted ownership of a disposable resource.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{DbError, DbResult};

/// Async release callback run once the last handle is disposed.
pub type Releaser<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct SharedCell<T> {
    value: T,
    releaser: Releaser<T>,
}

/// Shared handle to a resource that must be released exactly once.
///
/// Every handle, the original included, must be disposed. The releaser runs
/// when the last one goes, and never before. A handle that has been disposed
/// refuses further use with [`DbError::HandleDisposed`].
///
/// The count is atomic so handles may be moved across tasks, but a single
/// handle is not meant to be disposed concurrently with its own use.
pub struct Shared<T: Send + Sync + 'static> {
    inner: Option<Arc<SharedCell<T>>>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    /// Wraps `value`; the count starts at one.
    pub fn new(value: T, releaser: impl Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static) -> Self {
        Self::with_releaser(value, Arc::new(releaser))
    }

    pub fn with_releaser(value: T, releaser: Releaser<T>) -> Self {
        Self {
            inner: Some(Arc::new(SharedCell { value, releaser })),
        }
    }

    /// Returns a new handle to the same value and bumps the count.
    pub fn try_clone(&self) -> DbResult<Self> {
        let inner = self.inner.as_ref().ok_or(DbError::HandleDisposed)?;
        Ok(Self {
            inner: Some(Arc::clone(inner)),
        })
    }

    pub fn value(&self) -> DbResult<&T> {
        self.inner
            .as_ref()
            .map(|cell| &cell.value)
            .ok_or(DbError::HandleDisposed)
    }

    /// Live handles sharing the value; zero once this handle is disposed.
    pub fn ref_count(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drops this handle's share and runs the releaser if it was the last one.
    ///
    /// Calling it again on the same handle does nothing.
    pub async fn dispose(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        if let Some(cell) = Arc::into_inner(inner) {
            tracing::trace!("Last shared handle disposed, releasing value");
            (cell.releaser)(cell.value).await;
        }
    }
}

impl<T: Send + Sync + 'static> Drop for Shared<T> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let Some(cell) = Arc::into_inner(inner) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Shared handle dropped without dispose; releasing in background");
                handle.spawn((cell.releaser)(cell.value));
            }
            Err(_) => {
                tracing::error!("Shared handle dropped outside a runtime; value leaked without release");
            }
        }
    }
}

impl<T: Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(cell) => f
                .debug_struct("Shared")
                .field("value", &cell.value)
                .field("ref_count", &Arc::strong_count(cell))
                .finish(),
            None => f.write_str("Shared(<disposed>)"),
        }
    }
}
