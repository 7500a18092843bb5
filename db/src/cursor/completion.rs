//! One-shot teardown guard.

use futures::future::BoxFuture;

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Release action that runs at most once.
///
/// `run` may be called from any number of disposal paths; only the first does
/// anything. A completion dropped before it ran hands its action to the current
/// tokio runtime.
pub struct Completion {
    action: Option<Teardown>,
}

impl Completion {
    pub fn new(action: impl FnOnce() -> BoxFuture<'static, ()> + Send + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// Completion with nothing to release.
    pub fn noop() -> Self {
        Self { action: None }
    }

    pub async fn run(&mut self) {
        if let Some(action) = self.action.take() {
            action().await;
        }
    }

    pub fn is_done(&self) -> bool {
        self.action.is_none()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let Some(action) = self.action.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Result dropped before completion; releasing in background");
                handle.spawn(action());
            }
            Err(_) => {
                tracing::error!("Result dropped outside a runtime; resources released without teardown");
            }
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("done", &self.is_done())
            .finish()
    }
}
