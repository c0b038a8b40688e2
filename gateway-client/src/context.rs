//! Per-call context carrying cooperative cancellation.

use tokio::sync::watch;

/// Context passed to every gateway call and to the pluggable strategies.
///
/// A context created with [`CallContext::new`] is never canceled. Use
/// [`CallContext::with_cancel`] to obtain a [`CancelHandle`].
///
/// Cancellation is cooperative: a unary call stops waiting for the response,
/// and a stream worker stops before reading its next frame. A frame read that
/// is already in progress is not interrupted.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: Option<watch::Receiver<bool>>,
}

/// Handle that cancels every clone of the [`CallContext`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CallContext {
    /// Create a context that is never canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cancelable context.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { cancel: Some(rx) }, CancelHandle { tx })
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested.
    ///
    /// Never resolves for a context without a [`CancelHandle`], or once the
    /// handle is dropped without canceling.
    pub async fn canceled(&self) {
        if let Some(mut rx) = self.cancel.clone()
            && rx.wait_for(|canceled| *canceled).await.is_ok()
        {
            return;
        }
        std::future::pending::<()>().await
    }
}

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
