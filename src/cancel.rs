//! Cancellation utilities
//!
//! Every [`ApiRequest`](crate::ApiRequest) owns a [`CancelHandle`]. Aborting
//! only has an effect while the request is pending; a request that has not
//! been sent, or has already settled, ignores it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct RequestState {
    pending: AtomicBool,
    completed: AtomicBool,
}

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    state: Arc<RequestState>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation unconditionally.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel only if the request is in flight and not yet cancelled.
    /// Returns whether a signal was sent.
    pub fn abort(&self) -> bool {
        if self.is_pending() && !self.token.is_cancelled() {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_pending(&self) {
        self.state.completed.store(false, Ordering::SeqCst);
        self.state.pending.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_complete(&self) {
        self.state.pending.store(false, Ordering::SeqCst);
        self.state.completed.store(true, Ordering::SeqCst);
    }
}
