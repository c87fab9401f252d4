//! A minimal cooperative cancellation handle.
//!
//! The spec calls for cancellation to be "observable at every suspension point" — every
//! inter-batch boundary in the embed stage, every file operation in startup file
//! reconciliation, every LLM call, both legs of a fused search. A full cancellation-token
//! tree (parent/child propagation, nested task groups) isn't needed here: nothing in this
//! crate spawns cancellation sub-scopes, so a flat `Arc<AtomicBool>` plus a `Notify` for
//! anything that wants to wait on it is sufficient.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct Cancellation {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already cancelled, otherwise waits for `cancel()`.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.notify.notified().await;
    }
}
