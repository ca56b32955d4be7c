//! Cooperative cancellation for in-flight fetches.
//!
//! Each fetch gets its own token. The scheduler keeps the token of the
//! current fetch and compares completions against it by identity, so a
//! superseded fetch can never write the model even if it finishes late.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::types::PaddockError;

#[derive(Debug)]
struct Inner {
    id: u64,
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal. Clones share state and identity.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new(id: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Sequence number, for logging only. Identity is `same_as`.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Whether `other` is a clone of this token.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Drive `fut` to completion unless the token fires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, PaddockError>
    where
        F: Future<Output = Result<T, PaddockError>>,
    {
        if self.is_cancelled() {
            return Err(PaddockError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(PaddockError::Cancelled),
            result = fut => result,
        }
    }
}
