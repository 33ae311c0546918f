//! Cancellation and deadline signal threaded through producer handoffs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
struct TokenState {
    cancellable: bool,
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

/// Cloneable cancellation token with an optional deadline.
///
/// The token is owned by whoever starts a stream (typically derived from a
/// request timeout). All clones observe the same state: once cancelled, or
/// once the deadline passes, it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

impl CancelToken {
    /// A token that only fires when [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::build(true, None)
    }

    /// A token that never fires; [`cancel`](Self::cancel) on it or any of
    /// its clones is ignored. Used by combinator streams.
    pub fn never() -> Self {
        Self::build(false, None)
    }

    /// A token that fires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(true, Some(Instant::now() + timeout))
    }

    /// A token that fires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(true, Some(deadline))
    }

    fn build(cancellable: bool, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(TokenState {
                cancellable,
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Fire the token, waking every pending [`cancelled`](Self::cancelled)
    pub fn cancel(&self) {
        if !self.inner.cancellable {
            return;
        }
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.inner.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Completes once the token is cancelled or its deadline has passed
    pub async fn cancelled(&self) {
        if !self.inner.cancellable {
            return std::future::pending().await;
        }
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking the flag so a concurrent cancel is not missed
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {},
                        _ = sleep_until(deadline) => {
                            self.cancel();
                            return;
                        }
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
