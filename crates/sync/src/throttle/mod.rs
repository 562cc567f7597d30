//! Distributed rate gate for outbound Target API calls.
//!
//! The Target enforces one global quota per store, while item events are
//! processed by many short-lived worker processes with no shared memory.
//! An in-process limiter therefore cannot work: every worker coordinates
//! through one shared counter in Redis instead. [`TokenStore`] is the seam
//! between the waiting logic here and that counter; tests and
//! single-process runs use the in-memory store.
//!
//! The bucket is a token-bucket/leaky-bucket hybrid sized to the store's
//! published limit: a reservoir of [`BucketConfig::shopify_admin`] tokens
//! that refills by a fixed increment per interval. `acquire` consumes one
//! token per call; a consumed token is gone (that is what limits the
//! rate). A permit acquired but *not* spent against the API - a worker
//! draining its queue at shutdown - can be handed back with
//! [`Permit::release`].

mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

pub use store::{BucketConfig, MemoryTokenStore, RedisTokenStore, TakeOutcome, TokenStore};

/// Upper bound on one poll interval while waiting for a token, so local
/// waiters notice cross-process releases reasonably quickly.
const MAX_POLL: Duration = Duration::from_millis(250);

/// Errors surfaced by [`Throttle::acquire`].
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The caller's lease ran out before a token became available. The
    /// operation was never started; the caller's own retry policy applies.
    #[error("rate-limit lease expired after {0:?}")]
    LeaseExpired(Duration),

    /// The throttle was shut down while waiting. No waiter survives
    /// shutdown, so a later invocation's limiter never inherits zombie
    /// queue entries.
    #[error("throttle shut down")]
    Shutdown,

    /// The backing store failed.
    #[error("rate-limit store error: {0}")]
    Store(String),
}

/// A shared token-bucket gate.
///
/// Cloneable; clones share the same shutdown state and backing store.
pub struct Throttle<S> {
    inner: Arc<ThrottleInner<S>>,
}

impl<S> Clone for Throttle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ThrottleInner<S> {
    store: S,
    /// Maximum time one `acquire` may wait, bounded by the worker's
    /// remaining execution budget.
    lease: Duration,
    shutting_down: AtomicBool,
    waiters: Notify,
}

/// Proof that one token was taken from the shared bucket.
///
/// Dropping a permit consumes the token. Call [`Permit::release`] only for
/// permits that were never spent against the API.
#[must_use = "a permit gates exactly one outbound call"]
pub struct Permit<'t, S: TokenStore> {
    throttle: &'t Throttle<S>,
}

impl<S: TokenStore> Throttle<S> {
    /// Create a throttle over `store`, with waits bounded by `lease`.
    pub fn new(store: S, lease: Duration) -> Self {
        Self {
            inner: Arc::new(ThrottleInner {
                store,
                lease,
                shutting_down: AtomicBool::new(false),
                waiters: Notify::new(),
            }),
        }
    }

    /// Take one token, suspending until capacity is available.
    ///
    /// # Errors
    ///
    /// [`ThrottleError::LeaseExpired`] if no token became available within
    /// the lease; [`ThrottleError::Shutdown`] if [`Self::shutdown`] was
    /// called while waiting; [`ThrottleError::Store`] on store failure.
    pub async fn acquire(&self) -> Result<Permit<'_, S>, ThrottleError> {
        let deadline = Instant::now() + self.inner.lease;

        loop {
            if self.inner.shutting_down.load(Ordering::Acquire) {
                return Err(ThrottleError::Shutdown);
            }

            match self.inner.store.try_take().await? {
                TakeOutcome::Taken => return Ok(Permit { throttle: self }),
                TakeOutcome::RetryIn(hint) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ThrottleError::LeaseExpired(self.inner.lease));
                    }
                    let wait = hint.min(MAX_POLL).min(deadline - now);
                    tokio::select! {
                        () = tokio::time::sleep(wait) => {}
                        () = self.inner.waiters.notified() => {}
                    }
                }
            }
        }
    }

    /// Wake every waiter with [`ThrottleError::Shutdown`].
    ///
    /// Permits already handed out stay valid; only queued waiters are
    /// drained.
    pub fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.waiters.notify_waiters();
        debug!("throttle shut down, waiters drained");
    }

    async fn put_back(&self) -> Result<(), ThrottleError> {
        self.inner.store.put_back().await?;
        // A returned token can satisfy one local waiter immediately.
        self.inner.waiters.notify_one();
        Ok(())
    }
}

// Derived Debug would demand S: Debug through the throttle reference.
impl<S: TokenStore> std::fmt::Debug for Permit<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

impl<S: TokenStore> Permit<'_, S> {
    /// Return an unspent token to the bucket.
    ///
    /// # Errors
    ///
    /// [`ThrottleError::Store`] if the backing store rejects the return.
    pub async fn release(self) -> Result<(), ThrottleError> {
        self.throttle.put_back().await
    }
}
