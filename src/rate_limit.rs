//! Per-endpoint rate limiting: a bounded queue of recent call timestamps.
//!
//! Mirrors the teacher's `Arc<tokio::sync::Mutex<VecDeque<_>>>` crawl queue
//! in its orchestrator: state lives behind a tokio mutex, and the guard is
//! dropped before any `sleep` so other callers aren't blocked while one
//! waits out the window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CrawlerError;

/// A shared, named rate limit: at most `calls` calls per `window`.
pub struct RateLimiter {
    calls: usize,
    window: Duration,
    recent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(calls: usize, window: Duration) -> Self {
        assert!(calls > 0, "a rate limiter must allow at least one call");
        Self {
            calls,
            window,
            recent: Mutex::new(VecDeque::with_capacity(calls)),
        }
    }

    /// Suspend the caller, if necessary, until a slot is free, then record
    /// the call and return. Unblocks early with [`CrawlerError::Cancelled`]
    /// if `cancellation` fires while waiting.
    ///
    /// Fair in arrival order: a waiter only ever waits for the single oldest
    /// recorded timestamp to age out, never for a caller that arrived later.
    pub async fn acquire(&self, cancellation: &CancellationToken) -> Result<(), CrawlerError> {
        loop {
            if cancellation.is_cancelled() {
                return Err(CrawlerError::Cancelled);
            }
            let wait_until = {
                let mut recent = self.recent.lock().await;
                if recent.len() < self.calls {
                    recent.push_back(Instant::now());
                    return Ok(());
                }
                // queue is full; oldest entry determines when a slot frees up
                recent.front().copied().map(|oldest| oldest + self.window)
            };
            // mutex guard is dropped above, before we sleep
            if let Some(deadline) = wait_until {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => {}
                    () = cancellation.cancelled() => return Err(CrawlerError::Cancelled),
                }
            }
            let mut recent = self.recent.lock().await;
            if let Some(front) = recent.front().copied() {
                if front + self.window <= Instant::now() {
                    recent.pop_front();
                }
            }
        }
    }
}
