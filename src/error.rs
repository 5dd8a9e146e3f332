//! The crate's error taxonomy: transport/transient, upload, domain, and the
//! per-integration-pass error the Manager folds everything into.
//!
//! Rust has no blanket `except Exception`, so every fallible step of a pass
//! funnels into [`PassError`] via `?`, giving the Manager one type to match
//! and log, the same role the teacher's `EventBusError`/`SearchError`
//! thiserror enums play at their own module boundaries.

use thiserror::Error;

/// Raised by a crawler when the judge itself reports the integration is
/// broken, or when a transient transport failure occurs. `Transport` is the
/// only variant [`crate::backoff::with_backoff`] retries; every other
/// variant is fatal for the current pass.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("connection error or non-success response: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("handle is misconfigured: {0}")]
    MisconfiguredHandle(String),

    #[error("user does not exist on the judge")]
    UnknownUser,

    #[error("page schema changed, could not locate expected element: {0}")]
    PageSchema(String),

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("cancelled by shutdown signal")]
    Cancelled,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl CrawlerError {
    /// Whether this error represents a transient transport failure that
    /// [`crate::backoff::with_backoff`] should retry, as opposed to a
    /// domain condition implying the integration itself is broken.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, CrawlerError::Transport(_))
    }
}

/// Raised by the paste uploader on any non-success response.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("paste service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("paste service returned a non-success response: {status}")]
    NonSuccess { status: reqwest::StatusCode },

    #[error("paste service response was malformed: {0}")]
    Malformed(String),
}

/// The single error type a pass over one integration can fail with. Any
/// failure here is caught by the Manager, logged, and treated as fatal for
/// that integration's current pass only — it never aborts the core loop.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
