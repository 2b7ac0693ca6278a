//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! `(current, total, message)` notifications as a job runs.
//!
//! A job reports, in order:
//!
//! 1. `(0, 0, "Loading presentation…")` — `total == 0` means the amount of
//!    work is not known yet, not that there is none;
//! 2. `(i, n, "Capturing step i/n")` once each step has been captured;
//! 3. `(n, n, "Assembling PDF…")` before the document is written.
//!
//! # Example
//!
//! ```rust
//! use webslides2pdf::{ConversionConfig, ProgressCallback};
//! use std::sync::Arc;
//!
//! let cb: ProgressCallback = Arc::new(|current: usize, total: usize, message: &str| {
//!     eprintln!("[{current}/{total}] {message}");
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Receives progress notifications from a conversion job.
///
/// Implementations must be `Send + Sync`: independent jobs may run
/// concurrently and share one sink. Within one job calls are strictly
/// sequential.
pub trait ConversionProgressCallback: Send + Sync {
    /// # Arguments
    /// * `current` — 1-indexed step just completed (0 before capture starts)
    /// * `total`   — number of planned steps, or 0 while indeterminate
    /// * `message` — human-readable phase description
    fn on_progress(&self, current: usize, total: usize, message: &str);
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _current: usize, _total: usize, _message: &str) {}
}

impl<F> ConversionProgressCallback for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn on_progress(&self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
