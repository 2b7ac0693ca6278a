//! Error types for the webslides2pdf library.
//!
//! Two error types reflect two layers:
//!
//! * [`Slides2PdfError`] — **Fatal**: the job cannot produce a document
//!   (unsupported presentation, no browser, a step failed). Returned as
//!   `Err(Slides2PdfError)` from the top-level `convert*` functions. A job
//!   never succeeds with fewer pages than it planned.
//!
//! * [`SessionError`] — a raw failure from the browser session (DevTools
//!   protocol error, evaluation exception). It carries no step context; the
//!   orchestrator wraps it into [`Slides2PdfError::CaptureFailed`] with the
//!   step index, target and phase before it reaches the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the webslides2pdf library.
#[derive(Debug, Error)]
pub enum Slides2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Presentation file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not one the presentation frameworks produce.
    #[error("Unsupported input '{path}': expected an .svg, .html or .htm presentation")]
    UnsupportedInput { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    // ── Load / inspection errors ──────────────────────────────────────────
    /// The browser could not load the source document.
    #[error("Failed to load '{url}': {detail}")]
    LoadFailed { url: String, detail: String },

    /// The source document did not finish loading in time.
    #[error("Loading '{url}' did not settle within {secs}s\nIncrease --load-timeout.")]
    LoadTimeout { url: String, secs: u64 },

    /// Framework detection ran but returned data we could not interpret.
    #[error("Could not inspect presentation: {detail}")]
    InspectionFailed { detail: String },

    /// No recognised presentation framework authored the document.
    #[error(
        "'{source_url}' is not a supported presentation.\n\
Only Sozi (frame-based) and JessyInk (build-step) documents can be converted."
    )]
    UnsupportedPresentation { source_url: String },

    // ── Environment errors ────────────────────────────────────────────────
    /// A rendering session could not be created or started.
    #[error(
        "Could not start a headless browser: {detail}\n\n\
A Chrome or Chromium installation is required. You can:\n\
  • Install Chrome/Chromium so it is found on PATH.\n\
  • Set SLIDES2PDF_CHROME=/path/to/chrome.\n\
  • Pass --chrome /path/to/chrome.\n"
    )]
    Environment { detail: String },

    // ── Capture errors ────────────────────────────────────────────────────
    /// One planned step could not be navigated or captured.
    #[error("Capture failed at step {step}/{total} ({target}) during {phase}: {detail}")]
    CaptureFailed {
        step: usize,
        total: usize,
        target: String,
        phase: CapturePhase,
        detail: String,
    },

    /// Planning produced zero steps, or assembly received zero artifacts.
    #[error("Nothing to write: {detail}")]
    EmptyOutput { detail: String },

    /// The whole job exceeded its configured bound.
    #[error("Conversion exceeded the job timeout of {secs}s")]
    JobTimeout { secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The captured images could not be turned into a PDF.
    #[error("PDF assembly failed at page {page}: {detail}")]
    AssemblyFailed { page: usize, detail: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The part of a step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    /// Applying the navigation address to the document.
    Navigate,
    /// Cold-reloading the document at that address.
    Reload,
    /// Taking the raster snapshot.
    Screenshot,
    /// The step did not finish within `step_timeout_secs`.
    Timeout,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapturePhase::Navigate => "navigation",
            CapturePhase::Reload => "reload",
            CapturePhase::Screenshot => "screenshot",
            CapturePhase::Timeout => "timeout",
        })
    }
}

/// A raw browser-session failure, before step context is attached.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        SessionError(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError(format!("unexpected script result: {e}"))
    }
}
