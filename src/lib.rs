//! # webslides2pdf
//!
//! Convert animated web presentations into static, paginated PDFs.
//!
//! ## Why this crate?
//!
//! Sozi and JessyInk presentations are SVG or HTML documents animated by
//! JavaScript. Printing them from a browser yields one page with whatever
//! state happened to be on screen. This crate instead loads the document in a
//! headless browser, asks the framework which states exist, visits each one
//! and snapshots it, so every frame or incremental build step becomes its own
//! PDF page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! presentation (.svg/.html or URL)
//!  │
//!  ├─ 1. Input     validate the path, turn it into a file:// URL
//!  ├─ 2. Load      headless Chrome via CDP, wait for network idle
//!  ├─ 3. Inspect   Sozi frames? JessyInk slides/effects? neither → error
//!  ├─ 4. Plan      ordered navigation targets, one per page
//!  ├─ 5. Capture   #target → cold reload → settle → screenshot
//!  └─ 6. Assemble  one lopdf page per image, sized to the image
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webslides2pdf::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().quality_scale(2).build()?;
//!     let stats = convert_to_file("talk.svg", "talk.pdf", &config).await?;
//!     eprintln!("{} pages in {}ms", stats.page_count, stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Browser
//!
//! A Chrome or Chromium executable is required at runtime. It is looked up
//! by [`chrome_locate`] (explicit path, `SLIDES2PDF_CHROME`/`CHROME`, `PATH`,
//! well-known install locations, the Playwright cache).
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slides2pdf` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! webslides2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod presentation;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chrome_locate;
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, inspect};
pub use error::{CapturePhase, Slides2PdfError};
pub use output::{ConversionOutput, ConversionStats, InspectionReport};
pub use presentation::{
    CaptureArtifact, CaptureFormat, CaptureStep, NavigationAddress, PresentationKind,
    PresentationMetadata, StructureData,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
