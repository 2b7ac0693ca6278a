//! Job entry points.
//!
//! A job owns exactly one [`BrowserSession`] from launch to close. Every exit
//! path releases it: the normal path closes it explicitly, and an aborted job
//! (error inside a step, job timeout, a dropped future on Ctrl-C) drops it,
//! which kills the browser.
//!
//! Output is all-or-nothing. [`convert`] returns the PDF only when every
//! planned step was captured, and [`convert_to_file`] writes through a
//! temporary file in the target directory that is persisted only on
//! success.

use crate::config::ConversionConfig;
use crate::error::Slides2PdfError;
use crate::output::{ConversionOutput, ConversionStats, InspectionReport};
use crate::pipeline::input::{self, ResolvedInput, RECOGNISED_EXTENSIONS};
use crate::pipeline::session::BrowserSession;
use crate::pipeline::{assemble, capture, inspect, plan};
use crate::presentation::{PresentationKind, PresentationMetadata};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a presentation file or URL to a PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — local `.svg`/`.html`/`.htm` path, or an HTTP(S) URL
/// * `config` — conversion configuration
///
/// # Errors
/// Every failure is fatal to the job; there is no partial output.
/// - input errors (`FileNotFound`, `UnsupportedInput`, …)
/// - `Environment` if no browser could be started
/// - `UnsupportedPresentation` if neither framework authored the document
/// - `EmptyOutput` if the presentation has no steps
/// - `CaptureFailed` with step context for the first step that failed
/// - `JobTimeout` if `config.job_timeout_secs` elapsed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Slides2PdfError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve_input(input_str)?;
    with_job_timeout(config, run_conversion(&resolved, config)).await
}

/// Convert a presentation and write the PDF to `output_path`.
///
/// Uses an atomic write (temp file in the same directory + rename), so the
/// target either receives the complete document or is left untouched.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Slides2PdfError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.pdf)?;
    info!("Wrote {}", output_path.as_ref().display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Slides2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Slides2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Detect the framework and plan the steps without capturing anything.
///
/// An unrecognised document is not an error here: the report carries
/// [`PresentationKind::Unknown`] and an empty step list.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<InspectionReport, Slides2PdfError> {
    let resolved = input::resolve_input(input_str.as_ref())?;
    with_job_timeout(config, async {
        let session = BrowserSession::launch(config).await?;
        let result = load_and_inspect(&session, &resolved, config).await;
        session.close().await;
        let metadata = result?;
        Ok(InspectionReport {
            source: resolved.url().to_string(),
            steps: plan::plan(&metadata),
            metadata,
        })
    })
    .await
}

/// Convert presentation bytes held in memory.
///
/// `extension` (`"svg"`, `"html"` or `"htm"`) tells the browser how to parse
/// the document. The bytes are written to a private temporary directory that
/// is removed when this returns, whatever the outcome. Relative asset
/// references in the document will not resolve.
///
/// # Example
/// ```rust,no_run
/// use webslides2pdf::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("talk.svg")?;
/// let output = convert_from_bytes(&bytes, "svg", &ConversionConfig::default()).await?;
/// std::fs::write("talk.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    extension: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Slides2PdfError> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    if !RECOGNISED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Slides2PdfError::UnsupportedInput {
            path: format!("<upload>.{extension}").into(),
        });
    }

    let dir = tempfile::tempdir()
        .map_err(|e| Slides2PdfError::Internal(format!("tempdir: {e}")))?;
    let path = dir.path().join(format!("presentation.{extension}"));
    std::fs::write(&path, bytes)
        .map_err(|e| Slides2PdfError::Internal(format!("tempfile write: {e}")))?;

    // `dir` is dropped (and removed) when `convert` returns
    convert(path.to_string_lossy(), config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn with_job_timeout<T>(
    config: &ConversionConfig,
    job: impl std::future::Future<Output = Result<T, Slides2PdfError>>,
) -> Result<T, Slides2PdfError> {
    match config.job_timeout_secs {
        Some(secs) => tokio::time::timeout(std::time::Duration::from_secs(secs), job)
            .await
            .map_err(|_| Slides2PdfError::JobTimeout { secs })?,
        None => job.await,
    }
}

async fn run_conversion(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Slides2PdfError> {
    let total_start = Instant::now();
    config.report(0, 0, "Loading presentation…");

    let session = BrowserSession::launch(config).await?;
    let result = convert_with_session(&session, resolved, config, total_start).await;
    session.close().await;
    result
}

async fn load_and_inspect(
    session: &BrowserSession,
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<PresentationMetadata, Slides2PdfError> {
    session.load(resolved.url(), config).await?;
    inspect::inspect_page(session, &inspect::default_probes(), config.default_viewport).await
}

async fn convert_with_session(
    session: &BrowserSession,
    resolved: &ResolvedInput,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, Slides2PdfError> {
    // ── Step 1: Load and inspect ─────────────────────────────────────────
    let load_start = Instant::now();
    let metadata = load_and_inspect(session, resolved, config).await?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;

    if metadata.kind() == PresentationKind::Unknown {
        return Err(Slides2PdfError::UnsupportedPresentation {
            source_url: resolved.url().to_string(),
        });
    }

    // ── Step 2: Plan ─────────────────────────────────────────────────────
    let steps = plan::plan(&metadata);
    debug!("Planned {} steps", steps.len());

    // ── Step 3: Capture ──────────────────────────────────────────────────
    let capture_start = Instant::now();
    let artifacts = capture::capture_steps(session, &metadata, &steps, config).await?;
    let capture_duration_ms = capture_start.elapsed().as_millis() as u64;

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let total = steps.len();
    config.report(total, total, "Assembling PDF…");
    let assemble_start = Instant::now();
    let (pdf, page_sizes) = assemble::assemble(artifacts, metadata.title.clone()).await?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        page_count: page_sizes.len(),
        page_sizes,
        pdf_bytes: pdf.len(),
        quality_scale: config.quality_scale,
        load_duration_ms,
        capture_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} pages, {} bytes, {}ms total",
        stats.page_count, stats.pdf_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        pdf,
        metadata,
        steps,
        stats,
    })
}

/// Write `bytes` to `path` via a sibling temporary file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Slides2PdfError> {
    let write_err = |source: std::io::Error| Slides2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("talk.pdf");
        std::fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"%PDF-new").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-new");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn atomic_write_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/nested/talk.pdf");
        write_atomic(&target, b"%PDF").unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn bytes_with_unknown_extension_are_rejected() {
        let err = convert_from_bytes(b"<pdf/>", "pdf", &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Slides2PdfError::UnsupportedInput { .. }));
    }

    #[tokio::test]
    async fn missing_input_fails_before_launching_a_browser() {
        let err = convert("/definitely/not/here.svg", &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Slides2PdfError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn job_timeout_maps_to_job_timeout_error() {
        let config = ConversionConfig::builder()
            .job_timeout_secs(Some(1))
            .build()
            .unwrap();
        let err = with_job_timeout(&config, async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok::<(), Slides2PdfError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Slides2PdfError::JobTimeout { secs: 1 }));
    }
}
