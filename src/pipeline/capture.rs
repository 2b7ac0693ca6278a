//! The capture loop: drive the page through every planned step and take one
//! snapshot per step.
//!
//! ## One step
//!
//! ```text
//! navigate (#fragment) ──▶ cold reload ──▶ settle delay ──▶ screenshot
//! ```
//!
//! Each step is a cold reload of the document at the step's address. Both
//! frameworks read the fragment on load and render that state directly,
//! which sidesteps their in-page transition machinery entirely. There is
//! no "transition finished" signal, so the settle delay is a fixed,
//! configurable wait.
//!
//! Steps run strictly in plan order, one at a time: the next navigation must
//! not start before the previous snapshot is taken. A step that still fails
//! after `max_step_retries` extra attempts fails the whole job; there is no
//! partial output.

use crate::config::ConversionConfig;
use crate::error::{CapturePhase, SessionError, Slides2PdfError};
use crate::pipeline::session::PresentationPage;
use crate::presentation::{CaptureArtifact, CaptureStep, PresentationKind, PresentationMetadata};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Hides the frame list and frame number overlays Sozi draws on top of the
/// presentation.
pub const SOZI_CHROME_CSS: &str = ".sozi-frame-list, .sozi-frame-number { display: none !important; }";

/// Upper bound on a single retry delay.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Configure the page for capture: suppress framework UI and size the
/// viewport to the presentation at the configured quality scale.
pub async fn prepare_page<P: PresentationPage>(
    page: &P,
    metadata: &PresentationMetadata,
    config: &ConversionConfig,
) -> Result<(), Slides2PdfError> {
    let env = |what: &str, e: SessionError| Slides2PdfError::Environment {
        detail: format!("cannot {what}: {e}"),
    };

    if metadata.kind() == PresentationKind::FrameBased {
        page.hide_chrome(SOZI_CHROME_CSS)
            .await
            .map_err(|e| env("hide presentation controls", e))?;
    }

    page.resize(
        metadata.viewport_width,
        metadata.viewport_height,
        config.quality_scale as f64,
    )
    .await
    .map_err(|e| env("set the viewport", e))?;

    debug!(
        "Viewport {}x{} at scale {}",
        metadata.viewport_width, metadata.viewport_height, config.quality_scale
    );
    Ok(())
}

/// Prepare the page, then capture every step in order.
///
/// Returns exactly one artifact per step, in step order.
///
/// # Errors
/// * [`Slides2PdfError::EmptyOutput`] if `steps` is empty.
/// * [`Slides2PdfError::CaptureFailed`] for the first step that fails
///   all its attempts, naming the step, target and phase.
pub async fn capture_steps<P: PresentationPage>(
    page: &P,
    metadata: &PresentationMetadata,
    steps: &[CaptureStep],
    config: &ConversionConfig,
) -> Result<Vec<CaptureArtifact>, Slides2PdfError> {
    if steps.is_empty() {
        return Err(Slides2PdfError::EmptyOutput {
            detail: format!("the {} presentation has no steps to capture", metadata.kind()),
        });
    }

    prepare_page(page, metadata, config).await?;

    let total = steps.len();
    let mut artifacts = Vec::with_capacity(total);

    for step in steps {
        let start = Instant::now();
        let bytes = capture_with_retry(page, step, total, config).await?;
        debug!(
            "Step {}/{} ({}): {} bytes in {:?}",
            step.index,
            total,
            step.target,
            bytes.len(),
            start.elapsed()
        );

        artifacts.push(CaptureArtifact {
            step_index: step.index,
            format: config.capture_format,
            bytes,
        });
        config.report(step.index, total, &format!("Capturing step {}/{}", step.index, total));
    }

    info!("Captured {} steps", artifacts.len());
    Ok(artifacts)
}

async fn capture_with_retry<P: PresentationPage>(
    page: &P,
    step: &CaptureStep,
    total: usize,
    config: &ConversionConfig,
) -> Result<Vec<u8>, Slides2PdfError> {
    let mut last_failure = (CapturePhase::Navigate, String::new());

    for attempt in 0..=config.max_step_retries {
        if attempt > 0 {
            let backoff = retry_backoff(config.retry_backoff_ms, attempt);
            warn!(
                "Step {}: retry {}/{} after {:?}",
                step.index, attempt, config.max_step_retries, backoff
            );
            sleep(backoff).await;
        }

        let outcome = match timeout(config.step_timeout(), capture_once(page, step, config)).await {
            Ok(outcome) => outcome,
            Err(_) => Err((
                CapturePhase::Timeout,
                format!("step did not finish within {}s", config.step_timeout_secs),
            )),
        };

        match outcome {
            Ok(bytes) => return Ok(bytes),
            Err((phase, detail)) => {
                warn!(
                    "Step {} ({}): attempt {} failed during {}: {}",
                    step.index,
                    step.target,
                    attempt + 1,
                    phase,
                    detail
                );
                last_failure = (phase, detail);
            }
        }
    }

    let (phase, detail) = last_failure;
    Err(Slides2PdfError::CaptureFailed {
        step: step.index,
        total,
        target: step.target.to_string(),
        phase,
        detail,
    })
}

/// `base_ms * 2^(attempt-1)`, saturating and capped at [`MAX_RETRY_BACKOFF`].
fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_RETRY_BACKOFF)
}

async fn capture_once<P: PresentationPage>(
    page: &P,
    step: &CaptureStep,
    config: &ConversionConfig,
) -> Result<Vec<u8>, (CapturePhase, String)> {
    let fail = |phase: CapturePhase| move |e: SessionError| (phase, e.to_string());

    page.navigate(&step.target)
        .await
        .map_err(fail(CapturePhase::Navigate))?;
    page.reload().await.map_err(fail(CapturePhase::Reload))?;
    sleep(config.settle_delay()).await;
    page.screenshot(config.capture_format)
        .await
        .map_err(fail(CapturePhase::Screenshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::plan::plan;
    use crate::pipeline::session::testing::{Call, ScriptedPage};
    use crate::presentation::DEFAULT_VIEWPORT;
    use std::sync::{Arc, Mutex};

    fn fast_config() -> crate::config::ConversionConfigBuilder {
        ConversionConfig::builder()
            .settle_delay_ms(0)
            .retry_backoff_ms(1)
            .quality_scale(1)
    }

    fn frames(ids: &[&str]) -> PresentationMetadata {
        PresentationMetadata::frames(ids.iter().map(|s| s.to_string()).collect(), 8, 6, DEFAULT_VIEWPORT)
    }

    #[tokio::test]
    async fn captures_every_step_in_plan_order() {
        let page = ScriptedPage::new();
        let metadata = PresentationMetadata::effects(vec![0, 2], 8, 6, DEFAULT_VIEWPORT);
        let steps = plan(&metadata);
        let config = fast_config().build().unwrap();

        let artifacts = capture_steps(&page, &metadata, &steps, &config).await.unwrap();

        assert_eq!(artifacts.len(), 4);
        assert_eq!(
            artifacts.iter().map(|a| a.step_index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(page.navigations(), vec!["#1_0", "#2_0", "#2_1", "#2_2"]);
    }

    #[tokio::test]
    async fn each_step_is_navigate_reload_screenshot() {
        let page = ScriptedPage::new();
        let metadata = frames(&["a"]);
        let config = fast_config().build().unwrap();

        capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap();

        let calls = page.calls();
        let tail: Vec<_> = calls[calls.len() - 3..].to_vec();
        assert_eq!(
            tail,
            vec![Call::Navigate("#a".into()), Call::Reload, Call::Screenshot]
        );
    }

    #[tokio::test]
    async fn controls_hidden_only_for_frame_based() {
        let config = fast_config().build().unwrap();

        let page = ScriptedPage::new();
        let metadata = frames(&["a"]);
        capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap();
        assert!(page
            .calls()
            .contains(&Call::HideChrome(SOZI_CHROME_CSS.to_string())));

        let page = ScriptedPage::new();
        let metadata = PresentationMetadata::effects(vec![0], 8, 6, DEFAULT_VIEWPORT);
        capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap();
        assert!(!page
            .calls()
            .iter()
            .any(|c| matches!(c, Call::HideChrome(_))));
    }

    #[tokio::test]
    async fn quality_scales_pixels_not_plan() {
        let metadata = frames(&["a", "b"]);
        let steps = plan(&metadata);

        let page = ScriptedPage::new();
        let config = fast_config().quality_scale(3).build().unwrap();
        let artifacts = capture_steps(&page, &metadata, &steps, &config).await.unwrap();

        assert_eq!(artifacts.len(), 2);
        assert!(page.calls().contains(&Call::Resize(8, 6, 3.0)));
        let img = image::load_from_memory(&artifacts[0].bytes).unwrap();
        assert_eq!((img.width(), img.height()), (24, 18));
    }

    #[tokio::test]
    async fn progress_reported_after_each_step() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let config = fast_config()
            .progress_callback(Arc::new(move |c: usize, t: usize, m: &str| {
                sink.lock().unwrap().push((c, t, m.to_string()));
            }))
            .build()
            .unwrap();
        let page = ScriptedPage::new();
        let metadata = frames(&["a", "b", "c"]);

        capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                (1, 3, "Capturing step 1/3".to_string()),
                (2, 3, "Capturing step 2/3".to_string()),
                (3, 3, "Capturing step 3/3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_plan_is_rejected_before_touching_page() {
        let page = ScriptedPage::new();
        let metadata = frames(&[]);
        let config = fast_config().build().unwrap();

        let err = capture_steps(&page, &metadata, &[], &config)
            .await
            .unwrap_err();

        assert!(matches!(err, Slides2PdfError::EmptyOutput { .. }));
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_step_names_step_target_and_phase() {
        let page = ScriptedPage::new().failing_navigation_to("#b");
        let metadata = frames(&["a", "b", "c"]);
        let config = fast_config().build().unwrap();

        let err = capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap_err();

        match err {
            Slides2PdfError::CaptureFailed {
                step,
                total,
                target,
                phase,
                ..
            } => {
                assert_eq!((step, total), (2, 3));
                assert_eq!(target, "#b");
                assert_eq!(phase, CapturePhase::Navigate);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The job stops at the failing step.
        assert!(!page.navigations().contains(&"#c".to_string()));
    }

    #[tokio::test]
    async fn transient_screenshot_failure_is_retried() {
        let page = ScriptedPage::new().failing_screenshot(2);
        let metadata = frames(&["a", "b"]);
        let config = fast_config().max_step_retries(1).build().unwrap();

        let artifacts = capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(page.navigations(), vec!["#a", "#b", "#b"]);
    }

    #[tokio::test]
    async fn screenshot_failure_without_retries_fails_job() {
        let page = ScriptedPage::new().failing_screenshot(1);
        let metadata = frames(&["a", "b"]);
        let config = fast_config().build().unwrap();

        let err = capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Slides2PdfError::CaptureFailed {
                step: 1,
                phase: CapturePhase::Screenshot,
                ..
            }
        ));
    }

    #[test]
    fn retry_backoff_doubles_then_saturates() {
        assert_eq!(retry_backoff(250, 1), Duration::from_millis(250));
        assert_eq!(retry_backoff(250, 3), Duration::from_millis(1000));
        assert_eq!(retry_backoff(250, 70), MAX_RETRY_BACKOFF);
        assert_eq!(retry_backoff(u64::MAX, 2), MAX_RETRY_BACKOFF);
        assert_eq!(retry_backoff(0, 70), Duration::ZERO);
    }

    #[tokio::test]
    async fn many_retries_end_in_capture_failed() {
        let page = ScriptedPage::new().failing_navigation_to("#a");
        let metadata = frames(&["a"]);
        let config = fast_config()
            .max_step_retries(70)
            .retry_backoff_ms(0)
            .build()
            .unwrap();

        let err = capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Slides2PdfError::CaptureFailed {
                step: 1,
                phase: CapturePhase::Navigate,
                ..
            }
        ));
        assert_eq!(page.navigations().len(), 71);
    }

    #[tokio::test]
    async fn hung_step_times_out() {
        let page = ScriptedPage::new().hanging_reload();
        let metadata = frames(&["a"]);
        let config = fast_config().step_timeout_secs(1).build().unwrap();

        let err = capture_steps(&page, &metadata, &plan(&metadata), &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Slides2PdfError::CaptureFailed {
                phase: CapturePhase::Timeout,
                ..
            }
        ));
    }
}
