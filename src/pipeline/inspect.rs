//! Presentation inspection: work out which framework authored the loaded
//! document and read its structure.
//!
//! ## Probes
//!
//! Each supported framework is a [`PresentationProbe`]: a script evaluated
//! in the page plus a pure `interpret` step that turns the script's JSON
//! result into typed metadata. Probes run in a fixed order and the first
//! match wins, so a document that somehow carries both globals is treated
//! as the higher-priority framework.
//!
//! | Priority | Probe | Kind | Structure source |
//! |----------|-------|------|------------------|
//! | 1 | [`SoziProbe`] | frame-based | `sozi.presentation.frames[].frameId` |
//! | 2 | [`JessyInkProbe`] | build-step | `slides[].effects.length` |
//!
//! Frame order comes from the framework's presentation data, never from DOM
//! order. Inspection is a pure read of page state.

use crate::error::Slides2PdfError;
use crate::pipeline::session::PresentationPage;
use crate::presentation::PresentationMetadata;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Reads `document.title`, which also covers `<svg><title>`.
const TITLE_SCRIPT: &str = "(() => { const t = document.title; return t ? String(t) : null; })()";

/// One framework detector.
pub trait PresentationProbe: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Expression evaluated in the page; must yield JSON or `null`.
    fn script(&self) -> &'static str;

    /// Turn the script result into metadata, or `None` if the framework is
    /// absent. Malformed data is an error, not a miss.
    fn interpret(
        &self,
        raw: Value,
        default_viewport: (u32, u32),
    ) -> Result<Option<PresentationMetadata>, Slides2PdfError>;
}

/// Frame-based presentations authored with Sozi.
pub struct SoziProbe;

#[derive(Deserialize)]
struct SoziRaw {
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    frames: Vec<String>,
}

impl PresentationProbe for SoziProbe {
    fn name(&self) -> &'static str {
        "sozi"
    }

    fn script(&self) -> &'static str {
        r#"(() => {
            if (typeof sozi === 'undefined' || !sozi || !sozi.presentation) return null;
            const frames = sozi.presentation.frames || [];
            return {
                width: window.innerWidth || 0,
                height: window.innerHeight || 0,
                frames: Array.from(frames).map(f => String(f.frameId)),
            };
        })()"#
    }

    fn interpret(
        &self,
        raw: Value,
        default_viewport: (u32, u32),
    ) -> Result<Option<PresentationMetadata>, Slides2PdfError> {
        if raw.is_null() {
            return Ok(None);
        }
        let r: SoziRaw = serde_json::from_value(raw).map_err(|e| malformed(self.name(), e))?;
        Ok(Some(PresentationMetadata::frames(
            r.frames,
            to_px(r.width),
            to_px(r.height),
            default_viewport,
        )))
    }
}

/// Build-step presentations authored with JessyInk.
pub struct JessyInkProbe;

#[derive(Deserialize)]
struct JessyInkRaw {
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    effects: Vec<u32>,
}

impl PresentationProbe for JessyInkProbe {
    fn name(&self) -> &'static str {
        "jessyink"
    }

    fn script(&self) -> &'static str {
        r#"(() => {
            if (typeof slides === 'undefined' || !slides || !slides.length) return null;
            return {
                width: Number(window.WIDTH) || 0,
                height: Number(window.HEIGHT) || 0,
                effects: Array.from(slides).map(s => (s && s.effects) ? s.effects.length : 0),
            };
        })()"#
    }

    fn interpret(
        &self,
        raw: Value,
        default_viewport: (u32, u32),
    ) -> Result<Option<PresentationMetadata>, Slides2PdfError> {
        if raw.is_null() {
            return Ok(None);
        }
        let r: JessyInkRaw = serde_json::from_value(raw).map_err(|e| malformed(self.name(), e))?;
        Ok(Some(PresentationMetadata::effects(
            r.effects,
            to_px(r.width),
            to_px(r.height),
            default_viewport,
        )))
    }
}

/// The built-in probes in priority order.
pub fn default_probes() -> Vec<Box<dyn PresentationProbe>> {
    vec![Box::new(SoziProbe), Box::new(JessyInkProbe)]
}

/// Run `probes` against the loaded page, first match wins.
///
/// The caller must already have waited for the document to settle.
/// Returns [`PresentationMetadata::unknown`] when nothing matches; deciding
/// that this is fatal is the caller's job.
pub async fn inspect_page<P: PresentationPage>(
    page: &P,
    probes: &[Box<dyn PresentationProbe>],
    default_viewport: (u32, u32),
) -> Result<PresentationMetadata, Slides2PdfError> {
    for probe in probes {
        let raw = page
            .evaluate(probe.script())
            .await
            .map_err(|e| Slides2PdfError::InspectionFailed {
                detail: format!("{} probe: {e}", probe.name()),
            })?;

        if let Some(metadata) = probe.interpret(raw, default_viewport)? {
            let title = match page.evaluate(TITLE_SCRIPT).await {
                Ok(Value::String(t)) => Some(t),
                _ => None,
            };
            info!(
                "Detected {} presentation ({}x{})",
                metadata.kind(),
                metadata.viewport_width,
                metadata.viewport_height
            );
            return Ok(metadata.with_title(title));
        }
        debug!("Probe '{}' did not match", probe.name());
    }

    Ok(PresentationMetadata::unknown())
}

/// Convert a JS number to a pixel size; non-finite or non-positive is 0.
fn to_px(v: f64) -> u32 {
    if v.is_finite() && v >= 1.0 {
        v.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

fn malformed(probe: &str, e: serde_json::Error) -> Slides2PdfError {
    Slides2PdfError::InspectionFailed {
        detail: format!("{probe} probe returned malformed data: {e}"),
    }
}
