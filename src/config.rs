//! Configuration types for presentation-to-PDF conversion.
//!
//! All job behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. One struct keeps every knob in one place,
//! so batch mode can clone the same config into concurrent jobs.
//!
//! None of these settings change *which* steps are planned. `quality_scale`
//! only changes raster resolution; the timing knobs only change how long the
//! orchestrator waits.

use crate::error::Slides2PdfError;
use crate::presentation::{CaptureFormat, DEFAULT_VIEWPORT};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Valid range for [`ConversionConfig::quality_scale`].
pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 1..=8;

/// Configuration for one presentation-to-PDF job.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use webslides2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .quality_scale(2)
///     .settle_delay_ms(800)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Device pixel ratio used for every snapshot. Range: 1–8. Default: 4.
    ///
    /// A 1024×768 presentation captured at scale 4 yields 4096×3072 pages.
    /// Higher values sharpen text at the cost of file size and capture time.
    pub quality_scale: u8,

    /// Fixed wait after each cold reload before the snapshot. Default: 600.
    ///
    /// Neither framework signals "transition finished", so this is an
    /// empirical constant. Too short captures mid-transition frames on slow
    /// machines; too long only costs time.
    pub settle_delay_ms: u64,

    /// Quiet window that counts as network idle after the first load. Default: 500.
    pub network_idle_ms: u64,

    /// Bound on the first load plus the idle wait, in seconds. Default: 60.
    pub load_timeout_secs: u64,

    /// Bound on one step (navigate, reload, settle, snapshot), in seconds. Default: 30.
    pub step_timeout_secs: u64,

    /// Optional bound on the whole job, in seconds. Default: none.
    pub job_timeout_secs: Option<u64>,

    /// Extra attempts for a single failing step. Default: 0.
    ///
    /// Retries never span steps: a step that keeps failing fails the job.
    pub max_step_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 250.
    pub retry_backoff_ms: u64,

    /// Viewport used when the document exposes no size. Default: 1024×768.
    pub default_viewport: (u32, u32),

    /// Snapshot raster format. Default: PNG.
    pub capture_format: CaptureFormat,

    /// Browser executable. If None, `chrome_locate` searches for one.
    pub chrome_executable: Option<PathBuf>,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality_scale: 4,
            settle_delay_ms: 600,
            network_idle_ms: 500,
            load_timeout_secs: 60,
            step_timeout_secs: 30,
            job_timeout_secs: None,
            max_step_retries: 0,
            retry_backoff_ms: 250,
            default_viewport: DEFAULT_VIEWPORT,
            capture_format: CaptureFormat::default(),
            chrome_executable: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("quality_scale", &self.quality_scale)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("network_idle_ms", &self.network_idle_ms)
            .field("load_timeout_secs", &self.load_timeout_secs)
            .field("step_timeout_secs", &self.step_timeout_secs)
            .field("job_timeout_secs", &self.job_timeout_secs)
            .field("max_step_retries", &self.max_step_retries)
            .field("default_viewport", &self.default_viewport)
            .field("capture_format", &self.capture_format)
            .field("chrome_executable", &self.chrome_executable)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    /// Forward a notification to the progress sink, if any.
    pub(crate) fn report(&self, current: usize, total: usize, message: &str) {
        if let Some(ref cb) = self.progress_callback {
            cb.on_progress(current, total, message);
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn quality_scale(mut self, scale: u8) -> Self {
        self.config.quality_scale = scale.clamp(*QUALITY_RANGE.start(), *QUALITY_RANGE.end());
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn network_idle_ms(mut self, ms: u64) -> Self {
        self.config.network_idle_ms = ms;
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs.max(1);
        self
    }

    pub fn step_timeout_secs(mut self, secs: u64) -> Self {
        self.config.step_timeout_secs = secs.max(1);
        self
    }

    pub fn job_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.job_timeout_secs = secs;
        self
    }

    pub fn max_step_retries(mut self, n: u32) -> Self {
        self.config.max_step_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn default_viewport(mut self, width: u32, height: u32) -> Self {
        self.config.default_viewport = (width, height);
        self
    }

    pub fn capture_format(mut self, format: CaptureFormat) -> Self {
        self.config.capture_format = match format {
            CaptureFormat::Jpeg { quality } => CaptureFormat::Jpeg {
                quality: quality.clamp(1, 100),
            },
            png => png,
        };
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Slides2PdfError> {
        let c = &self.config;
        if !QUALITY_RANGE.contains(&c.quality_scale) {
            return Err(Slides2PdfError::InvalidConfig(format!(
                "quality scale must be 1–8, got {}",
                c.quality_scale
            )));
        }
        if c.default_viewport.0 == 0 || c.default_viewport.1 == 0 {
            return Err(Slides2PdfError::InvalidConfig(format!(
                "default viewport must be non-zero, got {}x{}",
                c.default_viewport.0, c.default_viewport.1
            )));
        }
        if c.job_timeout_secs == Some(0) {
            return Err(Slides2PdfError::InvalidConfig(
                "job timeout must be ≥ 1s when set".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = ConversionConfig::default();
        assert_eq!(c.quality_scale, 4);
        assert_eq!(c.settle_delay(), Duration::from_millis(600));
        assert_eq!(c.default_viewport, (1024, 768));
        assert_eq!(c.capture_format, CaptureFormat::Png);
        assert_eq!(c.max_step_retries, 0);
    }

    #[test]
    fn builder_clamps_quality() {
        let c = ConversionConfig::builder().quality_scale(0).build().unwrap();
        assert_eq!(c.quality_scale, 1);
        let c = ConversionConfig::builder().quality_scale(12).build().unwrap();
        assert_eq!(c.quality_scale, 8);
    }

    #[test]
    fn build_rejects_out_of_range_quality_set_directly() {
        let mut builder = ConversionConfig::builder();
        builder.config.quality_scale = 9;
        assert!(matches!(
            builder.build(),
            Err(Slides2PdfError::InvalidConfig(_))
        ));
    }

    #[test]
    fn build_rejects_zero_viewport() {
        let err = ConversionConfig::builder()
            .default_viewport(0, 768)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("viewport"));
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        let c = ConversionConfig::builder()
            .capture_format(CaptureFormat::Jpeg { quality: 0 })
            .build()
            .unwrap();
        assert_eq!(c.capture_format, CaptureFormat::Jpeg { quality: 1 });
    }

    #[test]
    fn debug_hides_callback() {
        let c = ConversionConfig::builder()
            .progress_callback(Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let s = format!("{c:?}");
        assert!(s.contains("<dyn ConversionProgressCallback>"));
    }
}
