//! Results returned by the conversion entry points.

use crate::presentation::{CaptureStep, PresentationMetadata};
use serde::{Deserialize, Serialize};

/// A finished job: the PDF bytes plus what was planned and measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The assembled PDF document.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub metadata: PresentationMetadata,
    pub steps: Vec<CaptureStep>,
    pub stats: ConversionStats,
}

/// Timings and page geometry for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages written; always equal to the number of planned steps.
    pub page_count: usize,
    /// Per-page pixel dimensions, in page order.
    pub page_sizes: Vec<(u32, u32)>,
    /// Size of the PDF in bytes.
    pub pdf_bytes: usize,
    pub quality_scale: u8,
    pub load_duration_ms: u64,
    pub capture_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::inspect`] found, without capturing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub source: String,
    pub metadata: PresentationMetadata,
    pub steps: Vec<CaptureStep>,
}
