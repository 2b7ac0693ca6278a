//! Presentation data model: what the inspector finds and what the planner
//! and orchestrator work from.
//!
//! [`PresentationKind`] and [`StructureData`] are kept as separate types so
//! callers can match on the kind cheaply, but [`PresentationMetadata`] only
//! ever pairs a kind with its matching structure (see
//! [`PresentationMetadata::kind`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default viewport used when a document does not expose its own size.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1024, 768);

/// Which presentation model authored a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationKind {
    /// No recognised framework.
    Unknown,
    /// A flat list of navigable frames (Sozi).
    FrameBased,
    /// Slides with incremental reveal effects (JessyInk).
    BuildStepBased,
}

impl fmt::Display for PresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PresentationKind::Unknown => "unknown",
            PresentationKind::FrameBased => "frame-based (Sozi)",
            PresentationKind::BuildStepBased => "build-step (JessyInk)",
        })
    }
}

/// Framework-specific structure read from the live document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StructureData {
    /// Nothing recognised; nothing to visit.
    Unknown,
    /// Frame identifiers in presentation order.
    Frames(Vec<String>),
    /// Per-slide incremental effect counts, in document order.
    Effects(Vec<u32>),
}

/// Everything the planner needs to know about a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationMetadata {
    /// Intrinsic canvas width in CSS pixels.
    pub viewport_width: u32,
    /// Intrinsic canvas height in CSS pixels.
    pub viewport_height: u32,
    /// Frame list or effect counts.
    pub structure: StructureData,
    /// `document.title`, when the document has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PresentationMetadata {
    /// Metadata for a document no probe recognised.
    pub fn unknown() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT.0,
            viewport_height: DEFAULT_VIEWPORT.1,
            structure: StructureData::Unknown,
            title: None,
        }
    }

    /// Frame-based metadata. Zero dimensions fall back to `default_viewport`.
    pub fn frames(frames: Vec<String>, width: u32, height: u32, default_viewport: (u32, u32)) -> Self {
        let (viewport_width, viewport_height) = sanitize_viewport(width, height, default_viewport);
        Self {
            viewport_width,
            viewport_height,
            structure: StructureData::Frames(frames),
            title: None,
        }
    }

    /// Build-step metadata. Zero dimensions fall back to `default_viewport`.
    pub fn effects(effects: Vec<u32>, width: u32, height: u32, default_viewport: (u32, u32)) -> Self {
        let (viewport_width, viewport_height) = sanitize_viewport(width, height, default_viewport);
        Self {
            viewport_width,
            viewport_height,
            structure: StructureData::Effects(effects),
            title: None,
        }
    }

    pub fn kind(&self) -> PresentationKind {
        match self.structure {
            StructureData::Unknown => PresentationKind::Unknown,
            StructureData::Frames(_) => PresentationKind::FrameBased,
            StructureData::Effects(_) => PresentationKind::BuildStepBased,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Both dimensions must be positive; otherwise the default applies to both.
fn sanitize_viewport(width: u32, height: u32, default_viewport: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        default_viewport
    } else {
        (width, height)
    }
}

/// Where in the document one capture step points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationAddress {
    /// A Sozi frame identifier.
    Frame { id: String },
    /// A JessyInk slide (1-based) and effect step (0 = unrevealed).
    Slide { slide: usize, effect: usize },
}

impl NavigationAddress {
    /// URL fragment (without `#`) the framework interprets on load.
    pub fn fragment(&self) -> String {
        match self {
            NavigationAddress::Frame { id } => id.clone(),
            NavigationAddress::Slide { slide, effect } => format!("{slide}_{effect}"),
        }
    }
}

impl fmt::Display for NavigationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.fragment())
    }
}

/// One planned page: a dense 1-based index and where to navigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStep {
    pub index: usize,
    pub target: NavigationAddress,
}

/// Raster format used for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormat {
    /// Lossless; decoded and re-compressed into the PDF. (default)
    #[default]
    Png,
    /// Lossy; embedded in the PDF verbatim. `quality` is 1–100.
    Jpeg { quality: u8 },
}

/// The raster image captured for one step.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub step_index: usize,
    pub format: CaptureFormat,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for CaptureArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureArtifact")
            .field("step_index", &self.step_index)
            .field("format", &self.format)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}
