//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what a normalization involves) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock)
//! without changing operation logic.
//!
//! ## Types
//!
//! - [`RasterFormat`]: The two supported upload formats, parsed from a mime type.
//! - [`WatermarkPosition`]: Anchor for the watermark overlay (default bottom-right).
//! - [`Watermark`]: Decoded-on-demand watermark asset bytes plus its anchor.
//! - [`NormalizeParams`]: Full specification of one normalization pass.

use serde::{Deserialize, Serialize};

/// Raster formats the normalizer re-encodes. Everything else is passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    /// Parse a mime type such as `image/jpeg` or `IMAGE/PNG; foo=bar`.
    ///
    /// Returns `None` for anything that is not one of the supported formats.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("image/jpeg") {
            Some(Self::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Where the watermark is anchored on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    #[default]
    BottomRight,
}

/// Watermark asset to composite onto an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    /// Encoded asset bytes (PNG or JPEG).
    pub bytes: Vec<u8>,
    pub position: WatermarkPosition,
}

/// Parameters for one normalization pass.
///
/// Orientation correction is not a parameter: it always runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeParams {
    pub format: RasterFormat,
    /// Longest allowed edge; `None` disables resize-to-bound.
    pub max_size: Option<u32>,
    pub watermark: Option<Watermark>,
}
