//! High-level image operations.
//!
//! These functions combine configuration with backend execution. They decide
//! whether a payload is eligible, build the parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::params::{NormalizeParams, RasterFormat, Watermark};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Normalization settings resolved for one ingestion pass.
///
/// Built from [`UploadConfig`](crate::config::UploadConfig) with the
/// watermark asset already loaded, so normalization itself does no file I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Longest allowed edge; `None` leaves dimensions alone.
    pub max_size: Option<u32>,
    pub watermark: Option<Watermark>,
}

/// Plan a normalization without executing it.
pub fn plan_normalize(format: RasterFormat, config: &NormalizeConfig) -> NormalizeParams {
    NormalizeParams {
        format,
        max_size: config.max_size,
        watermark: config.watermark.clone(),
    }
}

/// Normalize an uploaded payload.
///
/// Returns `Ok(None)` when `mime_type` is not a supported raster format: the
/// payload must be kept byte-for-byte. A payload that claims a supported
/// format but does not decode fails with [`BackendError::Decode`].
pub fn normalize(
    backend: &dyn ImageBackend,
    raw: &[u8],
    mime_type: &str,
    config: &NormalizeConfig,
) -> Result<Option<Vec<u8>>> {
    let Some(format) = RasterFormat::from_mime(mime_type) else {
        return Ok(None);
    };
    let params = plan_normalize(format, config);
    backend.normalize(raw, &params).map(Some)
}
