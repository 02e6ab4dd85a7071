//! Upload ingestion hook.
//!
//! Runs once per upload, after the bytes have been stored and before the
//! upload is accepted. JPEG and PNG payloads are rewritten in place with the
//! normalized encoding; every other mime type is left alone without being
//! read.
//!
//! ## Failure Semantics
//!
//! The stored file is only overwritten after normalization succeeded, so a
//! failed upload never leaves a half-written payload behind. A payload that
//! claims to be an image but does not decode is a user error and surfaces as
//! [`ProcessError::Validation`] on the `upload` field.
//!
//! ## Parallel Processing
//!
//! [`ImageProcessor::process_batch`] normalizes independent uploads in
//! parallel using [rayon](https://docs.rs/rayon). Results keep input order.

use crate::files::UploadedFile;
use crate::imaging::{self, BackendError, ImageBackend, NormalizeConfig, RasterFormat};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(BackendError),
}

impl From<BackendError> for ProcessError {
    fn from(e: BackendError) -> Self {
        if e.is_corrupted_image() {
            Self::Validation {
                field: "upload".to_string(),
                message: "Corrupted image".to_string(),
            }
        } else {
            Self::Imaging(e)
        }
    }
}

/// What ingestion did to one stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The payload was re-encoded and written back.
    Normalized {
        format: RasterFormat,
        bytes_before: usize,
        bytes_after: usize,
    },
    /// Not a supported raster format; the file was not touched.
    Skipped,
}

/// One stored upload waiting for ingestion.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: PathBuf,
    pub mime_type: String,
}

/// Normalizes stored uploads with one backend and one resolved configuration.
#[derive(Clone, Copy)]
pub struct ImageProcessor<'a> {
    backend: &'a dyn ImageBackend,
    config: &'a NormalizeConfig,
}

impl<'a> ImageProcessor<'a> {
    pub fn new(backend: &'a dyn ImageBackend, config: &'a NormalizeConfig) -> Self {
        Self { backend, config }
    }

    /// Ingestion hook for `file`, whose bytes are stored at `upload_path`.
    pub fn process(
        &self,
        file: &UploadedFile,
        upload_path: &Path,
        mime_type: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let outcome = self.normalize_path(upload_path, mime_type);
        match &outcome {
            Ok(ProcessOutcome::Normalized { bytes_after, .. }) => tracing::info!(
                upload_id = file.id,
                uuid = %file.uuid,
                bytes = bytes_after,
                "normalized upload"
            ),
            Ok(ProcessOutcome::Skipped) => tracing::debug!(
                upload_id = file.id,
                mime_type,
                "upload is not a supported image, left untouched"
            ),
            Err(e) => tracing::warn!(upload_id = file.id, error = %e, "upload rejected"),
        }
        outcome
    }

    /// Normalize the file at `path` in place.
    pub fn normalize_path(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let Some(format) = RasterFormat::from_mime(mime_type) else {
            return Ok(ProcessOutcome::Skipped);
        };

        let raw = std::fs::read(path)?;
        let Some(normalized) = imaging::normalize(self.backend, &raw, mime_type, self.config)?
        else {
            return Ok(ProcessOutcome::Skipped);
        };
        std::fs::write(path, &normalized)?;

        Ok(ProcessOutcome::Normalized {
            format,
            bytes_before: raw.len(),
            bytes_after: normalized.len(),
        })
    }

    /// Normalize many uploads in parallel, one result per upload in input order.
    pub fn process_batch(&self, uploads: &[Upload]) -> Vec<Result<ProcessOutcome, ProcessError>> {
        uploads
            .par_iter()
            .map(|upload| self.normalize_path(&upload.path, &upload.mime_type))
            .collect()
    }
}
