//! Uploaded file records and the capabilities used to reach them.
//!
//! The upload subsystem owns files; this crate only reads them through two
//! ports:
//!
//! - [`FileRepository`]: resolve a placeholder's `uuid` or `url` to a file
//!   and compute the file's current public URL.
//! - [`Downloader`]: fetch a file's stored bytes on behalf of an acting
//!   identity. Authorization is the downloader's business; a refusal comes
//!   back as [`DownloadError::AuthorizationDenied`].
//!
//! [`Library`](crate::library::Library) implements both on top of a plain
//! directory.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An uploaded file as seen by the imaging pipeline.
///
/// Immutable after upload, except that ingestion may overwrite the bytes
/// stored at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Stable identifier; also the primary key of the file's image metadata.
    pub id: u64,
    /// Public reference token used in placeholders and URLs.
    pub uuid: String,
    /// Display name, emitted as the preview `title`.
    pub base_name: String,
    /// Storage locator relative to the storage root.
    pub path: String,
    pub mime_type: String,
    /// Identity that uploaded the file. Downloads for metadata run as this actor.
    #[serde(default)]
    pub actor: Option<String>,
    /// Restricted files are only downloadable by their uploader.
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Not allowed to download {uuid}")]
    AuthorizationDenied { uuid: String },
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File lookup capability.
pub trait FileRepository: Send + Sync {
    fn find_by_uuid(&self, uuid: &str) -> Option<UploadedFile>;

    fn find_by_url(&self, url: &str) -> Option<UploadedFile>;

    /// Current canonical public URL, or `None` if the file has no public location.
    fn url_for_file(&self, file: &UploadedFile) -> Option<String>;
}

/// Download capability: blocking read of a file's stored bytes.
pub trait Downloader: Send + Sync {
    fn download(&self, uuid: &str, actor: Option<&str>) -> Result<Vec<u8>, DownloadError>;
}
