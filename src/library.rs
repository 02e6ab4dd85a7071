//! Directory-backed file library.
//!
//! A self-contained stand-in for an upload subsystem, good enough to drive
//! the imaging pipeline from the command line:
//!
//! ```text
//! library/
//! ├── config.toml                 # Optional, see config module
//! ├── files.json                  # Index: {"next_id": n, "files": [...]}
//! ├── .image-metadata.json        # Derived image metadata
//! ├── assets/watermark.png        # Optional watermark asset
//! └── files/
//!     └── <uuid>-<base_name>      # Stored blobs
//! ```
//!
//! Adding a file copies it into `files/`, runs the ingestion hook on the
//! stored copy and only then records it in the index. A rejected upload
//! leaves neither a blob nor an index entry behind.

use crate::config::LibraryConfig;
use crate::files::{DownloadError, Downloader, FileRepository, UploadedFile};
use crate::imaging::{ImageBackend, NormalizeConfig, RustBackend};
use crate::process::{ImageProcessor, ProcessError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

pub const INDEX_FILENAME: &str = "files.json";
pub const FILES_DIR: &str = "files";

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Not a file: {0}")]
    InvalidSource(PathBuf),
    #[error("Library index lock poisoned")]
    Poisoned,
}

#[derive(Debug, Serialize, Deserialize)]
struct LibraryIndex {
    next_id: u64,
    files: Vec<UploadedFile>,
}

impl Default for LibraryIndex {
    fn default() -> Self {
        Self {
            next_id: 1,
            files: Vec::new(),
        }
    }
}

/// Guess a mime type from a file extension.
///
/// Only the formats the pipeline cares about are recognized; everything
/// else is `application/octet-stream`.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub struct Library {
    root: PathBuf,
    public_url: String,
    backend: Arc<dyn ImageBackend>,
    normalize: NormalizeConfig,
    index: Mutex<LibraryIndex>,
}

impl Library {
    /// Open the library rooted at `root`, creating nothing until the first add.
    ///
    /// Uploads are ingested with [`RustBackend`] and no normalization until
    /// [`Library::with_normalizer`] says otherwise.
    pub fn open(root: &Path, config: &LibraryConfig) -> Result<Self, LibraryError> {
        let index_path = root.join(INDEX_FILENAME);
        let index = match fs::read_to_string(&index_path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => LibraryIndex::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            root: root.to_path_buf(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            backend: Arc::new(RustBackend::new()),
            normalize: NormalizeConfig::default(),
            index: Mutex::new(index),
        })
    }

    pub fn with_normalizer(
        mut self,
        backend: Arc<dyn ImageBackend>,
        config: NormalizeConfig,
    ) -> Self {
        self.backend = backend;
        self.normalize = config;
        self
    }

    /// Where the bytes of `file` are stored.
    pub fn blob_path(&self, file: &UploadedFile) -> PathBuf {
        self.root.join(FILES_DIR).join(&file.path)
    }

    /// All indexed files in id order.
    pub fn files(&self) -> Result<Vec<UploadedFile>, LibraryError> {
        Ok(self.index()?.files.clone())
    }

    /// Store a copy of `source` as a new upload.
    pub fn add(
        &self,
        source: &Path,
        mime_type: &str,
        actor: Option<&str>,
        restricted: bool,
    ) -> Result<UploadedFile, LibraryError> {
        let base_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|_| source.is_file())
            .ok_or_else(|| LibraryError::InvalidSource(source.to_path_buf()))?
            .to_string();

        let id = {
            let mut index = self.index()?;
            let id = index.next_id;
            index.next_id += 1;
            id
        };

        let uuid = Uuid::new_v4().to_string();
        let file = UploadedFile {
            id,
            path: format!("{uuid}-{base_name}"),
            uuid,
            base_name,
            mime_type: mime_type.to_string(),
            actor: actor.map(str::to_string),
            restricted,
        };

        let blob = self.blob_path(&file);
        fs::create_dir_all(self.root.join(FILES_DIR))?;
        fs::copy(source, &blob)?;

        let processor = ImageProcessor::new(self.backend.as_ref(), &self.normalize);
        if let Err(e) = processor.process(&file, &blob, mime_type) {
            let _ = fs::remove_file(&blob);
            return Err(e.into());
        }

        let mut index = self.index()?;
        index.files.push(file.clone());
        if let Err(e) = self.save(&index) {
            index.files.retain(|f| f.id != file.id);
            let _ = fs::remove_file(&blob);
            return Err(e);
        }

        tracing::info!(
            upload_id = file.id,
            uuid = %file.uuid,
            name = %file.base_name,
            "stored upload"
        );
        Ok(file)
    }

    fn index(&self) -> Result<MutexGuard<'_, LibraryIndex>, LibraryError> {
        self.index.lock().map_err(|_| LibraryError::Poisoned)
    }

    fn save(&self, index: &LibraryIndex) -> Result<(), LibraryError> {
        let json = serde_json::to_string_pretty(index)?;
        fs::write(self.root.join(INDEX_FILENAME), json)?;
        Ok(())
    }

    fn find(&self, pred: impl Fn(&UploadedFile) -> bool) -> Option<UploadedFile> {
        let index = self.index.lock().ok()?;
        index.files.iter().find(|f| pred(f)).cloned()
    }
}

impl FileRepository for Library {
    fn find_by_uuid(&self, uuid: &str) -> Option<UploadedFile> {
        self.find(|f| f.uuid == uuid)
    }

    fn find_by_url(&self, url: &str) -> Option<UploadedFile> {
        self.find(|f| f.path == url || self.url_for_file(f).is_some_and(|u| u == url))
    }

    fn url_for_file(&self, file: &UploadedFile) -> Option<String> {
        Some(format!("{}/{}", self.public_url, file.path))
    }
}

impl Downloader for Library {
    fn download(&self, uuid: &str, actor: Option<&str>) -> Result<Vec<u8>, DownloadError> {
        let file = self
            .find_by_uuid(uuid)
            .ok_or_else(|| DownloadError::NotFound(uuid.to_string()))?;
        if file.restricted && file.actor.as_deref() != actor {
            return Err(DownloadError::AuthorizationDenied {
                uuid: uuid.to_string(),
            });
        }
        fs::read(self.blob_path(&file)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DownloadError::NotFound(uuid.to_string()),
            _ => DownloadError::Io(e),
        })
    }
}
