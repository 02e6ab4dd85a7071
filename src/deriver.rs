//! Lazy derivation of image metadata.
//!
//! [`MetadataDeriver`] is the only writer of [`ImageMetadata`] rows. It is a
//! get-or-compute cache over three injected collaborators:
//!
//! ```text
//! get_or_derive(file)
//!   store.get(file.id) ── hit ──▶ row                  (no I/O, no decode)
//!        │ miss
//!        ▼
//!   derive_and_cache(file)
//!     downloader.download(uuid, actor) ─▶ bytes
//!     backend.identify(bytes)           ─▶ width × height
//!     store.insert(row)                 ─▶ row
//! ```
//!
//! `derive_and_cache` is not idempotent on its own: every call downloads,
//! decodes and writes once. Callers that only need the row go through
//! [`MetadataDeriver::get_or_derive`].
//!
//! A failed decode writes nothing. Nothing is retried: the same bytes would
//! fail the same way.

use crate::files::{DownloadError, Downloader, UploadedFile};
use crate::imaging::{BackendError, ImageBackend};
use crate::metadata::{ImageMetadata, InsertOutcome, MetadataStore, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("Corrupted image {uuid}: {reason}")]
    CorruptedImage { uuid: String, reason: String },
    #[error("Not allowed to download {uuid}")]
    AuthorizationDenied { uuid: String },
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(BackendError),
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DownloadError> for DeriveError {
    fn from(e: DownloadError) -> Self {
        match e {
            DownloadError::AuthorizationDenied { uuid } => Self::AuthorizationDenied { uuid },
            DownloadError::NotFound(uuid) => Self::NotFound(uuid),
            DownloadError::Io(e) => Self::Io(e),
        }
    }
}

/// Get-or-compute cache of image dimensions.
#[derive(Clone, Copy)]
pub struct MetadataDeriver<'a> {
    backend: &'a dyn ImageBackend,
    downloader: &'a dyn Downloader,
    store: &'a dyn MetadataStore,
}

impl<'a> MetadataDeriver<'a> {
    pub fn new(
        backend: &'a dyn ImageBackend,
        downloader: &'a dyn Downloader,
        store: &'a dyn MetadataStore,
    ) -> Self {
        Self {
            backend,
            downloader,
            store,
        }
    }

    /// The cached row for `file`, if one has been derived.
    pub fn cached(&self, file: &UploadedFile) -> Result<Option<ImageMetadata>, DeriveError> {
        Ok(self.store.get(file.id)?)
    }

    /// Return the cached row, deriving and storing it on a miss.
    pub fn get_or_derive(&self, file: &UploadedFile) -> Result<ImageMetadata, DeriveError> {
        if let Some(row) = self.cached(file)? {
            tracing::debug!(upload_id = file.id, "image metadata cache hit");
            return Ok(row);
        }
        tracing::debug!(upload_id = file.id, "image metadata cache miss");
        self.derive_and_cache(file)
    }

    /// Download and decode `file`, then persist its dimensions.
    ///
    /// Returns the row this call computed. If another writer stored a row for
    /// the same file first, that row is kept and this one is only returned.
    pub fn derive_and_cache(&self, file: &UploadedFile) -> Result<ImageMetadata, DeriveError> {
        let bytes = self.downloader.download(&file.uuid, file.actor.as_deref())?;

        let dims = self.backend.identify(&bytes).map_err(|e| {
            if e.is_corrupted_image() {
                DeriveError::CorruptedImage {
                    uuid: file.uuid.clone(),
                    reason: e.to_string(),
                }
            } else {
                DeriveError::Imaging(e)
            }
        })?;

        let row = ImageMetadata {
            upload_id: file.id,
            file_id: file.uuid.clone(),
            image_width: dims.width,
            image_height: dims.height,
        };

        match self.store.insert(row.clone())? {
            InsertOutcome::Inserted => tracing::info!(
                upload_id = file.id,
                width = dims.width,
                height = dims.height,
                "derived image metadata"
            ),
            InsertOutcome::AlreadyPresent => tracing::debug!(
                upload_id = file.id,
                "image metadata already stored by a concurrent writer"
            ),
        }

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::Dimensions;
    use crate::metadata::MemoryMetadataStore;
    use crate::test_helpers::{MemoryFiles, jpeg_bytes, png_bytes, text_bytes};

    #[test]
    fn derive_persists_dimensions_and_uuid() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(42, "hero.png", png_bytes(1920, 1080));
        let store = MemoryMetadataStore::new();
        let backend = RustBackend::new();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let row = deriver.derive_and_cache(&file).unwrap();
        assert_eq!(
            row,
            ImageMetadata {
                upload_id: 42,
                file_id: "uuid-42".into(),
                image_width: 1920,
                image_height: 1080,
            }
        );
        assert_eq!(store.get(42).unwrap(), Some(row));
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(1, "a.jpg", jpeg_bytes(10, 10));
        let store = MemoryMetadataStore::new();
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 300,
            height: 200,
        }]);
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let first = deriver.get_or_derive(&file).unwrap();
        assert_eq!(backend.identify_count(), 1);
        assert_eq!(files.download_count(), 1);

        let second = deriver.get_or_derive(&file).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.identify_count(), 1, "cache hit must not decode");
        assert_eq!(files.download_count(), 1, "cache hit must not download");
    }

    #[test]
    fn derive_and_cache_always_decodes() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(1, "a.png", png_bytes(4, 4));
        let store = MemoryMetadataStore::new();
        let backend = MockBackend::with_dimensions(vec![
            Dimensions { width: 4, height: 4 },
            Dimensions { width: 4, height: 4 },
        ]);
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        deriver.derive_and_cache(&file).unwrap();
        deriver.derive_and_cache(&file).unwrap();
        assert_eq!(backend.identify_count(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn text_payload_is_corrupted_and_writes_nothing() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(5, "notes.txt", text_bytes());
        let store = MemoryMetadataStore::new();
        let backend = RustBackend::new();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let err = deriver.get_or_derive(&file).unwrap_err();
        assert!(matches!(err, DeriveError::CorruptedImage { ref uuid, .. } if uuid == "uuid-5"));
        assert!(store.is_empty());
    }

    #[test]
    fn failed_decode_is_not_cached() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(6, "broken.png", png_bytes(2, 2));
        let store = MemoryMetadataStore::new();
        let backend = MockBackend::corrupted();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        assert!(matches!(
            deriver.get_or_derive(&file),
            Err(DeriveError::CorruptedImage { .. })
        ));
        assert_eq!(deriver.cached(&file).unwrap(), None);
        assert_eq!(files.download_count(), 1);
    }

    #[test]
    fn denied_download_is_distinct_from_corruption() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add_restricted(9, "secret.png", png_bytes(8, 8));
        let store = MemoryMetadataStore::new();
        let backend = MockBackend::new();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let err = deriver.get_or_derive(&file).unwrap_err();
        assert!(matches!(err, DeriveError::AuthorizationDenied { .. }));
        assert_eq!(backend.identify_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn missing_file_is_not_found() {
        let files = MemoryFiles::new("https://cdn.test");
        let ghost = UploadedFile {
            id: 77,
            uuid: "gone".into(),
            base_name: "gone.png".into(),
            path: "gone.png".into(),
            mime_type: "image/png".into(),
            actor: None,
            restricted: false,
        };
        let store = MemoryMetadataStore::new();
        let backend = MockBackend::new();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let err = deriver.derive_and_cache(&ghost).unwrap_err();
        assert!(matches!(err, DeriveError::NotFound(ref uuid) if uuid == "gone"));
    }

    #[test]
    fn concurrent_misses_store_one_row() {
        let files = MemoryFiles::new("https://cdn.test");
        let file = files.add(3, "race.png", png_bytes(64, 32));
        let store = MemoryMetadataStore::new();
        let backend = RustBackend::new();
        let deriver = MetadataDeriver::new(&backend, &files, &store);

        let rows: Vec<ImageMetadata> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| deriver.derive_and_cache(&file).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(rows.iter().all(|r| r.image_width == 64 && r.image_height == 32));
        assert_eq!(store.len(), 1);
    }
}
