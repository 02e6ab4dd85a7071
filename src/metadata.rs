//! Cached intrinsic image metadata.
//!
//! Decoding an image to learn its size is far more expensive than rendering
//! the placeholder that needs it, and renders vastly outnumber uploads. The
//! width and height are therefore derived once per file and kept in a
//! [`MetadataStore`], keyed by the file's identifier.
//!
//! # Rows
//!
//! An [`ImageMetadata`] row is one-to-one with its file: `upload_id` *is* the
//! file's identifier, never a generated key. Rows are written once by the
//! [`MetadataDeriver`](crate::deriver::MetadataDeriver) and never updated.
//! If a file's bytes change after derivation the row goes stale; nothing in
//! this crate detects that.
//!
//! # Concurrent writers
//!
//! Two renders can miss the cache for the same file at the same time and
//! both derive. [`MetadataStore::insert`] is insert-if-absent: the second
//! insert reports [`InsertOutcome::AlreadyPresent`] and leaves the first row
//! in place. It is never an error.
//!
//! # Stores
//!
//! - [`MemoryMetadataStore`]: process-local map, for tests and embedding.
//! - [`JsonMetadataStore`]: a versioned JSON document on disk, shared by
//!   every process that opens the same directory. Missing, corrupt or
//!   version-mismatched documents load as empty, since every row can be
//!   derived again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Name of the metadata document within a library directory.
pub const STORE_FILENAME: &str = ".image-metadata.json";

/// Version of the on-disk format. Bump this to discard existing caches when
/// the row layout changes.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Metadata store lock poisoned")]
    Poisoned,
}

/// Derived metadata row for one uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// The owning file's identifier.
    pub upload_id: u64,
    /// Denormalized copy of the file's uuid.
    pub file_id: String,
    pub image_width: u32,
    pub image_height: u32,
}

impl ImageMetadata {
    /// `"<width>/<height>"`, exactly as decoded.
    pub fn aspect_ratio(&self) -> String {
        crate::imaging::aspect_ratio_string(self.image_width, self.image_height)
    }
}

/// What an insert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row for this upload id already existed and was kept.
    AlreadyPresent,
}

/// Persistence port for [`ImageMetadata`] rows.
pub trait MetadataStore: Send + Sync {
    fn get(&self, upload_id: u64) -> Result<Option<ImageMetadata>, StoreError>;

    /// Insert `row` unless a row with the same `upload_id` exists.
    fn insert(&self, row: ImageMetadata) -> Result<InsertOutcome, StoreError>;
}

fn insert_if_absent(rows: &mut BTreeMap<u64, ImageMetadata>, row: ImageMetadata) -> InsertOutcome {
    if rows.contains_key(&row.upload_id) {
        return InsertOutcome::AlreadyPresent;
    }
    rows.insert(row.upload_id, row);
    InsertOutcome::Inserted
}

// =========================================================================
// In-memory store
// =========================================================================

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<BTreeMap<u64, ImageMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<u64, ImageMetadata>>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, upload_id: u64) -> Result<Option<ImageMetadata>, StoreError> {
        Ok(self.rows()?.get(&upload_id).cloned())
    }

    fn insert(&self, row: ImageMetadata) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows()?;
        Ok(insert_if_absent(&mut rows, row))
    }
}

// =========================================================================
// JSON document store
// =========================================================================

/// On-disk layout of the metadata document.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    rows: BTreeMap<u64, ImageMetadata>,
}

/// Metadata rows persisted as a JSON document.
///
/// Rows are cached in memory behind a mutex. A lookup that misses the cache
/// re-reads the document, so rows written by another process are picked up.
/// An insert re-reads the document, merges it with insert-if-absent, and
/// replaces the file atomically (temp file + rename) while the lock is held.
/// Readers never see a partial document, and a writer never drops rows it did
/// not know about when it opened the store.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<u64, ImageMetadata>>,
}

impl JsonMetadataStore {
    /// Open the store inside `dir`. Returns an empty store if the document
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(STORE_FILENAME);
        let rows = Self::load_rows(&path).unwrap_or_default();
        Self {
            path,
            rows: Mutex::new(rows),
        }
    }

    fn load_rows(path: &Path) -> Option<BTreeMap<u64, ImageMetadata>> {
        let content = std::fs::read_to_string(path).ok()?;
        let doc: StoreDocument = serde_json::from_str(&content).ok()?;
        if doc.version != STORE_VERSION {
            tracing::debug!(
                path = %path.display(),
                version = doc.version,
                "discarding metadata cache of another version"
            );
            return None;
        }
        Some(doc.rows)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<u64, ImageMetadata>>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    /// The on-disk rows with every cached row added where absent.
    fn merged_with_disk(
        &self,
        cached: &BTreeMap<u64, ImageMetadata>,
    ) -> BTreeMap<u64, ImageMetadata> {
        let mut rows = Self::load_rows(&self.path).unwrap_or_default();
        for row in cached.values() {
            insert_if_absent(&mut rows, row.clone());
        }
        rows
    }

    fn save(&self, rows: &BTreeMap<u64, ImageMetadata>) -> Result<(), StoreError> {
        let doc = StoreDocument {
            version: STORE_VERSION,
            rows: rows.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn get(&self, upload_id: u64) -> Result<Option<ImageMetadata>, StoreError> {
        let mut rows = self.rows()?;
        if let Some(row) = rows.get(&upload_id) {
            return Ok(Some(row.clone()));
        }
        *rows = self.merged_with_disk(&rows);
        Ok(rows.get(&upload_id).cloned())
    }

    fn insert(&self, row: ImageMetadata) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows()?;
        let mut merged = self.merged_with_disk(&rows);
        let outcome = insert_if_absent(&mut merged, row);
        if outcome == InsertOutcome::Inserted {
            // Memory only takes the new row once it is on disk
            self.save(&merged)?;
        }
        *rows = merged;
        Ok(outcome)
    }
}
