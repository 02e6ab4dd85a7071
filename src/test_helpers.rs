//! Shared test utilities for the crate's unit tests.
//!
//! Provides synthetic image payloads and an in-memory file collaborator that
//! implements both [`FileRepository`] and [`Downloader`] while counting
//! downloads.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let files = MemoryFiles::new("https://cdn.test");
//! let file = files.add(1, "cat.png", png_bytes(1920, 1080));
//! assert_eq!(files.url_for_file(&file).as_deref(), Some("https://cdn.test/cat.png"));
//! ```

use crate::files::{DownloadError, Downloader, FileRepository, UploadedFile};
use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Synthetic payloads
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A valid baseline JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(
            gradient(width, height).as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    out
}

/// A valid RGB PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_with_encoder(image::codecs::png::PngEncoder::new(&mut out))
        .unwrap();
    out
}

/// A single-color RGBA PNG.
pub fn solid_png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
        .write_with_encoder(image::codecs::png::PngEncoder::new(&mut out))
        .unwrap();
    out
}

/// Insert an EXIF APP1 segment carrying only an orientation tag right after
/// the JPEG SOI marker.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08"); // big-endian, IFD at 8
    tiff.extend_from_slice(&1u16.to_be_bytes()); // one entry
    tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes()); // count
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]); // value padding
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD

    let mut app1 = b"Exif\x00\x00".to_vec();
    app1.extend_from_slice(&tiff);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A payload no image decoder accepts.
pub fn text_bytes() -> Vec<u8> {
    b"Meeting notes\n- bring the slides\n".to_vec()
}

// =========================================================================
// In-memory file collaborator
// =========================================================================

/// Files and their bytes held in memory.
///
/// URLs are `<base_url>/<path>`. Files added with [`MemoryFiles::add_restricted`]
/// refuse every download.
pub struct MemoryFiles {
    base_url: String,
    files: Mutex<Vec<(UploadedFile, Vec<u8>)>>,
    downloads: AtomicUsize,
}

impl MemoryFiles {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            files: Mutex::new(Vec::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn add(&self, id: u64, name: &str, bytes: Vec<u8>) -> UploadedFile {
        self.insert(id, name, bytes, false)
    }

    pub fn add_restricted(&self, id: u64, name: &str, bytes: Vec<u8>) -> UploadedFile {
        self.insert(id, name, bytes, true)
    }

    fn insert(&self, id: u64, name: &str, bytes: Vec<u8>, restricted: bool) -> UploadedFile {
        let file = UploadedFile {
            id,
            uuid: format!("uuid-{id}"),
            base_name: name.to_string(),
            path: name.to_string(),
            mime_type: "image/png".to_string(),
            actor: Some("alice".to_string()),
            restricted,
        };
        self.files.lock().unwrap().push((file.clone(), bytes));
        file
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl FileRepository for MemoryFiles {
    fn find_by_uuid(&self, uuid: &str) -> Option<UploadedFile> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| f.uuid == uuid)
            .map(|(f, _)| f.clone())
    }

    fn find_by_url(&self, url: &str) -> Option<UploadedFile> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| format!("{}/{}", self.base_url, f.path) == url)
            .map(|(f, _)| f.clone())
    }

    fn url_for_file(&self, file: &UploadedFile) -> Option<String> {
        Some(format!("{}/{}", self.base_url, file.path))
    }
}

impl Downloader for MemoryFiles {
    fn download(&self, uuid: &str, _actor: Option<&str>) -> Result<Vec<u8>, DownloadError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        let (file, bytes) = files
            .iter()
            .find(|(f, _)| f.uuid == uuid)
            .ok_or_else(|| DownloadError::NotFound(uuid.to_string()))?;
        if file.restricted {
            return Err(DownloadError::AuthorizationDenied {
                uuid: uuid.to_string(),
            });
        }
        Ok(bytes.clone())
    }
}
