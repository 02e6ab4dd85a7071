//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify (decode and report intrinsic dimensions) and normalize
//! (resize, watermark, orient, re-encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Backends work on in-memory byte buffers: uploads are read once by
//! the caller and written back only after a successful pass.

use super::params::NormalizeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The payload is not a decodable image.
    #[error("Corrupted image: {0}")]
    Decode(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    /// The configured watermark asset could not be decoded.
    #[error("Watermark asset unreadable: {0}")]
    Watermark(String),
}

impl BackendError {
    /// Whether this error means the input bytes themselves are bad.
    pub fn is_corrupted_image(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be shareable across render threads.
pub trait ImageBackend: Send + Sync {
    /// Decode `bytes` and return the intrinsic pixel dimensions.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Execute a normalization pass and return the re-encoded bytes.
    fn normalize(&self, bytes: &[u8], params: &NormalizeParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::RasterFormat;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and can be shared by threads.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Result<Dimensions, String>>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(usize),
        Normalize {
            len: usize,
            format: RasterFormat,
            max_size: Option<u32>,
            watermark: bool,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Results are popped from the end, so the last entry answers first.
        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims.into_iter().map(Ok).collect()),
                operations: Mutex::new(Vec::new()),
            }
        }

        /// A backend whose next identify fails as if the bytes were not an image.
        pub fn corrupted() -> Self {
            Self {
                identify_results: Mutex::new(vec![Err("not an image".to_string())]),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn identify_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Identify(_)))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(bytes.len()));

            match self.identify_results.lock().unwrap().pop() {
                Some(Ok(dims)) => Ok(dims),
                Some(Err(msg)) => Err(BackendError::Decode(msg)),
                None => Err(BackendError::Decode("No mock dimensions".to_string())),
            }
        }

        fn normalize(
            &self,
            bytes: &[u8],
            params: &NormalizeParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Normalize {
                len: bytes.len(),
                format: params.format,
                max_size: params.max_size,
                watermark: params.watermark.is_some(),
            });
            let mut out = b"normalized:".to_vec();
            out.extend_from_slice(bytes);
            Ok(out)
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(b"abc").unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Identify(3)]);
    }

    #[test]
    fn mock_corrupted_reports_decode_error() {
        let backend = MockBackend::corrupted();
        let err = backend.identify(b"plain text").unwrap_err();
        assert!(err.is_corrupted_image());
    }

    #[test]
    fn mock_records_normalize() {
        let backend = MockBackend::new();

        let out = backend
            .normalize(
                b"raw",
                &NormalizeParams {
                    format: RasterFormat::Png,
                    max_size: Some(100),
                    watermark: None,
                },
            )
            .unwrap();
        assert_eq!(out, b"normalized:raw");

        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Normalize {
                len: 3,
                format: RasterFormat::Png,
                max_size: Some(100),
                watermark: false,
            }
        ));
    }

    #[test]
    fn only_decode_errors_are_corrupted_images() {
        assert!(BackendError::Decode("x".into()).is_corrupted_image());
        assert!(!BackendError::Encode("x".into()).is_corrupted_image());
        assert!(!BackendError::Watermark("x".into()).is_corrupted_image());
    }
}
