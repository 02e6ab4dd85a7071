//! Image processing on in-memory payloads, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | full decode via `image::ImageReader` |
//! | **Resize to bound** | `resize_exact` + Lanczos3, never upscaling |
//! | **Watermark** | `imageops::overlay` at a configured anchor |
//! | **Orientation** | EXIF orientation applied to pixels, tag dropped |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining configuration + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{aspect_ratio_string, calculate_anchor_offset, calculate_bounded_dimensions};
pub use operations::{NormalizeConfig, normalize, plan_normalize};
pub use params::{NormalizeParams, RasterFormat, Watermark, WatermarkPosition};
pub use rust_backend::RustBackend;
