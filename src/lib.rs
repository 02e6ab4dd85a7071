//! # Upload Imaging
//!
//! Image post-processing for a file-upload feature. Uploaded JPEG and PNG
//! files are normalized when they arrive, and rendered documents get image
//! previews whose aspect ratio is known before the image loads.
//!
//! # Architecture: Upload Time vs. Render Time
//!
//! ```text
//! upload   file ──▶ process   ──▶ resize, watermark, orientation, rewrite in place
//! render   <UPL-IMAGE-PREVIEW uuid="…"/>
//!               ──▶ preview  ──▶ resolve file, url/alt/title
//!               ──▶ deriver  ──▶ store hit? ──no──▶ download + decode + insert
//!               ──▶ aspectRatio="1920/1080"
//! ```
//!
//! Renders happen far more often than uploads, so image dimensions are
//! derived on the first render that needs them and served from the metadata
//! store afterwards. A warm render does no I/O beyond the store lookup and
//! never decodes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Ingestion hook: normalize a stored upload in place, batch mode via rayon |
//! | [`deriver`] | Get-or-compute cache of image dimensions |
//! | [`preview`] | Placeholder attribute rewriter and document renderer |
//! | [`markup`] | Tag-level XML traversal with a per-node callback |
//! | [`metadata`] | `ImageMetadata` rows, in-memory and JSON-document stores |
//! | [`files`] | `UploadedFile` and the file lookup / download ports |
//! | [`library`] | Directory-backed file library implementing those ports |
//! | [`imaging`] | Pure-Rust decode, identify and normalize on the `image` crate |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Ports Over Globals
//!
//! File lookup, downloads, image decoding and metadata storage are traits
//! passed in by reference. Settings are an explicit [`config::UploadConfig`]
//! value. Tests swap any collaborator for an in-memory one.
//!
//! ## Insert-If-Absent
//!
//! Two renders may miss the cache for the same file at once. Both derive the
//! same dimensions; the store keeps the first row and reports the second as
//! already present. No lock spans the download and decode.
//!
//! ## Rendering Never Fails on One Bad File
//!
//! A preview that points at a missing, forbidden or undecodable file keeps
//! whatever attributes could be computed and drops only `aspectRatio`. The
//! failure is logged and nothing is cached, so a fixed file recovers on the
//! next render.

pub mod config;
pub mod deriver;
pub mod files;
pub mod imaging;
pub mod library;
pub mod markup;
pub mod metadata;
pub mod output;
pub mod preview;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
