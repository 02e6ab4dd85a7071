//! CLI output formatting.
//!
//! Every entity is shown as a header line with its id and display name,
//! followed by indented context lines:
//!
//! ```text
//! 001 dawn.jpg (100×75)
//!     Uuid: 6f1c…
//!     Url: /assets/files/6f1c…-dawn.jpg
//!     Type: image/jpeg
//! ```
//!
//! Each command has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions do no I/O.

use crate::deriver::DeriveError;
use crate::files::UploadedFile;
use crate::library::LibraryError;
use crate::metadata::ImageMetadata;
use crate::process::{ProcessError, ProcessOutcome};
use std::collections::BTreeMap;
use std::path::Path;

fn format_index(id: u64) -> String {
    format!("{:0>3}", id)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `"001 name"` with an optional `(W×H)` suffix.
fn file_header(file: &UploadedFile, dims: Option<&ImageMetadata>) -> String {
    match dims {
        Some(m) => format!(
            "{} {} ({}×{})",
            format_index(file.id),
            file.base_name,
            m.image_width,
            m.image_height
        ),
        None => format!("{} {}", format_index(file.id), file.base_name),
    }
}

fn file_context(file: &UploadedFile, url: Option<&str>) -> Vec<String> {
    let mut lines = vec![format!("{}Uuid: {}", indent(1), file.uuid)];
    if let Some(url) = url {
        lines.push(format!("{}Url: {}", indent(1), url));
    }
    let access = if file.restricted { ", restricted" } else { "" };
    lines.push(format!("{}Type: {}{}", indent(1), file.mime_type, access));
    lines
}

// ============================================================================
// add
// ============================================================================

pub fn format_add_result(
    source: &Path,
    result: &Result<UploadedFile, LibraryError>,
    url: Option<&str>,
) -> Vec<String> {
    match result {
        Ok(file) => {
            let mut lines = vec![file_header(file, None)];
            lines.push(format!("{}Source: {}", indent(1), source.display()));
            lines.extend(file_context(file, url));
            lines
        }
        Err(e) => vec![format!("{}: rejected ({})", source.display(), e)],
    }
}

pub fn print_add_result(
    source: &Path,
    result: &Result<UploadedFile, LibraryError>,
    url: Option<&str>,
) {
    for line in format_add_result(source, result, url) {
        println!("{}", line);
    }
}

// ============================================================================
// normalize
// ============================================================================

pub fn format_normalize_result(
    path: &Path,
    result: &Result<ProcessOutcome, ProcessError>,
) -> String {
    match result {
        Ok(ProcessOutcome::Normalized {
            format,
            bytes_before,
            bytes_after,
        }) => format!(
            "{}: normalized as {} ({} → {} bytes)",
            path.display(),
            format.mime_type(),
            bytes_before,
            bytes_after
        ),
        Ok(ProcessOutcome::Skipped) => {
            format!("{}: skipped (not a JPEG or PNG)", path.display())
        }
        Err(e) => format!("{}: failed ({})", path.display(), e),
    }
}

// ============================================================================
// identify
// ============================================================================

pub fn format_identify(
    file: &UploadedFile,
    result: &Result<ImageMetadata, DeriveError>,
) -> Vec<String> {
    match result {
        Ok(meta) => vec![
            file_header(file, Some(meta)),
            format!("{}Aspect ratio: {}", indent(1), meta.aspect_ratio()),
        ],
        Err(e) => vec![
            file_header(file, None),
            format!("{}Error: {}", indent(1), e),
        ],
    }
}

pub fn print_identify(file: &UploadedFile, result: &Result<ImageMetadata, DeriveError>) {
    for line in format_identify(file, result) {
        println!("{}", line);
    }
}

// ============================================================================
// list
// ============================================================================

/// List files with their public URL and, when already derived, dimensions.
pub fn format_file_list(
    files: &[(UploadedFile, Option<String>)],
    metadata: &BTreeMap<u64, ImageMetadata>,
) -> Vec<String> {
    let mut lines = vec!["Files".to_string()];
    for (file, url) in files {
        lines.push(file_header(file, metadata.get(&file.id)));
        lines.extend(file_context(file, url.as_deref()));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} files, {} with image metadata",
        files.len(),
        metadata.len()
    ));
    lines
}

pub fn print_file_list(
    files: &[(UploadedFile, Option<String>)],
    metadata: &BTreeMap<u64, ImageMetadata>,
) {
    for line in format_file_list(files, metadata) {
        println!("{}", line);
    }
}
