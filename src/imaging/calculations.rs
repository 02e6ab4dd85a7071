//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::WatermarkPosition;

/// Calculate the dimensions of an image scaled to fit inside a square bound.
///
/// The longer edge becomes `max_size`, the other edge is scaled to preserve
/// the aspect ratio (rounded, never below one pixel). Images that already fit
/// are returned unchanged: there is no upscaling.
///
/// # Examples
/// ```
/// # use upload_imaging::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((2000, 1500), 1000), (1000, 750));
/// assert_eq!(calculate_bounded_dimensions((640, 480), 1000), (640, 480));
/// ```
pub fn calculate_bounded_dimensions(original: (u32, u32), max_size: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if max_size == 0 || (orig_w <= max_size && orig_h <= max_size) {
        return original;
    }

    if orig_w >= orig_h {
        // Landscape or square
        let ratio = max_size as f64 / orig_w as f64;
        (max_size, ((orig_h as f64 * ratio).round() as u32).max(1))
    } else {
        // Portrait
        let ratio = max_size as f64 / orig_h as f64;
        (((orig_w as f64 * ratio).round() as u32).max(1), max_size)
    }
}

/// Top-left offset at which to place an overlay of size `overlay` on a
/// canvas of size `canvas` for the given anchor.
///
/// Offsets may be negative when the overlay is larger than the canvas; the
/// compositor clips at the canvas edges.
pub fn calculate_anchor_offset(
    position: WatermarkPosition,
    canvas: (u32, u32),
    overlay: (u32, u32),
) -> (i64, i64) {
    let free_x = canvas.0 as i64 - overlay.0 as i64;
    let free_y = canvas.1 as i64 - overlay.1 as i64;

    let x = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::Left | WatermarkPosition::BottomLeft => 0,
        WatermarkPosition::Top | WatermarkPosition::Center | WatermarkPosition::Bottom => {
            free_x / 2
        }
        WatermarkPosition::TopRight
        | WatermarkPosition::Right
        | WatermarkPosition::BottomRight => free_x,
    };
    let y = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::Top | WatermarkPosition::TopRight => 0,
        WatermarkPosition::Left | WatermarkPosition::Center | WatermarkPosition::Right => {
            free_y / 2
        }
        WatermarkPosition::BottomLeft
        | WatermarkPosition::Bottom
        | WatermarkPosition::BottomRight => free_y,
    };
    (x, y)
}

/// Format intrinsic dimensions as an unreduced `width/height` ratio.
pub fn aspect_ratio_string(width: u32, height: u32) -> String {
    format!("{width}/{height}")
}
