//! Aspect-ratio-aware fit math for projecting normalized guidance onto a
//! camera preview surface.
//!
//! All template geometry lives in a 0..1 space relative to the scene's
//! source aspect ratio. The live preview renders with "cover" semantics
//! (scale to fill, center-crop), so overlay coordinates must be scaled and
//! offset the same way before they line up with the camera image.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tolerance for `x + width <= 1` style checks on float input.
pub const NORMALIZED_EPSILON: f64 = 1e-9;

/// Number of rows and columns in the fixed guidance grid.
pub const GRID_DIVISIONS: u32 = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Source aspect ratio of template geometry, e.g. `9:16`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    /// Portrait phone capture, the default when a scene declares none.
    pub const PORTRAIT_9_16: Self = Self {
        width: 9.0,
        height: 16.0,
    };

    pub fn new(width: f64, height: f64) -> Result<Self, CoreError> {
        validate_dimension("aspect width", width)?;
        validate_dimension("aspect height", height)?;
        Ok(Self { width, height })
    }

    /// Parse a `"W:H"` string. Components may be decimals (`"1.85:1"`).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let (w, h) = value.trim().split_once(':').ok_or_else(|| {
            CoreError::InvalidGeometry(format!("aspect '{value}' is not in W:H form"))
        })?;
        let parse_part = |part: &str| {
            part.trim().parse::<f64>().map_err(|_| {
                CoreError::InvalidGeometry(format!("aspect '{value}' has a non-numeric part"))
            })
        };
        Self::new(parse_part(w)?, parse_part(h)?)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT_9_16
    }
}

/// How source content is scaled into a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to fill, preserving aspect ratio, cropping overflow.
    Cover,
    /// Scale to fit inside, preserving aspect ratio, letterboxing.
    Contain,
    /// Stretch independently on each axis.
    Fill,
}

/// Result of fitting a source aspect ratio into a container.
///
/// For [`FitMode::Fill`] the axes scale independently and `scale` reports
/// the horizontal factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f64,
    pub drawn_width: f64,
    pub drawn_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Fit {
    /// Map a normalized point into container pixels.
    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_x + x * self.drawn_width,
            self.offset_y + y * self.drawn_height,
        )
    }
}

/// A rectangle in 0..1 source space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when all fields are finite, the origin is non-negative, the
    /// size is positive and the rect does not extend past 1 on either axis.
    pub fn is_valid(&self) -> bool {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + NORMALIZED_EPSILON
            && self.y + self.height <= 1.0 + NORMALIZED_EPSILON
    }
}

/// A rectangle in container pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub const ZERO: Self = Self {
        left: 0.0,
        top: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Clip this rect to `[0, w] x [0, h]`.
    ///
    /// The origin is clamped first, then the size is cut to the room left
    /// between the clamped origin and the original trailing edge.
    pub fn clamp_to(&self, container_width: f64, container_height: f64) -> Self {
        let left = self.left.min(container_width).max(0.0);
        let top = self.top.min(container_height).max(0.0);
        let width = (self.right().min(container_width) - left).max(0.0);
        let height = (self.bottom().min(container_height) - top).max(0.0);
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

// ---------------------------------------------------------------------------
// Fit computation
// ---------------------------------------------------------------------------

fn validate_dimension(name: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::InvalidGeometry(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

/// Compute the "cover" fit of a source aspect into a container.
///
/// `scale` is the smallest factor that makes the scaled source at least as
/// large as the container on both axes; offsets are the symmetric crop and
/// are never positive.
pub fn cover_fit(
    container_width: f64,
    container_height: f64,
    aspect_width: f64,
    aspect_height: f64,
) -> Result<Fit, CoreError> {
    fit(
        container_width,
        container_height,
        aspect_width,
        aspect_height,
        FitMode::Cover,
    )
}

/// Compute the fit of a source aspect into a container under `mode`.
pub fn fit(
    container_width: f64,
    container_height: f64,
    aspect_width: f64,
    aspect_height: f64,
    mode: FitMode,
) -> Result<Fit, CoreError> {
    validate_dimension("container width", container_width)?;
    validate_dimension("container height", container_height)?;
    validate_dimension("aspect width", aspect_width)?;
    validate_dimension("aspect height", aspect_height)?;

    let scale_x = container_width / aspect_width;
    let scale_y = container_height / aspect_height;

    let (scale, drawn_width, drawn_height) = match mode {
        FitMode::Cover => {
            let s = scale_x.max(scale_y);
            (s, aspect_width * s, aspect_height * s)
        }
        FitMode::Contain => {
            let s = scale_x.min(scale_y);
            (s, aspect_width * s, aspect_height * s)
        }
        FitMode::Fill => (scale_x, container_width, container_height),
    };

    Ok(Fit {
        scale,
        drawn_width,
        drawn_height,
        offset_x: (container_width - drawn_width) / 2.0,
        offset_y: (container_height - drawn_height) / 2.0,
    })
}

/// Project a normalized rect into container pixels and clip it to the
/// container.
///
/// Invalid input (see [`NormalizedRect::is_valid`]) or a degenerate
/// container yields [`PixelRect::ZERO`] instead of an error.
pub fn to_pixel_rect(
    rect: &NormalizedRect,
    container_width: f64,
    container_height: f64,
    aspect: AspectRatio,
    mode: FitMode,
) -> PixelRect {
    if !rect.is_valid() {
        return PixelRect::ZERO;
    }
    let Ok(fit) = fit(
        container_width,
        container_height,
        aspect.width,
        aspect.height,
        mode,
    ) else {
        return PixelRect::ZERO;
    };

    let (left, top) = fit.map_point(rect.x, rect.y);
    PixelRect {
        left,
        top,
        width: rect.width * fit.drawn_width,
        height: rect.height * fit.drawn_height,
    }
    .clamp_to(container_width, container_height)
}

/// Pixel rect of a 1-based, row-major cell of the fixed 3x3 guidance grid.
///
/// The grid partitions the container itself, not the cover-fitted source.
pub fn grid_cell_rect(cell: i32, container_width: f64, container_height: f64) -> Option<PixelRect> {
    let cells = (GRID_DIVISIONS * GRID_DIVISIONS) as i32;
    if !(1..=cells).contains(&cell) {
        return None;
    }
    if validate_dimension("container width", container_width).is_err()
        || validate_dimension("container height", container_height).is_err()
    {
        return None;
    }
    let idx = (cell - 1) as u32;
    let cell_w = container_width / GRID_DIVISIONS as f64;
    let cell_h = container_height / GRID_DIVISIONS as f64;
    Some(PixelRect {
        left: (idx % GRID_DIVISIONS) as f64 * cell_w,
        top: (idx / GRID_DIVISIONS) as f64 * cell_h,
        width: cell_w,
        height: cell_h,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const CONTAINERS: &[(f64, f64)] = &[
        (360.0, 640.0),
        (640.0, 360.0),
        (1.0, 1.0),
        (1080.0, 2340.0),
        (768.0, 1024.0),
        (333.3, 17.5),
    ];

    const ASPECTS: &[(f64, f64)] = &[(9.0, 16.0), (16.0, 9.0), (4.0, 3.0), (1.0, 1.0), (2.39, 1.0)];

    // -- cover_fit -----------------------------------------------------------

    #[test]
    fn cover_never_underfills() {
        for &(cw, ch) in CONTAINERS {
            for &(aw, ah) in ASPECTS {
                let f = cover_fit(cw, ch, aw, ah).unwrap();
                assert!(f.drawn_width >= cw - 1e-9, "{cw}x{ch} {aw}:{ah}");
                assert!(f.drawn_height >= ch - 1e-9, "{cw}x{ch} {aw}:{ah}");
                assert!(f.offset_x <= 1e-9);
                assert!(f.offset_y <= 1e-9);
            }
        }
    }

    #[test]
    fn cover_matching_aspect_has_no_crop() {
        let f = cover_fit(360.0, 640.0, 9.0, 16.0).unwrap();
        assert_eq!(f.scale, 40.0);
        assert_eq!(f.drawn_width, 360.0);
        assert_eq!(f.drawn_height, 640.0);
        assert_eq!(f.offset_x, 0.0);
        assert_eq!(f.offset_y, 0.0);
    }

    #[test]
    fn cover_crops_wider_source_horizontally() {
        // 16:9 into a portrait container: height drives the scale.
        let f = cover_fit(360.0, 640.0, 16.0, 9.0).unwrap();
        assert!((f.scale - 640.0 / 9.0).abs() < 1e-9);
        assert!((f.drawn_height - 640.0).abs() < 1e-9);
        assert!(f.drawn_width > 360.0);
        assert!((f.offset_x - (360.0 - f.drawn_width) / 2.0).abs() < 1e-9);
        assert!(f.offset_y.abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_are_invalid_geometry() {
        assert_matches!(cover_fit(0.0, 640.0, 9.0, 16.0), Err(CoreError::InvalidGeometry(_)));
        assert_matches!(cover_fit(360.0, -1.0, 9.0, 16.0), Err(CoreError::InvalidGeometry(_)));
        assert_matches!(cover_fit(360.0, 640.0, 0.0, 16.0), Err(CoreError::InvalidGeometry(_)));
        assert_matches!(cover_fit(360.0, 640.0, 9.0, f64::NAN), Err(CoreError::InvalidGeometry(_)));
        assert_matches!(
            cover_fit(f64::INFINITY, 640.0, 9.0, 16.0),
            Err(CoreError::InvalidGeometry(_))
        );
    }

    // -- fit modes -----------------------------------------------------------

    #[test]
    fn contain_letterboxes() {
        let f = fit(360.0, 640.0, 16.0, 9.0, FitMode::Contain).unwrap();
        assert!((f.drawn_width - 360.0).abs() < 1e-9);
        assert!(f.drawn_height < 640.0);
        assert!(f.offset_y > 0.0);
        assert!(f.offset_x.abs() < 1e-9);
    }

    #[test]
    fn fill_stretches_to_container() {
        let f = fit(300.0, 100.0, 9.0, 16.0, FitMode::Fill).unwrap();
        assert_eq!(f.drawn_width, 300.0);
        assert_eq!(f.drawn_height, 100.0);
        assert_eq!(f.offset_x, 0.0);
        assert_eq!(f.offset_y, 0.0);
    }

    // -- to_pixel_rect -------------------------------------------------------

    #[test]
    fn pixel_rect_for_matching_aspect() {
        let rect = NormalizedRect::new(0.1, 0.1, 0.5, 0.9);
        let px = to_pixel_rect(&rect, 360.0, 640.0, AspectRatio::PORTRAIT_9_16, FitMode::Cover);
        assert!((px.left - 36.0).abs() < 1e-9);
        assert!((px.top - 64.0).abs() < 1e-9);
        assert!((px.width - 180.0).abs() < 1e-9);
        assert!((px.height - 576.0).abs() < 1e-9);
    }

    #[test]
    fn cover_rects_stay_inside_container() {
        let boxes = [
            NormalizedRect::new(0.0, 0.0, 1.0, 1.0),
            NormalizedRect::new(0.0, 0.0, 0.1, 0.1),
            NormalizedRect::new(0.9, 0.9, 0.1, 0.1),
            NormalizedRect::new(0.25, 0.4, 0.5, 0.6),
            NormalizedRect::new(0.7, 0.0, 0.3, 1.0),
        ];
        for &(cw, ch) in CONTAINERS {
            for &(aw, ah) in ASPECTS {
                let aspect = AspectRatio::new(aw, ah).unwrap();
                for b in &boxes {
                    let px = to_pixel_rect(b, cw, ch, aspect, FitMode::Cover);
                    assert!(px.left >= 0.0 && px.top >= 0.0, "{b:?} in {cw}x{ch}");
                    assert!(px.right() <= cw + 1e-9, "{b:?} in {cw}x{ch}");
                    assert!(px.bottom() <= ch + 1e-9, "{b:?} in {cw}x{ch}");
                }
            }
        }
    }

    #[test]
    fn cropped_edge_box_shrinks_instead_of_shifting() {
        // 16:9 source in a square container: 1/8 of the width is cropped per side.
        let aspect = AspectRatio::new(16.0, 9.0).unwrap();
        let rect = NormalizedRect::new(0.0, 0.0, 0.25, 1.0);
        let px = to_pixel_rect(&rect, 900.0, 900.0, aspect, FitMode::Cover);
        let f = cover_fit(900.0, 900.0, 16.0, 9.0).unwrap();
        let raw_right = f.offset_x + 0.25 * f.drawn_width;
        assert_eq!(px.left, 0.0);
        assert!((px.right() - raw_right).abs() < 1e-9);
    }

    #[test]
    fn invalid_normalized_input_yields_zero_rect() {
        let cases = [
            NormalizedRect::new(f64::NAN, 0.0, 0.5, 0.5),
            NormalizedRect::new(-0.1, 0.0, 0.5, 0.5),
            NormalizedRect::new(0.1, 0.1, 0.0, 0.5),
            NormalizedRect::new(0.1, 0.1, 0.5, -0.5),
            NormalizedRect::new(0.8, 0.1, 0.5, 0.5),
            NormalizedRect::new(0.1, 0.8, 0.5, 0.5),
        ];
        for rect in cases {
            let px = to_pixel_rect(&rect, 360.0, 640.0, AspectRatio::PORTRAIT_9_16, FitMode::Cover);
            assert_eq!(px, PixelRect::ZERO, "{rect:?}");
        }
    }

    #[test]
    fn degenerate_container_yields_zero_rect() {
        let rect = NormalizedRect::new(0.1, 0.1, 0.5, 0.5);
        let px = to_pixel_rect(&rect, 0.0, 640.0, AspectRatio::PORTRAIT_9_16, FitMode::Contain);
        assert_eq!(px, PixelRect::ZERO);
    }

    // -- AspectRatio::parse --------------------------------------------------

    #[test]
    fn parses_aspect_strings() {
        assert_eq!(AspectRatio::parse("9:16").unwrap(), AspectRatio::PORTRAIT_9_16);
        assert_eq!(AspectRatio::parse(" 16 : 9 ").unwrap(), AspectRatio::new(16.0, 9.0).unwrap());
        assert_eq!(AspectRatio::parse("1.85:1").unwrap().width, 1.85);
    }

    #[test]
    fn rejects_malformed_aspect_strings() {
        for bad in ["", "916", "9:", ":16", "a:b", "0:16", "9:-16"] {
            assert!(
                matches!(AspectRatio::parse(bad), Err(CoreError::InvalidGeometry(_))),
                "{bad}"
            );
        }
    }

    // -- grid_cell_rect ------------------------------------------------------

    #[test]
    fn grid_cells_partition_container() {
        let first = grid_cell_rect(1, 300.0, 600.0).unwrap();
        assert_eq!(first, PixelRect { left: 0.0, top: 0.0, width: 100.0, height: 200.0 });
        let center = grid_cell_rect(5, 300.0, 600.0).unwrap();
        assert_eq!(center.left, 100.0);
        assert_eq!(center.top, 200.0);
        let last = grid_cell_rect(9, 300.0, 600.0).unwrap();
        assert_eq!(last.right(), 300.0);
        assert_eq!(last.bottom(), 600.0);
    }

    #[test]
    fn grid_cell_out_of_range() {
        assert!(grid_cell_rect(0, 300.0, 600.0).is_none());
        assert!(grid_cell_rect(10, 300.0, 600.0).is_none());
        assert!(grid_cell_rect(3, 0.0, 600.0).is_none());
    }
}
