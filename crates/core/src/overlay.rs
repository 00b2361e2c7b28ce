//! Overlay projection: scene guidance -> pixel-space primitives.
//!
//! [`project`] is pure and cheap; callers re-run it on every container
//! size change. Malformed primitives are dropped one at a time and
//! geometry failures hide the overlay for that frame. Neither ever
//! reaches the recording flow.

use serde::Serialize;

use crate::color::color_for;
use crate::error::CoreError;
use crate::geometry::{cover_fit, Fit, NormalizedRect, PixelRect, NORMALIZED_EPSILON};
use crate::label::localize;
use crate::template::{ObjectBox, Overlay, Polygon, Scene};

/// Horizontal offset of a polygon caption from its first vertex.
pub const LABEL_OFFSET_X: f64 = 4.0;

/// Vertical offset of a polygon caption from its first vertex (above it).
pub const LABEL_OFFSET_Y: f64 = -20.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// A projected object box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBox {
    /// Position in the scene's `overlayObjects`; drives color and legend.
    pub index: usize,
    pub rect: PixelRect,
    pub color: String,
    pub label: String,
    pub confidence: f64,
}

/// A projected polygon with its caption anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPolygon {
    pub index: usize,
    pub points: Vec<PixelPoint>,
    pub color: String,
    pub label: String,
    pub label_anchor: PixelPoint,
}

/// Everything the renderer needs to draw the active scene's guidance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderSet {
    /// Highlighted cells of the fixed 3x3 grid; the renderer divides the
    /// container itself.
    Grid { cells: Vec<i32>, labels: Vec<String> },
    Objects { boxes: Vec<RenderedBox> },
    Polygons { polygons: Vec<RenderedPolygon> },
    /// Geometry could not be computed for this frame; draw nothing.
    Hidden,
}

/// Counters describing how much input was altered during projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverlayDiagnostics {
    /// Boxes that extended past the source frame and were cut back.
    pub clamped: usize,
    /// Primitives discarded as malformed.
    pub dropped: usize,
    /// Valid boxes that fall entirely in the cropped-away margin.
    pub offscreen: usize,
}

// ---------------------------------------------------------------------------
// Sanitizing
// ---------------------------------------------------------------------------

/// Cut an object box back into the unit square.
///
/// Returns the usable rect and whether it differs from the input. Boxes
/// with an empty label, a missing or non-finite field, or no remaining
/// area are malformed.
pub fn sanitize_box(object: &ObjectBox) -> Result<(NormalizedRect, bool), CoreError> {
    if object.label.trim().is_empty() {
        return Err(CoreError::MalformedOverlayData(
            "object box has an empty label".to_string(),
        ));
    }
    let (Some(x), Some(y), Some(w), Some(h)) = (object.x, object.y, object.width, object.height)
    else {
        return Err(CoreError::MalformedOverlayData(format!(
            "object box '{}' is missing a coordinate",
            object.label
        )));
    };
    if [x, y, w, h].iter().any(|v| !v.is_finite()) {
        return Err(CoreError::MalformedOverlayData(format!(
            "object box '{}' has a non-finite field",
            object.label
        )));
    }

    let left = x.clamp(0.0, 1.0);
    let top = y.clamp(0.0, 1.0);
    let width = (x + w).min(1.0) - left;
    let height = (y + h).min(1.0) - top;
    if width <= 0.0 || height <= 0.0 {
        return Err(CoreError::MalformedOverlayData(format!(
            "object box '{}' has no area after clamping",
            object.label
        )));
    }

    let rect = NormalizedRect::new(left, top, width, height);
    let changed = [(left, x), (top, y), (width, w), (height, h)]
        .iter()
        .any(|(a, b)| (a - b).abs() > NORMALIZED_EPSILON);
    Ok((rect, changed))
}

/// Resolve a polygon's vertices. Empty polygons and points with a missing
/// or non-finite coordinate are malformed.
fn polygon_vertices(polygon: &Polygon) -> Result<Vec<(f64, f64)>, CoreError> {
    if polygon.points.is_empty() {
        return Err(CoreError::MalformedOverlayData(format!(
            "polygon '{}' has no points",
            polygon.label
        )));
    }
    polygon
        .points
        .iter()
        .map(|p| match (p.x, p.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
            _ => Err(CoreError::MalformedOverlayData(format!(
                "polygon '{}' has a missing or non-finite point",
                polygon.label
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a scene's overlay into a `width x height` preview surface.
pub fn project(scene: &Scene, container_width: f64, container_height: f64) -> RenderSet {
    project_with_diagnostics(scene, container_width, container_height).0
}

/// Like [`project`], also reporting how much of the input was clamped or
/// dropped.
pub fn project_with_diagnostics(
    scene: &Scene,
    container_width: f64,
    container_height: f64,
) -> (RenderSet, OverlayDiagnostics) {
    let mut diagnostics = OverlayDiagnostics::default();

    let set = match &scene.overlay {
        Overlay::Grid => grid_set(scene),
        Overlay::Objects(objects) => match scene_fit(scene, container_width, container_height) {
            Ok(fit) => {
                let boxes = project_boxes(
                    scene,
                    objects,
                    &fit,
                    container_width,
                    container_height,
                    &mut diagnostics,
                );
                if boxes.is_empty() && diagnostics.offscreen == 0 {
                    grid_set(scene)
                } else {
                    RenderSet::Objects { boxes }
                }
            }
            Err(e) => hidden(scene, &e),
        },
        Overlay::Polygons(polygons) => match scene_fit(scene, container_width, container_height)
        {
            Ok(fit) => {
                let polygons = project_polygons(
                    scene,
                    polygons,
                    &fit,
                    container_width,
                    container_height,
                    &mut diagnostics,
                );
                if polygons.is_empty() {
                    grid_set(scene)
                } else {
                    RenderSet::Polygons { polygons }
                }
            }
            Err(e) => hidden(scene, &e),
        },
    };

    if diagnostics != OverlayDiagnostics::default() {
        tracing::debug!(
            scene_number = scene.scene_number(),
            clamped = diagnostics.clamped,
            dropped = diagnostics.dropped,
            offscreen = diagnostics.offscreen,
            "Overlay input adjusted during projection",
        );
    }

    (set, diagnostics)
}

fn grid_set(scene: &Scene) -> RenderSet {
    RenderSet::Grid {
        cells: scene.grid.cells.clone(),
        labels: scene.grid.labels.clone(),
    }
}

fn hidden(scene: &Scene, error: &CoreError) -> RenderSet {
    tracing::debug!(
        scene_number = scene.scene_number(),
        error = %error,
        "Skipping overlay render",
    );
    RenderSet::Hidden
}

fn scene_fit(scene: &Scene, container_width: f64, container_height: f64) -> Result<Fit, CoreError> {
    let aspect = scene.aspect()?;
    cover_fit(container_width, container_height, aspect.width, aspect.height)
}

fn project_boxes(
    scene: &Scene,
    objects: &[ObjectBox],
    fit: &Fit,
    container_width: f64,
    container_height: f64,
    diagnostics: &mut OverlayDiagnostics,
) -> Vec<RenderedBox> {
    let mut boxes = Vec::with_capacity(objects.len());

    for (index, object) in objects.iter().enumerate() {
        let rect = match sanitize_box(object) {
            Ok((rect, clamped)) => {
                if clamped {
                    diagnostics.clamped += 1;
                }
                rect
            }
            Err(e) => {
                tracing::debug!(scene_number = scene.scene_number(), index, error = %e, "Dropping object box");
                diagnostics.dropped += 1;
                continue;
            }
        };

        let (left, top) = fit.map_point(rect.x, rect.y);
        let pixel = PixelRect {
            left,
            top,
            width: rect.width * fit.drawn_width,
            height: rect.height * fit.drawn_height,
        }
        .clamp_to(container_width, container_height);

        if pixel.is_empty() {
            diagnostics.offscreen += 1;
            continue;
        }

        boxes.push(RenderedBox {
            index,
            rect: pixel,
            color: color_for(index, Some(&scene.legend)),
            label: localize(&object.label, object.label_localized.as_deref()),
            confidence: object.confidence,
        });
    }

    boxes
}

fn project_polygons(
    scene: &Scene,
    polygons: &[Polygon],
    fit: &Fit,
    container_width: f64,
    container_height: f64,
    diagnostics: &mut OverlayDiagnostics,
) -> Vec<RenderedPolygon> {
    let mut out = Vec::with_capacity(polygons.len());

    for (index, polygon) in polygons.iter().enumerate() {
        let vertices = match polygon_vertices(polygon) {
            Ok(vertices) => vertices,
            Err(e) => {
                tracing::debug!(scene_number = scene.scene_number(), index, error = %e, "Dropping polygon");
                diagnostics.dropped += 1;
                continue;
            }
        };

        let points: Vec<PixelPoint> = vertices
            .into_iter()
            .map(|(nx, ny)| {
                let (x, y) = fit.map_point(nx, ny);
                PixelPoint { x, y }
            })
            .collect();

        let first = points[0];
        let label_anchor = PixelPoint {
            x: (first.x + LABEL_OFFSET_X).clamp(0.0, container_width),
            y: (first.y + LABEL_OFFSET_Y).clamp(0.0, container_height),
        };

        out.push(RenderedPolygon {
            index,
            points,
            color: color_for(index, Some(&scene.legend)),
            label: localize(&polygon.label, polygon.label_localized.as_deref()),
            label_anchor,
        });
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
