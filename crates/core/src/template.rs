//! Template and scene data model.
//!
//! Scenes arrive from the backend as duck-typed JSON that carries fields
//! for every overlay kind at once. On deserialization they are converted
//! into [`Scene`], whose [`Overlay`] holds only the variant selected by
//! `overlayType`. The grid fields are always kept, since grid mode is the
//! fallback whenever the declared kind has no usable data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::geometry::AspectRatio;
use crate::types::SceneNumber;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const OVERLAY_GRID: &str = "grid";
pub const OVERLAY_OBJECTS: &str = "objects";
pub const OVERLAY_POLYGONS: &str = "polygons";

/// All valid `overlayType` values.
pub const VALID_OVERLAY_TYPES: &[&str] = &[OVERLAY_GRID, OVERLAY_OBJECTS, OVERLAY_POLYGONS];

// ---------------------------------------------------------------------------
// Overlay data
// ---------------------------------------------------------------------------

/// The declared overlay kind of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Grid,
    Objects,
    Polygons,
}

impl OverlayKind {
    /// Convert from the wire string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            OVERLAY_GRID => Ok(Self::Grid),
            OVERLAY_OBJECTS => Ok(Self::Objects),
            OVERLAY_POLYGONS => Ok(Self::Polygons),
            _ => Err(CoreError::Validation(format!(
                "Invalid overlay type '{s}'. Must be one of: {}",
                VALID_OVERLAY_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => OVERLAY_GRID,
            Self::Objects => OVERLAY_OBJECTS,
            Self::Polygons => OVERLAY_POLYGONS,
        }
    }
}

/// A detected-object box in normalized source space.
///
/// Coordinates that are missing or not numbers read as `None`; the
/// projector drops such boxes instead of failing the whole template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectBox {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub label_localized: Option<String>,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
}

/// A normalized point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
}

/// A free-form guidance polygon in normalized source space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub label_localized: Option<String>,
    #[serde(default, deserialize_with = "lenient_points")]
    pub points: Vec<Point>,
}

/// Server-declared color for the overlay at the same index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, alias = "color", deserialize_with = "lenient_opt_string")]
    pub color_hex: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

fn number_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Read a list whose entries may be individually malformed. A malformed
/// entry becomes `T::default()` so it keeps its index and is dropped later.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    })
}

fn lenient_points<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
    Ok(lenient_list(deserializer)?.unwrap_or_default())
}

/// Highlighted cells of the fixed 3x3 grid and their captions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridOverlay {
    pub cells: Vec<i32>,
    pub labels: Vec<String>,
}

/// The active overlay of a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Use [`Scene::grid`].
    Grid,
    Objects(Vec<ObjectBox>),
    Polygons(Vec<Polygon>),
}

impl Overlay {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Grid => OverlayKind::Grid,
            Self::Objects(_) => OverlayKind::Objects,
            Self::Polygons(_) => OverlayKind::Polygons,
        }
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// Wire shape of a scene as served by `GET /templates/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SceneRecord {
    scene_title: Option<String>,
    script_line: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    scene_duration_in_seconds: Option<f64>,
    person_position: Option<String>,
    source_aspect: Option<String>,
    overlay_type: Option<String>,
    background_instructions: Option<String>,
    specific_camera_instructions: Option<String>,
    movement_instructions: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    legend: Option<Vec<LegendEntry>>,
    screen_grid_overlay: Option<Vec<i32>>,
    screen_grid_overlay_labels: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_list")]
    overlay_objects: Option<Vec<ObjectBox>>,
    #[serde(deserialize_with = "lenient_list")]
    overlay_polygons: Option<Vec<Polygon>>,
}

/// One recording unit of a template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "SceneRecord")]
pub struct Scene {
    /// 0-based position in the template, assigned by [`Template`].
    pub index: usize,
    pub title: String,
    pub script_line: String,
    pub duration_secs: Option<f64>,
    pub person_position: Option<String>,
    pub source_aspect: Option<String>,
    pub background_instructions: String,
    pub camera_instructions: String,
    pub movement_instructions: String,
    pub legend: Vec<LegendEntry>,
    pub grid: GridOverlay,
    pub overlay: Overlay,
}

impl From<SceneRecord> for Scene {
    fn from(raw: SceneRecord) -> Self {
        let title = raw.scene_title.unwrap_or_default();
        let declared = raw
            .overlay_type
            .as_deref()
            .map(OverlayKind::from_str_value);

        let overlay = match declared {
            Some(Ok(OverlayKind::Objects)) => match raw.overlay_objects {
                Some(objects) if !objects.is_empty() => Overlay::Objects(objects),
                _ => {
                    tracing::debug!(scene = %title, "No overlay objects, using grid");
                    Overlay::Grid
                }
            },
            Some(Ok(OverlayKind::Polygons)) => match raw.overlay_polygons {
                Some(polygons) if polygons.iter().any(|p| !p.points.is_empty()) => {
                    Overlay::Polygons(polygons)
                }
                _ => {
                    tracing::debug!(scene = %title, "No overlay polygons, using grid");
                    Overlay::Grid
                }
            },
            Some(Ok(OverlayKind::Grid)) | None => Overlay::Grid,
            Some(Err(e)) => {
                tracing::warn!(scene = %title, error = %e, "Unknown overlay type, using grid");
                Overlay::Grid
            }
        };

        Self {
            index: 0,
            title,
            script_line: raw.script_line.unwrap_or_default(),
            duration_secs: raw.scene_duration_in_seconds,
            person_position: raw.person_position,
            source_aspect: raw.source_aspect,
            background_instructions: raw.background_instructions.unwrap_or_default(),
            camera_instructions: raw.specific_camera_instructions.unwrap_or_default(),
            movement_instructions: raw.movement_instructions.unwrap_or_default(),
            legend: raw.legend.unwrap_or_default(),
            grid: GridOverlay {
                cells: raw.screen_grid_overlay.unwrap_or_default(),
                labels: raw.screen_grid_overlay_labels.unwrap_or_default(),
            },
            overlay,
        }
    }
}

impl Scene {
    /// 1-based number used by the submission endpoints.
    pub fn scene_number(&self) -> SceneNumber {
        self.index as SceneNumber + 1
    }

    /// Recording limit in whole seconds, rounding partial seconds up.
    ///
    /// Falls back to `default_secs` when the scene declares no positive
    /// duration.
    pub fn duration_limit_secs(&self, default_secs: u32) -> u32 {
        match self.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => d.ceil().min(u32::MAX as f64) as u32,
            _ => default_secs,
        }
    }

    /// Parsed source aspect. Absent means portrait 9:16.
    pub fn aspect(&self) -> Result<AspectRatio, CoreError> {
        match self.source_aspect.as_deref() {
            Some(s) if !s.trim().is_empty() => AspectRatio::parse(s),
            _ => Ok(AspectRatio::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct TemplateRecord {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    scenes: Option<Vec<Scene>>,
}

/// A server-authored recording template. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TemplateRecord")]
pub struct Template {
    pub id: String,
    pub title: Option<String>,
    pub scenes: Vec<Scene>,
}

impl From<TemplateRecord> for Template {
    fn from(raw: TemplateRecord) -> Self {
        let mut scenes = raw.scenes.unwrap_or_default();
        for (index, scene) in scenes.iter_mut().enumerate() {
            scene.index = index;
        }
        Self {
            id: raw.id,
            title: raw.title,
            scenes,
        }
    }
}

impl Template {
    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn scene_by_number(&self, scene_number: SceneNumber) -> Option<&Scene> {
        (scene_number as usize)
            .checked_sub(1)
            .and_then(|i| self.scenes.get(i))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
