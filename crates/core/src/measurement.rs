//! Measurements and their traced geometry
//!
//! A measurement's value is derived from its geometry and the scale in force
//! when it was captured. Neither can change afterwards: to edit a measurement,
//! delete it and capture a new one.

use crate::geometry::{self, SurfacePoint, COUNT_UNIT, MIN_AREA_POINTS, MIN_LINEAR_POINTS};
use crate::scale::Scale;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for take-offs
pub type TakeoffId = uuid::Uuid;

/// Kind of quantity a measurement or take-off carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    /// Enclosed area of a traced polygon
    Area,
    /// Cumulative length of a traced polyline
    Linear,
    /// Discrete count markers
    Count,
}

impl MeasurementKind {
    /// Real-world unit for this kind
    pub fn unit(self) -> &'static str {
        match self {
            MeasurementKind::Area => "m²",
            MeasurementKind::Linear => "m",
            MeasurementKind::Count => "count",
        }
    }

    /// Fewest trace points that can produce a quantity
    pub fn min_points(self) -> usize {
        match self {
            MeasurementKind::Area => MIN_AREA_POINTS,
            MeasurementKind::Linear => MIN_LINEAR_POINTS,
            MeasurementKind::Count => 1,
        }
    }

    /// Lowercase name as used in records and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKind::Area => "area",
            MeasurementKind::Linear => "linear",
            MeasurementKind::Count => "count",
        }
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            MeasurementKind::Area => "Area",
            MeasurementKind::Linear => "Linear",
            MeasurementKind::Count => "Count",
        }
    }

    /// Format a quantity of this kind with its unit
    pub fn format_quantity(self, value: f64) -> String {
        match self {
            MeasurementKind::Count => format!("{:.0} {}", value, self.unit()),
            MeasurementKind::Area | MeasurementKind::Linear => {
                format!("{:.2} {}", value, self.unit())
            }
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MeasurementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(MeasurementKind::Area),
            "linear" => Ok(MeasurementKind::Linear),
            "count" => Ok(MeasurementKind::Count),
            other => Err(format!("unknown measurement kind `{other}`")),
        }
    }
}

/// Measurement id parse failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeasurementIdError {
    #[error("measurement id must look like `<takeoff>:<measurement>`, got `{0}`")]
    Malformed(String),

    #[error("invalid uuid in measurement id: {0}")]
    Uuid(#[from] uuid::Error),
}

/// Measurement identifier namespaced by its owning take-off
///
/// Rendered as `<takeoff-uuid>:<local-uuid>`. The prefix is what ties a
/// measurement to exactly one take-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MeasurementId {
    takeoff: TakeoffId,
    local: uuid::Uuid,
}

impl MeasurementId {
    /// Generate a fresh id inside a take-off's namespace
    pub fn new(takeoff: TakeoffId) -> Self {
        Self { takeoff, local: uuid::Uuid::new_v4() }
    }

    /// Owning take-off
    pub fn takeoff(&self) -> TakeoffId {
        self.takeoff
    }

    /// Id within the take-off
    pub fn local(&self) -> uuid::Uuid {
        self.local
    }
}

impl fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.takeoff, self.local)
    }
}

impl FromStr for MeasurementId {
    type Err = MeasurementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (takeoff, local) =
            s.split_once(':').ok_or_else(|| MeasurementIdError::Malformed(s.to_string()))?;
        Ok(Self { takeoff: takeoff.parse()?, local: local.parse()? })
    }
}

impl From<MeasurementId> for String {
    fn from(id: MeasurementId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MeasurementId {
    type Error = MeasurementIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Why a trace cannot become a measurement
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceError {
    #[error("{kind} trace needs at least {required} points, got {actual}")]
    TooFewPoints { kind: MeasurementKind, required: usize, actual: usize },

    #[error("{0} trace has no extent")]
    Degenerate(MeasurementKind),
}

/// Traced geometry, owned by value by its measurement
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    /// Closed ring for area measurements
    Polygon { points: Vec<SurfacePoint> },
    /// Open path for linear measurements
    Polyline { points: Vec<SurfacePoint> },
    /// Single marker for count measurements
    Marker { at: SurfacePoint },
}

impl Shape {
    /// Kind of measurement this geometry produces
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Shape::Polygon { .. } => MeasurementKind::Area,
            Shape::Polyline { .. } => MeasurementKind::Linear,
            Shape::Marker { .. } => MeasurementKind::Count,
        }
    }

    /// Build the geometry a trace of `kind` produces from `points`
    ///
    /// Count traces keep only the first point.
    pub fn from_trace(kind: MeasurementKind, mut points: Vec<SurfacePoint>) -> Option<Self> {
        match kind {
            MeasurementKind::Area => Some(Shape::Polygon { points }),
            MeasurementKind::Linear => Some(Shape::Polyline { points }),
            MeasurementKind::Count => {
                if points.is_empty() {
                    None
                } else {
                    Some(Shape::Marker { at: points.swap_remove(0) })
                }
            }
        }
    }

    /// Vertices of the geometry
    pub fn points(&self) -> &[SurfacePoint] {
        match self {
            Shape::Polygon { points } | Shape::Polyline { points } => points,
            Shape::Marker { at } => std::slice::from_ref(at),
        }
    }

    /// Check the trace can produce a quantity
    pub fn validate(&self) -> Result<(), TraceError> {
        let kind = self.kind();
        let actual = self.points().len();
        if actual < kind.min_points() {
            return Err(TraceError::TooFewPoints { kind, required: kind.min_points(), actual });
        }
        match self {
            Shape::Polygon { points } if geometry::is_degenerate_polygon(points) => {
                Err(TraceError::Degenerate(kind))
            }
            Shape::Polyline { points } if geometry::polyline_length_px(points) <= 0.0 => {
                Err(TraceError::Degenerate(kind))
            }
            _ => Ok(()),
        }
    }

    /// Real-world quantity of this geometry at `scale`, rounded to 2 decimals
    pub fn quantity(&self, scale: Scale) -> Result<f64, TraceError> {
        self.validate()?;
        Ok(match self {
            Shape::Polygon { points } => geometry::area_units(points, scale),
            Shape::Polyline { points } => geometry::length_units(points, scale),
            Shape::Marker { .. } => COUNT_UNIT,
        })
    }

    /// Bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        geometry::bounds(self.points())
    }

    /// Whether `point` hits this shape
    ///
    /// Polygons hit on their edges or interior, polylines on their segments,
    /// markers within `marker_radius + tolerance` of the marker.
    pub fn hit_test(&self, point: &SurfacePoint, tolerance: f64, marker_radius: f64) -> bool {
        match self {
            Shape::Polygon { points } => {
                let near_edge = (0..points.len()).any(|i| {
                    let next = (i + 1) % points.len();
                    geometry::point_near_segment(point, &points[i], &points[next], tolerance)
                });
                near_edge || geometry::point_in_polygon(point, points)
            }
            Shape::Polyline { points } => points
                .windows(2)
                .any(|w| geometry::point_near_segment(point, &w[0], &w[1], tolerance)),
            Shape::Marker { at } => point.distance_to(at) <= marker_radius + tolerance,
        }
    }

    /// Where the value caption should be drawn
    pub fn label_position(&self) -> SurfacePoint {
        let fallback = SurfacePoint::new(0.0, 0.0);
        match self {
            Shape::Polyline { points } => geometry::path_midpoint(points).unwrap_or(fallback),
            Shape::Polygon { points } => geometry::vertex_centroid(points).unwrap_or(fallback),
            Shape::Marker { at } => *at,
        }
    }
}

/// A captured quantity with its frozen geometry and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    id: MeasurementId,
    label: String,
    value: f64,
    geometry: Shape,
    scale: Scale,
    /// Document page the trace was drawn on (0-based)
    page_index: u32,
    /// Unix timestamp in seconds
    created_at: i64,
}

impl Measurement {
    /// Create a measurement owned by `takeoff`, computing its value now
    pub fn new(
        takeoff: TakeoffId,
        label: impl Into<String>,
        geometry: Shape,
        scale: Scale,
        page_index: u32,
    ) -> Result<Self, TraceError> {
        let value = geometry.quantity(scale)?;
        Ok(Self {
            id: MeasurementId::new(takeoff),
            label: label.into(),
            value,
            geometry,
            scale,
            page_index,
            created_at: unix_now(),
        })
    }

    /// Rebuild a measurement from persisted parts without recomputing
    pub(crate) fn restore(
        id: MeasurementId,
        label: String,
        value: f64,
        geometry: Shape,
        scale: Scale,
        page_index: u32,
        created_at: i64,
    ) -> Self {
        Self { id, label, value, geometry, scale, page_index, created_at }
    }

    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn takeoff_id(&self) -> TakeoffId {
        self.id.takeoff()
    }

    pub fn kind(&self) -> MeasurementKind {
        self.geometry.kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Quantity in real-world units, fixed at creation
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &'static str {
        self.kind().unit()
    }

    pub fn geometry(&self) -> &Shape {
        &self.geometry
    }

    /// Scale in force when this measurement was captured
    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Value with unit, e.g. `"12.50 m²"`
    pub fn formatted_value(&self) -> String {
        self.kind().format_quantity(self.value)
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
