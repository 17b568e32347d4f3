//! Drawing overlay surface
//!
//! A retained display list of committed measurement shapes, stored in the
//! surface's own coordinate space. The host's pan and zoom only change the
//! `ViewTransform` used when rendering; stored coordinates never move.
//!
//! The overlay mirrors the ledger and is never the source of truth. Shapes are
//! removed only through the session, which deletes the owning measurement in
//! the same step.

use crate::geometry::SurfacePoint;
use crate::measurement::{Measurement, MeasurementId, MeasurementKind, Shape, TakeoffId};
use crate::scale::Scale;

/// RGBA color, components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Same color at a different opacity
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// Stroke and fill for a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    pub stroke: Color,
    pub fill: Option<Color>,
    pub stroke_width: f32,
    /// Dash pattern on/off lengths; `None` for solid
    pub dash: Option<[f32; 2]>,
}

impl ShapeStyle {
    /// Default look for committed shapes of `kind`
    pub fn for_kind(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::Area => {
                let blue = Color::rgb(0.16, 0.45, 0.85);
                Self {
                    stroke: blue,
                    fill: Some(blue.with_alpha(0.2)),
                    stroke_width: 2.0,
                    dash: None,
                }
            }
            MeasurementKind::Linear => Self {
                stroke: Color::rgb(0.90, 0.35, 0.10),
                fill: None,
                stroke_width: 2.5,
                dash: None,
            },
            MeasurementKind::Count => {
                let green = Color::rgb(0.10, 0.65, 0.30);
                Self { stroke: green, fill: Some(green), stroke_width: 1.5, dash: None }
            }
        }
    }

    /// Look for the trace in progress
    pub fn preview() -> Self {
        let red = Color::rgb(0.85, 0.10, 0.10);
        Self {
            stroke: red,
            fill: Some(red.with_alpha(0.1)),
            stroke_width: 1.5,
            dash: Some([6.0, 4.0]),
        }
    }

    /// Emphasized variant for the selected shape
    pub fn selected(self) -> Self {
        Self { stroke: Color::rgb(1.0, 0.80, 0.0), stroke_width: self.stroke_width + 1.5, ..self }
    }
}

/// Mapping between surface coordinates and the host's screen coordinates
///
/// `screen = surface * zoom + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub offset: [f64; 2],
    pub zoom: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform { offset: [0.0, 0.0], zoom: 1.0 };

    /// Create a transform; non-positive zoom falls back to 1.0
    pub fn new(offset_x: f64, offset_y: f64, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        Self { offset: [offset_x, offset_y], zoom }
    }

    pub fn to_screen(&self, point: SurfacePoint) -> [f64; 2] {
        [point.x * self.zoom + self.offset[0], point.y * self.zoom + self.offset[1]]
    }

    pub fn to_surface(&self, screen: [f64; 2]) -> SurfacePoint {
        SurfacePoint::new(
            (screen[0] - self.offset[0]) / self.zoom,
            (screen[1] - self.offset[1]) / self.zoom,
        )
    }
}

/// Screen-space drawing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Closed shape with optional fill
    Polygon { points: Vec<[f64; 2]>, style: ShapeStyle },
    /// Open path
    Polyline { points: Vec<[f64; 2]>, style: ShapeStyle },
    /// Filled circle marker
    Marker { center: [f64; 2], radius: f64, style: ShapeStyle },
    /// Text caption
    Label { position: [f64; 2], text: String },
}

/// A primitive tagged with the measurement it draws, `None` for the preview
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCommand {
    pub owner: Option<MeasurementId>,
    pub primitive: Primitive,
}

/// A committed shape on the overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayShape {
    id: MeasurementId,
    shape: Shape,
    caption: String,
    style: ShapeStyle,
}

impl OverlayShape {
    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Label and value shown next to the shape
    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }
}

/// Surface size in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceExtents {
    pub width: f64,
    pub height: f64,
}

/// Display list of committed shapes plus selection state
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    /// Commit order; later shapes draw on top
    shapes: Vec<OverlayShape>,
    extents: SurfaceExtents,
    interactive: bool,
    selected: Option<MeasurementId>,
    hit_tolerance: f64,
    marker_radius: f64,
    dirty: bool,
}

impl OverlaySurface {
    /// Create an empty, interactive surface
    pub fn new(width: f64, height: f64, hit_tolerance: f64, marker_radius: f64) -> Self {
        Self {
            shapes: Vec::new(),
            extents: SurfaceExtents { width: width.max(0.0), height: height.max(0.0) },
            interactive: true,
            selected: None,
            hit_tolerance: hit_tolerance.max(0.0),
            marker_radius: marker_radius.max(0.0),
            dirty: true,
        }
    }

    pub fn extents(&self) -> SurfaceExtents {
        self.extents
    }

    /// Host container resized; shapes keep their surface coordinates
    pub fn resize(&mut self, width: f64, height: f64) {
        let extents = SurfaceExtents { width: width.max(0.0), height: height.max(0.0) };
        if extents != self.extents {
            self.extents = extents;
            self.dirty = true;
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Make shapes selectable, or inert so tracing is not interrupted
    pub fn set_interactive(&mut self, interactive: bool) {
        if self.interactive != interactive {
            self.interactive = interactive;
            if !interactive && self.selected.take().is_some() {
                self.dirty = true;
            }
        }
    }

    /// Add the shape of a newly attached measurement
    pub(crate) fn commit(&mut self, measurement: &Measurement) {
        let shape = OverlayShape {
            id: measurement.id(),
            shape: measurement.geometry().clone(),
            caption: caption_for(measurement),
            style: ShapeStyle::for_kind(measurement.kind()),
        };
        match self.shapes.iter_mut().find(|s| s.id == shape.id) {
            Some(existing) => *existing = shape,
            None => self.shapes.push(shape),
        }
        self.dirty = true;
    }

    /// Remove one shape
    pub(crate) fn remove(&mut self, id: MeasurementId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| s.id != id);
        let removed = self.shapes.len() != before;
        if removed {
            if self.selected == Some(id) {
                self.selected = None;
            }
            self.dirty = true;
        }
        removed
    }

    /// Remove every shape in a take-off's namespace
    pub(crate) fn remove_takeoff(&mut self, takeoff: TakeoffId) -> usize {
        let before = self.shapes.len();
        self.shapes.retain(|s| s.id.takeoff() != takeoff);
        let removed = before - self.shapes.len();
        if removed > 0 {
            if self.selected.is_some_and(|id| id.takeoff() == takeoff) {
                self.selected = None;
            }
            self.dirty = true;
        }
        removed
    }

    /// Drop every shape
    pub(crate) fn clear(&mut self) {
        self.shapes.clear();
        self.selected = None;
        self.dirty = true;
    }

    pub fn shapes(&self) -> &[OverlayShape] {
        &self.shapes
    }

    pub fn get(&self, id: MeasurementId) -> Option<&OverlayShape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: MeasurementId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Topmost shape under `point`; always `None` while inert
    pub fn hit_test(&self, point: &SurfacePoint) -> Option<MeasurementId> {
        if !self.interactive {
            return None;
        }
        self.shapes
            .iter()
            .rev()
            .find(|s| s.shape.hit_test(point, self.hit_tolerance, self.marker_radius))
            .map(|s| s.id)
    }

    /// Select the shape under `point`, clearing the selection on a miss
    pub fn select_at(&mut self, point: &SurfacePoint) -> Option<MeasurementId> {
        if !self.interactive {
            return None;
        }
        let hit = self.hit_test(point);
        if hit != self.selected {
            self.selected = hit;
            self.dirty = true;
        }
        hit
    }

    pub fn selected(&self) -> Option<MeasurementId> {
        self.selected
    }

    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.dirty = true;
        }
    }

    /// Whether anything changed since the host last drew
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Screen-space draw list: committed shapes in order, then the preview
    pub fn render(&self, preview: Option<&Shape>, view: &ViewTransform) -> Vec<RenderCommand> {
        let mut commands = Vec::with_capacity(self.shapes.len() * 2 + 1);

        for shape in &self.shapes {
            let style = if self.selected == Some(shape.id) {
                shape.style.selected()
            } else {
                shape.style
            };
            let owner = Some(shape.id);
            commands.push(RenderCommand {
                owner,
                primitive: self.primitive_for(&shape.shape, style, view),
            });
            commands.push(RenderCommand {
                owner,
                primitive: Primitive::Label {
                    position: view.to_screen(shape.shape.label_position()),
                    text: shape.caption.clone(),
                },
            });
        }

        if let Some(preview) = preview {
            commands.push(RenderCommand {
                owner: None,
                primitive: self.primitive_for(preview, ShapeStyle::preview(), view),
            });
        }

        commands
    }

    fn primitive_for(&self, shape: &Shape, style: ShapeStyle, view: &ViewTransform) -> Primitive {
        let project = |points: &[SurfacePoint]| -> Vec<[f64; 2]> {
            points.iter().map(|p| view.to_screen(*p)).collect()
        };
        match shape {
            Shape::Polygon { points } => Primitive::Polygon { points: project(points), style },
            Shape::Polyline { points } => Primitive::Polyline { points: project(points), style },
            Shape::Marker { at } => Primitive::Marker {
                center: view.to_screen(*at),
                radius: self.marker_radius * view.zoom,
                style,
            },
        }
    }
}

fn caption_for(measurement: &Measurement) -> String {
    format!("{}: {}", measurement.label(), measurement.formatted_value())
}

/// Pixel length of `units` real-world units, for drawing scale bars
pub fn scale_bar_length(scale: Scale, units: f64, view: &ViewTransform) -> f64 {
    scale.to_pixels(units) * view.zoom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::TakeoffId;

    fn p(x: f64, y: f64) -> SurfacePoint {
        SurfacePoint::new(x, y)
    }

    fn square_measurement(takeoff: TakeoffId, origin: f64) -> Measurement {
        let geometry = Shape::Polygon {
            points: vec![
                p(origin, origin),
                p(origin + 100.0, origin),
                p(origin + 100.0, origin + 100.0),
                p(origin, origin + 100.0),
            ],
        };
        Measurement::new(takeoff, "Room", geometry, Scale::new(100.0).expect("valid scale"), 0)
            .expect("valid trace")
    }

    fn surface() -> OverlaySurface {
        OverlaySurface::new(800.0, 600.0, 3.0, 6.0)
    }

    #[test]
    fn resize_keeps_shape_coordinates() {
        let mut overlay = surface();
        let measurement = square_measurement(TakeoffId::new_v4(), 10.0);
        overlay.commit(&measurement);
        overlay.clear_dirty();

        overlay.resize(400.0, 300.0);
        assert_eq!(overlay.extents(), SurfaceExtents { width: 400.0, height: 300.0 });
        assert!(overlay.is_dirty());
        assert_eq!(overlay.get(measurement.id()).expect("shape").shape(), measurement.geometry());

        overlay.resize(-5.0, 10.0);
        assert_eq!(overlay.extents().width, 0.0);
    }

    #[test]
    fn inert_surface_ignores_selection() {
        let mut overlay = surface();
        let measurement = square_measurement(TakeoffId::new_v4(), 0.0);
        overlay.commit(&measurement);

        assert_eq!(overlay.select_at(&p(50.0, 50.0)), Some(measurement.id()));
        overlay.set_interactive(false);
        assert_eq!(overlay.selected(), None);
        assert_eq!(overlay.hit_test(&p(50.0, 50.0)), None);
        assert_eq!(overlay.select_at(&p(50.0, 50.0)), None);
    }

    #[test]
    fn hit_test_prefers_topmost_shape() {
        let mut overlay = surface();
        let takeoff = TakeoffId::new_v4();
        let lower = square_measurement(takeoff, 0.0);
        let upper = square_measurement(takeoff, 50.0);
        overlay.commit(&lower);
        overlay.commit(&upper);

        assert_eq!(overlay.hit_test(&p(75.0, 75.0)), Some(upper.id()));
        assert_eq!(overlay.hit_test(&p(10.0, 10.0)), Some(lower.id()));
        assert_eq!(overlay.hit_test(&p(400.0, 400.0)), None);
    }

    #[test]
    fn remove_takeoff_drops_only_its_shapes() {
        let mut overlay = surface();
        let first = TakeoffId::new_v4();
        let second = TakeoffId::new_v4();
        overlay.commit(&square_measurement(first, 0.0));
        overlay.commit(&square_measurement(first, 200.0));
        let kept = square_measurement(second, 400.0);
        overlay.commit(&kept);

        assert_eq!(overlay.remove_takeoff(first), 2);
        assert_eq!(overlay.len(), 1);
        assert!(overlay.contains(kept.id()));
        assert!(overlay.remove(kept.id()));
        assert!(!overlay.remove(kept.id()));
        assert!(overlay.is_empty());
    }

    #[test]
    fn render_projects_through_view_transform() {
        let mut overlay = surface();
        let measurement = square_measurement(TakeoffId::new_v4(), 0.0);
        overlay.commit(&measurement);

        let view = ViewTransform::new(10.0, 20.0, 2.0);
        let preview = Shape::Polyline { points: vec![p(0.0, 0.0), p(5.0, 5.0)] };
        let commands = overlay.render(Some(&preview), &view);

        assert_eq!(commands.len(), 3);
        let Primitive::Polygon { points, .. } = &commands[0].primitive else {
            panic!("expected polygon");
        };
        assert_eq!(points[2], [210.0, 220.0]);
        let Primitive::Label { text, position } = &commands[1].primitive else {
            panic!("expected label");
        };
        assert_eq!(text, "Room: 1.00 m²");
        assert_eq!(*position, [110.0, 120.0]);
        assert_eq!(commands[2].owner, None);

        let round_trip = view.to_surface(view.to_screen(p(12.5, 7.0)));
        assert_eq!(round_trip, p(12.5, 7.0));
    }

    #[test]
    fn selected_shape_renders_emphasized() {
        let mut overlay = surface();
        let measurement = square_measurement(TakeoffId::new_v4(), 0.0);
        overlay.commit(&measurement);
        overlay.select_at(&p(50.0, 50.0));

        let commands = overlay.render(None, &ViewTransform::IDENTITY);
        let Primitive::Polygon { style, .. } = &commands[0].primitive else {
            panic!("expected polygon");
        };
        assert_eq!(*style, ShapeStyle::for_kind(MeasurementKind::Area).selected());
    }

    #[test]
    fn scale_bar_follows_zoom() {
        let scale = Scale::new(50.0).expect("valid scale");
        assert_eq!(scale_bar_length(scale, 2.0, &ViewTransform::new(0.0, 0.0, 1.5)), 150.0);
        assert_eq!(ViewTransform::new(0.0, 0.0, -1.0).zoom, 1.0);
    }
}
