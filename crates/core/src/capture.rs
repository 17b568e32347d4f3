//! Measurement capture state machine
//!
//! Turns pointer events into finished shapes awaiting a label.
//!
//! ```text
//! Idle --down (area/linear)--> Capturing --up--> PendingConfirmation
//! Idle --down (count)---------------------------> PendingConfirmation
//! PendingConfirmation --take/cancel--> Idle
//! any --tool switch / cancel / detach--> Idle
//! ```
//!
//! Failures never escape as errors: a trace that cannot produce a quantity is
//! dropped and the machine returns to `Idle`.

use crate::config::CaptureConfig;
use crate::geometry::{SurfacePoint, MIN_AREA_POINTS};
use crate::measurement::{MeasurementKind, Shape, TraceError};
use crate::scale::Scale;
use log::debug;

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Select and delete existing shapes
    #[default]
    Pointer,
    Area,
    Linear,
    Count,
}

impl Tool {
    /// Kind of measurement this tool captures, `None` for the pointer
    pub fn measurement_kind(self) -> Option<MeasurementKind> {
        match self {
            Tool::Pointer => None,
            Tool::Area => Some(MeasurementKind::Area),
            Tool::Linear => Some(MeasurementKind::Linear),
            Tool::Count => Some(MeasurementKind::Count),
        }
    }
}

/// The page currently shown under the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentContext {
    /// 0-based page index
    pub page_index: u32,
}

impl DocumentContext {
    pub fn new(page_index: u32) -> Self {
        Self { page_index }
    }
}

/// A finished shape waiting for the operator's label
#[derive(Debug, Clone, PartialEq)]
pub struct PendingShape {
    shape: Shape,
    value: f64,
    scale: Scale,
    page_index: u32,
}

impl PendingShape {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn kind(&self) -> MeasurementKind {
        self.shape.kind()
    }

    /// Quantity computed when the shape was closed
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Scale frozen at capture time
    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn into_shape(self) -> Shape {
        self.shape
    }
}

/// Capture state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    /// Nothing in progress; armed when the tool is not the pointer
    #[default]
    Idle,
    /// Points accumulating for an area or linear trace
    Capturing { points: Vec<SurfacePoint> },
    /// Shape closed, awaiting a label
    PendingConfirmation(PendingShape),
}

/// What an input event did, so the host knows whether to redraw
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Event had no effect
    Ignored,
    /// A new trace began
    Started,
    /// A point was appended to the trace
    Extended,
    /// A shape is now pending confirmation
    Pending,
    /// The trace could not produce a quantity and was dropped
    Discarded(TraceError),
}

/// Capture state machine
#[derive(Debug, Clone)]
pub struct CaptureMachine {
    tool: Tool,
    state: CaptureState,
    scale: Scale,
    document: Option<DocumentContext>,
    min_point_spacing: f64,
}

impl CaptureMachine {
    /// Create an idle machine with the pointer tool and no document
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            tool: Tool::Pointer,
            state: CaptureState::Idle,
            scale: config.default_scale,
            document: None,
            min_point_spacing: config.min_point_spacing.max(0.0),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Scale applied to the next captured shape
    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn document(&self) -> Option<DocumentContext> {
        self.document
    }

    /// Whether the next pointer-down starts a capture
    pub fn is_armed(&self) -> bool {
        self.tool != Tool::Pointer
            && self.document.is_some()
            && matches!(self.state, CaptureState::Idle)
    }

    /// Change the scale for subsequent captures
    ///
    /// A pending shape keeps the scale it was closed with.
    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    /// Switch tools, silently discarding any trace or pending shape
    ///
    /// Returns whether anything was discarded.
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        let previous = self.tool;
        self.tool = tool;
        let aborted = self.reset();
        if aborted {
            debug!(
                "event=capture_abort module=capture status=ok reason=tool_switch from={:?} to={:?}",
                previous, tool
            );
        }
        aborted
    }

    /// Show a page under the overlay; any capture on the previous page is dropped
    pub fn attach_document(&mut self, document: DocumentContext) {
        if self.document != Some(document) {
            self.reset();
        }
        self.document = Some(document);
    }

    /// Remove the page; capture tools become inert
    pub fn detach_document(&mut self) {
        self.document = None;
        self.reset();
    }

    /// Pointer pressed at `point`
    pub fn pointer_down(&mut self, point: SurfacePoint) -> CaptureOutcome {
        let Some(document) = self.document else {
            return CaptureOutcome::Ignored;
        };
        if !matches!(self.state, CaptureState::Idle) {
            return CaptureOutcome::Ignored;
        }

        match self.tool {
            Tool::Pointer => CaptureOutcome::Ignored,
            Tool::Area | Tool::Linear => {
                self.state = CaptureState::Capturing { points: vec![point] };
                CaptureOutcome::Started
            }
            Tool::Count => {
                let shape = Shape::Marker { at: point };
                self.finish(shape, document.page_index)
            }
        }
    }

    /// Pointer moved to `point`
    pub fn pointer_move(&mut self, point: SurfacePoint) -> CaptureOutcome {
        let spacing = self.min_point_spacing;
        match &mut self.state {
            CaptureState::Capturing { points } => {
                if push_spaced(points, point, spacing) {
                    CaptureOutcome::Extended
                } else {
                    CaptureOutcome::Ignored
                }
            }
            _ => CaptureOutcome::Ignored,
        }
    }

    /// Pointer released at `point`; closes an area or linear trace
    pub fn pointer_up(&mut self, point: SurfacePoint) -> CaptureOutcome {
        let Some(document) = self.document else {
            return CaptureOutcome::Ignored;
        };
        let CaptureState::Capturing { points } = &mut self.state else {
            return CaptureOutcome::Ignored;
        };

        push_spaced(points, point, self.min_point_spacing);
        let points = std::mem::take(points);
        self.state = CaptureState::Idle;

        let Some(kind) = self.tool.measurement_kind() else {
            return CaptureOutcome::Ignored;
        };
        match Shape::from_trace(kind, points) {
            Some(shape) => self.finish(shape, document.page_index),
            None => CaptureOutcome::Ignored,
        }
    }

    /// Discard any trace or pending shape
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.reset();
        if cancelled {
            debug!("event=capture_abort module=capture status=ok reason=cancel");
        }
        cancelled
    }

    /// The shape awaiting confirmation, if any
    pub fn pending(&self) -> Option<&PendingShape> {
        match &self.state {
            CaptureState::PendingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    /// Hand out the pending shape and return to `Idle`
    pub fn take_pending(&mut self) -> Option<PendingShape> {
        match std::mem::take(&mut self.state) {
            CaptureState::PendingConfirmation(pending) => Some(pending),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Shape to draw on top of the committed overlay
    pub fn preview(&self) -> Option<Shape> {
        match &self.state {
            CaptureState::Idle => None,
            CaptureState::Capturing { points } => {
                let points = points.clone();
                if self.tool == Tool::Area && points.len() >= MIN_AREA_POINTS {
                    Some(Shape::Polygon { points })
                } else {
                    Some(Shape::Polyline { points })
                }
            }
            CaptureState::PendingConfirmation(pending) => Some(pending.shape.clone()),
        }
    }

    fn finish(&mut self, shape: Shape, page_index: u32) -> CaptureOutcome {
        match shape.quantity(self.scale) {
            Ok(value) => {
                self.state = CaptureState::PendingConfirmation(PendingShape {
                    shape,
                    value,
                    scale: self.scale,
                    page_index,
                });
                CaptureOutcome::Pending
            }
            Err(err) => {
                debug!("event=capture_discard module=capture status=ok reason=\"{}\"", err);
                self.state = CaptureState::Idle;
                CaptureOutcome::Discarded(err)
            }
        }
    }

    fn reset(&mut self) -> bool {
        let was_active = !matches!(self.state, CaptureState::Idle);
        self.state = CaptureState::Idle;
        was_active
    }
}

/// Append `point` unless it sits within `spacing` of the last point
fn push_spaced(points: &mut Vec<SurfacePoint>, point: SurfacePoint, spacing: f64) -> bool {
    if let Some(last) = points.last() {
        let distance = last.distance_to(&point);
        if distance == 0.0 || distance < spacing {
            return false;
        }
    }
    points.push(point);
    true
}
