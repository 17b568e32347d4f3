//! Take-off Core Library
//!
//! Measurement capture, conversion and aggregation for take-offs traced over
//! a rendered drawing.

pub mod capture;
pub mod config;
pub mod csv_export;
pub mod geometry;
pub mod ledger;
pub mod measurement;
pub mod overlay;
pub mod record;
pub mod scale;
pub mod session;
pub mod store;
pub mod sync;

pub use capture::{
    CaptureMachine, CaptureOutcome, CaptureState, DocumentContext, PendingShape, Tool,
};
pub use config::CaptureConfig;
pub use csv_export::{
    export_measurements_csv, export_measurements_to_string, export_takeoffs_csv,
    export_takeoffs_to_string, CsvExportConfig, CsvExportError, CsvExportResult,
};
pub use geometry::SurfacePoint;
pub use ledger::{LedgerError, Takeoff, TakeoffLedger, TakeoffStatus};
pub use measurement::{
    Measurement, MeasurementId, MeasurementIdError, MeasurementKind, Shape, TakeoffId, TraceError,
};
pub use overlay::{
    Color, OverlayShape, OverlaySurface, Primitive, RenderCommand, ShapeStyle, SurfaceExtents,
    ViewTransform,
};
pub use record::{MeasurementRecord, RecordError, TakeoffRecord};
pub use scale::{Scale, ScaleError};
pub use session::{SessionError, TakeoffSession};
pub use store::{MemoryStore, StoreError, TakeoffStore};
pub use sync::{PersistenceFailure, SyncJob, SyncOp, SyncTracker};
