//! Take-off session controller
//!
//! Owns the capture machine, the overlay, the ledger and the sync tracker,
//! and routes operator input between them. Every mutation of the ledger goes
//! through here so the overlay can never drift from it: a shape is committed
//! only after its measurement is attached, and removed in the same call that
//! detaches the measurement.

use crate::capture::{CaptureMachine, CaptureOutcome, DocumentContext, PendingShape, Tool};
use crate::config::CaptureConfig;
use crate::geometry::SurfacePoint;
use crate::ledger::{LedgerError, Takeoff, TakeoffLedger};
use crate::measurement::{Measurement, MeasurementId, MeasurementKind, TakeoffId, TraceError};
use crate::overlay::{OverlaySurface, RenderCommand, ViewTransform};
use crate::record::RecordError;
use crate::scale::{Scale, ScaleError};
use crate::store::{StoreError, TakeoffStore};
use crate::sync::{PersistenceFailure, SyncJob, SyncTracker};
use log::{debug, info};
use std::collections::BTreeMap;

/// Session operation failures
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no shape is awaiting confirmation")]
    NothingPending,

    #[error("measurement label must not be empty")]
    EmptyLabel,

    #[error("select a take-off before saving a measurement")]
    NoActiveTakeoff,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("failed to load take-offs: {0}")]
    Store(#[from] StoreError),

    #[error("failed to load take-offs: {0}")]
    Record(#[from] RecordError),
}

/// Interactive take-off session for one drawing set
#[derive(Debug)]
pub struct TakeoffSession {
    capture: CaptureMachine,
    overlay: OverlaySurface,
    ledger: TakeoffLedger,
    sync: SyncTracker,
    active: Option<TakeoffId>,
    scale: Scale,
    page_scales: BTreeMap<u32, Scale>,
}

impl TakeoffSession {
    /// Create a session with an empty ledger and no document
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            capture: CaptureMachine::new(config),
            overlay: OverlaySurface::new(
                config.surface_width,
                config.surface_height,
                config.hit_tolerance,
                config.marker_radius,
            ),
            ledger: TakeoffLedger::new(),
            sync: SyncTracker::new(),
            active: None,
            scale: config.default_scale,
            page_scales: BTreeMap::new(),
        }
    }

    pub fn ledger(&self) -> &TakeoffLedger {
        &self.ledger
    }

    pub fn overlay(&self) -> &OverlaySurface {
        &self.overlay
    }

    /// Host-side access for selection and dirty tracking
    pub fn overlay_mut(&mut self) -> &mut OverlaySurface {
        &mut self.overlay
    }

    pub fn capture(&self) -> &CaptureMachine {
        &self.capture
    }

    pub fn pending(&self) -> Option<&PendingShape> {
        self.capture.pending()
    }

    // Take-offs

    /// Create a take-off and make it the active one
    pub fn create_takeoff(
        &mut self,
        name: &str,
        kind: MeasurementKind,
    ) -> Result<TakeoffId, SessionError> {
        let id = self.ledger.create_takeoff(name, kind)?.id();
        self.active = Some(id);
        self.sync.mark_changed(id);
        Ok(id)
    }

    pub fn rename_takeoff(&mut self, id: TakeoffId, name: &str) -> Result<(), SessionError> {
        self.ledger.rename_takeoff(id, name)?;
        self.sync.mark_changed(id);
        Ok(())
    }

    /// Choose the take-off that confirmed measurements attach to
    pub fn select_takeoff(&mut self, id: TakeoffId) -> Result<(), SessionError> {
        if self.ledger.get(id).is_none() {
            return Err(LedgerError::TakeoffNotFound(id).into());
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn active_takeoff(&self) -> Option<&Takeoff> {
        self.ledger.get(self.active?)
    }

    /// Delete a take-off, its measurements and their shapes
    pub fn delete_takeoff(&mut self, id: TakeoffId) -> Result<Takeoff, SessionError> {
        let removed = self.ledger.delete_takeoff(id)?;
        let shapes = self.overlay.remove_takeoff(id);
        if self.active == Some(id) {
            self.active = None;
        }
        self.sync.mark_deleted(id);
        debug!(
            "event=takeoff_delete module=session status=ok takeoff={} shapes={}",
            id, shapes
        );
        Ok(removed)
    }

    // Tools and scale

    /// Switch tools; any trace or pending shape is discarded
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        let aborted = self.capture.select_tool(tool);
        self.overlay.set_interactive(tool == Tool::Pointer);
        aborted
    }

    pub fn tool(&self) -> Tool {
        self.capture.tool()
    }

    /// Set the global scale from operator text
    ///
    /// Invalid input leaves the current scale in place. Measurements already
    /// taken, and a shape awaiting confirmation, keep their own scale.
    pub fn set_scale(&mut self, input: &str) -> Result<Scale, ScaleError> {
        let scale = Scale::parse(input)?;
        self.scale = scale;
        self.apply_capture_scale();
        info!("event=scale_set module=session status=ok scale={}", scale.pixels_per_unit());
        Ok(scale)
    }

    /// Override the scale for one page
    pub fn set_page_scale(&mut self, page_index: u32, input: &str) -> Result<Scale, ScaleError> {
        let scale = Scale::parse(input)?;
        self.page_scales.insert(page_index, scale);
        self.apply_capture_scale();
        info!(
            "event=scale_set module=session status=ok page={} scale={}",
            page_index,
            scale.pixels_per_unit()
        );
        Ok(scale)
    }

    /// Drop a page override; returns whether one existed
    pub fn clear_page_scale(&mut self, page_index: u32) -> bool {
        let cleared = self.page_scales.remove(&page_index).is_some();
        self.apply_capture_scale();
        cleared
    }

    /// Global scale
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Scale used for captures on `page_index`
    pub fn effective_scale(&self, page_index: u32) -> Scale {
        self.page_scales.get(&page_index).copied().unwrap_or(self.scale)
    }

    fn apply_capture_scale(&mut self) {
        let scale = match self.capture.document() {
            Some(document) => self.effective_scale(document.page_index),
            None => self.scale,
        };
        self.capture.set_scale(scale);
    }

    // Document and surface

    /// Show a page; the overlay switches to that page's measurements
    pub fn open_page(&mut self, document: DocumentContext) {
        let changed = self.capture.document() != Some(document);
        self.capture.attach_document(document);
        self.apply_capture_scale();
        if changed {
            self.rebuild_overlay();
        }
    }

    /// Navigate away; any capture is aborted and the overlay empties
    pub fn close_document(&mut self) {
        self.capture.detach_document();
        self.apply_capture_scale();
        self.overlay.clear();
    }

    pub fn resize_surface(&mut self, width: f64, height: f64) {
        self.overlay.resize(width, height);
    }

    // Pointer input

    pub fn pointer_down(&mut self, point: SurfacePoint) -> CaptureOutcome {
        self.capture.pointer_down(point)
    }

    pub fn pointer_move(&mut self, point: SurfacePoint) -> CaptureOutcome {
        self.capture.pointer_move(point)
    }

    pub fn pointer_up(&mut self, point: SurfacePoint) -> CaptureOutcome {
        self.capture.pointer_up(point)
    }

    /// Discard the trace or pending shape with no other effect
    pub fn cancel_pending(&mut self) -> bool {
        self.capture.cancel()
    }

    /// Label the pending shape and attach it to the active take-off
    ///
    /// On error the pending shape is kept so the operator can retry.
    pub fn confirm_pending(&mut self, label: &str) -> Result<MeasurementId, SessionError> {
        let pending = self.capture.pending().ok_or(SessionError::NothingPending)?;
        let label = label.trim();
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        let takeoff = self.active.ok_or(SessionError::NoActiveTakeoff)?;

        let measurement = Measurement::new(
            takeoff,
            label,
            pending.shape().clone(),
            pending.scale(),
            pending.page_index(),
        )?;
        let id = measurement.id();
        self.ledger.attach_measurement(takeoff, measurement)?;
        self.capture.take_pending();

        if let Some(measurement) = self.ledger.find_measurement(id) {
            self.overlay.commit(measurement);
        }
        self.sync.mark_changed(takeoff);
        Ok(id)
    }

    // Selection and deletion

    /// Select the shape under `point`; only with the pointer tool
    pub fn select_at(&mut self, point: SurfacePoint) -> Option<MeasurementId> {
        self.overlay.select_at(&point)
    }

    /// Delete the selected measurement, if any
    pub fn delete_selected(&mut self) -> Result<Option<MeasurementId>, SessionError> {
        let Some(id) = self.overlay.selected() else {
            return Ok(None);
        };
        self.delete_measurement(id)?;
        Ok(Some(id))
    }

    /// Delete a measurement and its shape
    pub fn delete_measurement(&mut self, id: MeasurementId) -> Result<Measurement, SessionError> {
        let removed = self.ledger.delete_measurement(id)?;
        self.overlay.remove(id);
        self.sync.mark_changed(id.takeoff());
        Ok(removed)
    }

    // Rendering

    /// Draw list for the committed shapes and any in-progress trace
    pub fn render(&self, view: &ViewTransform) -> Vec<RenderCommand> {
        let preview = self.capture.preview();
        self.overlay.render(preview.as_ref(), view)
    }

    fn rebuild_overlay(&mut self) {
        self.overlay.clear();
        let Some(document) = self.capture.document() else {
            return;
        };
        for measurement in self.ledger.measurements() {
            if measurement.page_index() == document.page_index {
                self.overlay.commit(measurement);
            }
        }
    }

    // Persistence

    /// Snapshot jobs for every take-off changed since its last save
    pub fn pending_sync(&self) -> Vec<SyncJob> {
        self.sync.jobs(&self.ledger)
    }

    /// Acknowledge a job run by the host
    pub fn complete_sync(
        &mut self,
        job: &SyncJob,
        result: Result<(), StoreError>,
    ) -> Option<PersistenceFailure> {
        self.sync.complete(job, result)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.sync.is_clean()
    }

    /// Run all pending jobs against `store` now
    pub fn flush(&mut self, store: &mut dyn TakeoffStore) -> Vec<PersistenceFailure> {
        self.sync.flush(&self.ledger, store)
    }

    /// Restore every stored take-off, replacing in-memory ones with the same id
    ///
    /// Nothing is applied unless every record is valid.
    pub fn load(&mut self, store: &dyn TakeoffStore) -> Result<usize, SessionError> {
        let takeoffs = store
            .load_all()?
            .into_iter()
            .map(Takeoff::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let count = takeoffs.len();
        for takeoff in takeoffs {
            // Memory now matches storage for this id
            self.sync.forget(takeoff.id());
            self.ledger.restore(takeoff);
        }
        self.rebuild_overlay();
        info!("event=takeoff_load module=session status=ok takeoffs={}", count);
        Ok(count)
    }
}
