//! Take-off aggregation ledger
//!
//! Named groups of measurements of a single kind. The ledger is the source
//! of truth for what has been measured; the overlay only mirrors it.
//!
//! A take-off's quantity is never stored. It is computed from the attached
//! measurements on every read, so it always equals their sum.

use crate::geometry::round2;
use crate::measurement::{Measurement, MeasurementId, MeasurementKind, TakeoffId};
use log::info;

/// Completion state of a take-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakeoffStatus {
    /// No measurements attached yet
    Pending,
    /// At least one measurement attached
    Complete,
}

/// Ledger operation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("take-off {0} not found")]
    TakeoffNotFound(TakeoffId),

    #[error("measurement {0} not found")]
    MeasurementNotFound(MeasurementId),

    #[error("take-off name must not be empty")]
    EmptyName,

    #[error("cannot attach a {measurement} measurement to a {takeoff} take-off")]
    KindMismatch { takeoff: MeasurementKind, measurement: MeasurementKind },

    #[error("measurement {measurement} belongs to take-off {owner}, not {target}")]
    ForeignMeasurement { measurement: MeasurementId, owner: TakeoffId, target: TakeoffId },

    #[error("measurement {0} is already attached")]
    DuplicateMeasurement(MeasurementId),
}

/// Named aggregation of measurements sharing a kind
#[derive(Debug, Clone, PartialEq)]
pub struct Takeoff {
    id: TakeoffId,
    name: String,
    kind: MeasurementKind,
    measurements: Vec<Measurement>,
}

impl Takeoff {
    fn new(name: String, kind: MeasurementKind) -> Self {
        Self { id: TakeoffId::new_v4(), name, kind, measurements: Vec::new() }
    }

    /// Rebuild a take-off from persisted parts
    ///
    /// Callers are responsible for checking the measurements belong here.
    pub(crate) fn restore(
        id: TakeoffId,
        name: String,
        kind: MeasurementKind,
        measurements: Vec<Measurement>,
    ) -> Self {
        Self { id, name, kind, measurements }
    }

    pub fn id(&self) -> TakeoffId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn unit(&self) -> &'static str {
        self.kind.unit()
    }

    /// Complete once anything is attached, pending while empty
    pub fn status(&self) -> TakeoffStatus {
        if self.measurements.is_empty() {
            TakeoffStatus::Pending
        } else {
            TakeoffStatus::Complete
        }
    }

    /// Sum of the attached measurements' values, rounded to 2 decimals
    pub fn quantity(&self) -> f64 {
        round2(self.measurements.iter().map(Measurement::value).sum())
    }

    /// Quantity with unit, e.g. `"4 count"`
    pub fn formatted_quantity(&self) -> String {
        self.kind.format_quantity(self.quantity())
    }

    /// Attached measurements in attachment order
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn measurement(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id() == id)
    }

    fn check_attachable(&self, measurement: &Measurement) -> Result<(), LedgerError> {
        if measurement.kind() != self.kind {
            return Err(LedgerError::KindMismatch {
                takeoff: self.kind,
                measurement: measurement.kind(),
            });
        }
        if measurement.takeoff_id() != self.id {
            return Err(LedgerError::ForeignMeasurement {
                measurement: measurement.id(),
                owner: measurement.takeoff_id(),
                target: self.id,
            });
        }
        if self.measurement(measurement.id()).is_some() {
            return Err(LedgerError::DuplicateMeasurement(measurement.id()));
        }
        Ok(())
    }
}

/// All take-offs for a drawing set, in creation order
#[derive(Debug, Default, Clone)]
pub struct TakeoffLedger {
    takeoffs: Vec<Takeoff>,
}

impl TakeoffLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty, pending take-off
    pub fn create_takeoff(
        &mut self,
        name: &str,
        kind: MeasurementKind,
    ) -> Result<&Takeoff, LedgerError> {
        let name = normalize_name(name)?;
        let takeoff = Takeoff::new(name, kind);
        info!(
            "event=takeoff_create module=ledger status=ok takeoff={} kind={}",
            takeoff.id, kind
        );
        self.takeoffs.push(takeoff);
        Ok(&self.takeoffs[self.takeoffs.len() - 1])
    }

    /// Rename a take-off
    pub fn rename_takeoff(&mut self, id: TakeoffId, name: &str) -> Result<(), LedgerError> {
        let name = normalize_name(name)?;
        let takeoff = self.get_mut(id)?;
        takeoff.name = name;
        Ok(())
    }

    /// Append a measurement to its take-off
    ///
    /// The measurement must be of the take-off's kind and its id must carry
    /// the take-off's namespace.
    pub fn attach_measurement(
        &mut self,
        takeoff_id: TakeoffId,
        measurement: Measurement,
    ) -> Result<(), LedgerError> {
        let takeoff = self.get_mut(takeoff_id)?;
        takeoff.check_attachable(&measurement)?;

        info!(
            "event=measurement_attach module=ledger status=ok takeoff={} measurement={} value={}",
            takeoff_id,
            measurement.id(),
            measurement.value()
        );
        takeoff.measurements.push(measurement);
        Ok(())
    }

    /// Remove a measurement from whichever take-off owns it
    pub fn delete_measurement(
        &mut self,
        measurement_id: MeasurementId,
    ) -> Result<Measurement, LedgerError> {
        let takeoff = self
            .takeoffs
            .iter_mut()
            .find(|t| t.id == measurement_id.takeoff())
            .ok_or(LedgerError::MeasurementNotFound(measurement_id))?;

        let index = takeoff
            .measurements
            .iter()
            .position(|m| m.id() == measurement_id)
            .ok_or(LedgerError::MeasurementNotFound(measurement_id))?;

        let removed = takeoff.measurements.remove(index);
        info!(
            "event=measurement_delete module=ledger status=ok takeoff={} measurement={} left={}",
            takeoff.id,
            measurement_id,
            takeoff.measurements.len()
        );
        Ok(removed)
    }

    /// Remove a take-off together with all of its measurements
    pub fn delete_takeoff(&mut self, id: TakeoffId) -> Result<Takeoff, LedgerError> {
        let index = self
            .takeoffs
            .iter()
            .position(|t| t.id == id)
            .ok_or(LedgerError::TakeoffNotFound(id))?;

        let removed = self.takeoffs.remove(index);
        info!(
            "event=takeoff_delete module=ledger status=ok takeoff={} measurements={}",
            id,
            removed.measurements.len()
        );
        Ok(removed)
    }

    /// Insert a take-off loaded from storage, replacing any with the same id
    pub fn restore(&mut self, takeoff: Takeoff) {
        match self.takeoffs.iter_mut().find(|t| t.id == takeoff.id) {
            Some(existing) => *existing = takeoff,
            None => self.takeoffs.push(takeoff),
        }
    }

    pub fn get(&self, id: TakeoffId) -> Option<&Takeoff> {
        self.takeoffs.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TakeoffId) -> Result<&mut Takeoff, LedgerError> {
        self.takeoffs.iter_mut().find(|t| t.id == id).ok_or(LedgerError::TakeoffNotFound(id))
    }

    /// Look up a measurement through its namespaced id
    pub fn find_measurement(&self, id: MeasurementId) -> Option<&Measurement> {
        self.get(id.takeoff())?.measurement(id)
    }

    /// All take-offs in creation order
    pub fn takeoffs(&self) -> &[Takeoff] {
        &self.takeoffs
    }

    /// Every measurement across all take-offs
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.takeoffs.iter().flat_map(|t| t.measurements.iter())
    }

    pub fn len(&self) -> usize {
        self.takeoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.takeoffs.is_empty()
    }

    /// Drop every take-off
    pub fn clear(&mut self) {
        self.takeoffs.clear();
    }
}

fn normalize_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyName);
    }
    Ok(trimmed.to_string())
}
