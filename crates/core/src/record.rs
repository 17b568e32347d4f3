//! Persisted shape of take-offs
//!
//! Records are what crosses the persistence boundary. Loading a record checks
//! ownership and kind again; the stored `quantity` and `status` are only
//! informational and are recomputed from the measurements.

use crate::ledger::{Takeoff, TakeoffStatus};
use crate::measurement::{Measurement, MeasurementId, MeasurementKind, Shape, TakeoffId};
use crate::scale::Scale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Record validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("take-off {0} has an empty name")]
    EmptyName(TakeoffId),

    #[error("measurement {measurement} does not belong to take-off {takeoff}")]
    ForeignMeasurement { takeoff: TakeoffId, measurement: MeasurementId },

    #[error("measurement {measurement} is {actual} but take-off is {expected}")]
    KindMismatch { measurement: MeasurementId, expected: MeasurementKind, actual: MeasurementKind },

    #[error("measurement {0} appears more than once")]
    DuplicateMeasurement(MeasurementId),

    #[error("measurement {measurement} has invalid value {value}")]
    InvalidValue { measurement: MeasurementId, value: f64 },
}

/// Persisted measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: MeasurementId,
    pub kind: MeasurementKind,
    pub label: String,
    pub value: f64,
    pub unit: String,
    pub geometry: Shape,
    pub scale: Scale,
    #[serde(default)]
    pub page_index: u32,
    #[serde(default)]
    pub created_at: i64,
}

/// Persisted take-off, keyed by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoffRecord {
    pub id: TakeoffId,
    pub name: String,
    pub kind: MeasurementKind,
    pub quantity: String,
    pub status: TakeoffStatus,
    pub unit: String,
    #[serde(default)]
    pub measurements: Vec<MeasurementRecord>,
}

impl From<&Measurement> for MeasurementRecord {
    fn from(measurement: &Measurement) -> Self {
        Self {
            id: measurement.id(),
            kind: measurement.kind(),
            label: measurement.label().to_string(),
            value: measurement.value(),
            unit: measurement.unit().to_string(),
            geometry: measurement.geometry().clone(),
            scale: measurement.scale(),
            page_index: measurement.page_index(),
            created_at: measurement.created_at(),
        }
    }
}

impl From<&Takeoff> for TakeoffRecord {
    fn from(takeoff: &Takeoff) -> Self {
        Self {
            id: takeoff.id(),
            name: takeoff.name().to_string(),
            kind: takeoff.kind(),
            quantity: takeoff.formatted_quantity(),
            status: takeoff.status(),
            unit: takeoff.unit().to_string(),
            measurements: takeoff.measurements().iter().map(MeasurementRecord::from).collect(),
        }
    }
}

impl TryFrom<TakeoffRecord> for Takeoff {
    type Error = RecordError;

    fn try_from(record: TakeoffRecord) -> Result<Self, Self::Error> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err(RecordError::EmptyName(record.id));
        }

        let mut seen = BTreeSet::new();
        let measurements = record
            .measurements
            .into_iter()
            .map(|m| {
                if m.id.takeoff() != record.id {
                    return Err(RecordError::ForeignMeasurement {
                        takeoff: record.id,
                        measurement: m.id,
                    });
                }
                // The geometry decides the kind; the stored tag must agree
                let actual = m.geometry.kind();
                if actual != record.kind || m.kind != actual {
                    return Err(RecordError::KindMismatch {
                        measurement: m.id,
                        expected: record.kind,
                        actual,
                    });
                }
                if !seen.insert(m.id) {
                    return Err(RecordError::DuplicateMeasurement(m.id));
                }
                if !m.value.is_finite() || m.value < 0.0 {
                    return Err(RecordError::InvalidValue { measurement: m.id, value: m.value });
                }
                Ok(Measurement::restore(
                    m.id,
                    m.label,
                    m.value,
                    m.geometry,
                    m.scale,
                    m.page_index,
                    m.created_at,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Takeoff::restore(record.id, name, record.kind, measurements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfacePoint;
    use crate::ledger::TakeoffLedger;

    fn ledger_with_area() -> (TakeoffLedger, TakeoffId) {
        let mut ledger = TakeoffLedger::new();
        let id = ledger.create_takeoff("Floor", MeasurementKind::Area).expect("created").id();
        let geometry = Shape::Polygon {
            points: vec![
                SurfacePoint::new(0.0, 0.0),
                SurfacePoint::new(200.0, 0.0),
                SurfacePoint::new(200.0, 100.0),
                SurfacePoint::new(0.0, 100.0),
            ],
        };
        let scale = Scale::new(100.0).expect("valid scale");
        let measurement = Measurement::new(id, "Kitchen", geometry, scale, 1).expect("valid trace");
        ledger.attach_measurement(id, measurement).expect("attached");
        (ledger, id)
    }

    #[test]
    fn record_carries_persistence_contract_fields() {
        let (ledger, id) = ledger_with_area();
        let record = TakeoffRecord::from(ledger.get(id).expect("takeoff exists"));

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["name"], "Floor");
        assert_eq!(json["kind"], "area");
        assert_eq!(json["status"], "complete");
        assert_eq!(json["quantity"], "2.00 m²");
        assert_eq!(json["unit"], "m²");
        assert_eq!(json["measurements"][0]["value"], 2.0);
        assert_eq!(json["measurements"][0]["scale"], 100.0);
        assert_eq!(json["measurements"][0]["geometry"]["type"], "polygon");
        assert!(json["measurements"][0]["id"]
            .as_str()
            .expect("string id")
            .starts_with(&id.to_string()));
    }

    #[test]
    fn record_restores_identical_takeoff() {
        let (ledger, id) = ledger_with_area();
        let original = ledger.get(id).expect("takeoff exists").clone();

        let json = serde_json::to_string(&TakeoffRecord::from(&original)).expect("serialize");
        let record: TakeoffRecord = serde_json::from_str(&json).expect("deserialize");
        let restored = Takeoff::try_from(record).expect("valid record");

        assert_eq!(restored, original);
    }

    #[test]
    fn stale_quantity_and_status_are_recomputed() {
        let (ledger, id) = ledger_with_area();
        let mut record = TakeoffRecord::from(ledger.get(id).expect("takeoff exists"));
        record.quantity = "999 m²".to_string();
        record.status = TakeoffStatus::Pending;

        let restored = Takeoff::try_from(record).expect("valid record");
        assert_eq!(restored.quantity(), 2.0);
        assert_eq!(restored.status(), TakeoffStatus::Complete);
    }

    #[test]
    fn foreign_and_mismatched_measurements_are_rejected() {
        let (ledger, id) = ledger_with_area();
        let record = TakeoffRecord::from(ledger.get(id).expect("takeoff exists"));

        let mut foreign = record.clone();
        foreign.id = TakeoffId::new_v4();
        assert!(matches!(
            Takeoff::try_from(foreign),
            Err(RecordError::ForeignMeasurement { .. })
        ));

        let mut mismatched = record;
        mismatched.kind = MeasurementKind::Linear;
        assert!(matches!(Takeoff::try_from(mismatched), Err(RecordError::KindMismatch { .. })));
    }

    #[test]
    fn duplicated_measurement_is_rejected() {
        let (ledger, id) = ledger_with_area();
        let mut record = TakeoffRecord::from(ledger.get(id).expect("takeoff exists"));
        let duplicate = record.measurements[0].clone();
        let duplicate_id = duplicate.id;
        record.measurements.push(duplicate);

        assert_eq!(
            Takeoff::try_from(record),
            Err(RecordError::DuplicateMeasurement(duplicate_id))
        );
    }

    #[test]
    fn negative_or_non_finite_value_is_rejected() {
        let (ledger, id) = ledger_with_area();
        let record = TakeoffRecord::from(ledger.get(id).expect("takeoff exists"));

        for value in [-1.0, f64::NAN, f64::INFINITY] {
            let mut corrupted = record.clone();
            corrupted.measurements[0].value = value;
            assert!(matches!(
                Takeoff::try_from(corrupted),
                Err(RecordError::InvalidValue { .. })
            ));
        }
    }
}
