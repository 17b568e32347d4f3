//! CSV export for take-offs and measurements
//!
//! Feeds downstream costing: one row per take-off with its rolled-up
//! quantity, or one row per measurement with geometry details.

use crate::ledger::{Takeoff, TakeoffStatus};
use crate::measurement::{Measurement, Shape};
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Export only measurements from specific pages (None = all pages)
    pub page_filter: Option<Vec<u32>>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self { include_headers: true, delimiter: b',', page_filter: None }
    }
}

/// Export take-off summaries to CSV format
///
/// CSV columns:
/// - ID: Take-off identifier
/// - Name: Take-off name
/// - Kind: area, linear or count
/// - Quantity: Rolled-up quantity (sum of measurement values)
/// - Unit: Unit of the quantity
/// - Status: pending or complete
/// - Measurements: Number of attached measurements
pub fn export_takeoffs_csv<W: Write>(
    writer: W,
    takeoffs: &[Takeoff],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Name",
            "Kind",
            "Quantity",
            "Unit",
            "Status",
            "Measurements",
        ])?;
    }

    for takeoff in takeoffs {
        csv_writer.write_record(&[
            takeoff.id().to_string(),
            takeoff.name().to_string(),
            takeoff.kind().as_str().to_string(),
            format!("{:.2}", takeoff.quantity()),
            takeoff.unit().to_string(),
            status_name(takeoff.status()).to_string(),
            takeoff.measurements().len().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export individual measurements to CSV format
///
/// CSV columns:
/// - Take-off: Owning take-off name
/// - ID: Namespaced measurement identifier
/// - Page: Page index (0-based)
/// - Kind: area, linear or count
/// - Label: Operator label
/// - Value: Quantity in real-world units
/// - Unit: Unit of the value
/// - Scale: Pixels per unit at capture time
/// - Created: Creation timestamp (Unix seconds)
/// - Geometry: Traced points in surface pixels
/// - BBox Min X / Min Y / Max X / Max Y: Bounding box in surface pixels
pub fn export_measurements_csv<W: Write>(
    writer: W,
    takeoffs: &[Takeoff],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "Take-off",
            "ID",
            "Page",
            "Kind",
            "Label",
            "Value",
            "Unit",
            "Scale",
            "Created",
            "Geometry",
            "BBox Min X",
            "BBox Min Y",
            "BBox Max X",
            "BBox Max Y",
        ])?;
    }

    let rows = takeoffs.iter().flat_map(|t| t.measurements().iter().map(move |m| (t, m)));
    for (takeoff, measurement) in rows.filter(|(_, m)| included(m, config)) {
        let (min_x, min_y, max_x, max_y) = measurement.geometry().bounding_box();
        csv_writer.write_record(&[
            takeoff.name().to_string(),
            measurement.id().to_string(),
            measurement.page_index().to_string(),
            measurement.kind().as_str().to_string(),
            measurement.label().to_string(),
            format!("{:.2}", measurement.value()),
            measurement.unit().to_string(),
            measurement.scale().pixels_per_unit().to_string(),
            measurement.created_at().to_string(),
            format_geometry(measurement.geometry()),
            min_x.to_string(),
            min_y.to_string(),
            max_x.to_string(),
            max_y.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn included(measurement: &Measurement, config: &CsvExportConfig) -> bool {
    match &config.page_filter {
        Some(pages) => pages.contains(&measurement.page_index()),
        None => true,
    }
}

fn status_name(status: TakeoffStatus) -> &'static str {
    match status {
        TakeoffStatus::Pending => "pending",
        TakeoffStatus::Complete => "complete",
    }
}

/// Format geometry as a human-readable string
fn format_geometry(shape: &Shape) -> String {
    let join = |points: &[crate::geometry::SurfacePoint]| {
        points.iter().map(|p| format!("({:.2},{:.2})", p.x, p.y)).collect::<Vec<_>>().join(",")
    };
    match shape {
        Shape::Polygon { points } => format!("Polygon[{}]", join(points)),
        Shape::Polyline { points } => format!("Polyline[{}]", join(points)),
        Shape::Marker { at } => format!("Marker[({:.2},{:.2})]", at.x, at.y),
    }
}

/// Export take-off summaries to a CSV string
pub fn export_takeoffs_to_string(
    takeoffs: &[Takeoff],
    config: &CsvExportConfig,
) -> CsvExportResult<String> {
    let mut buffer = Vec::new();
    export_takeoffs_csv(&mut buffer, takeoffs, config)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Export measurements to a CSV string
pub fn export_measurements_to_string(
    takeoffs: &[Takeoff],
    config: &CsvExportConfig,
) -> CsvExportResult<String> {
    let mut buffer = Vec::new();
    export_measurements_csv(&mut buffer, takeoffs, config)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SurfacePoint;
    use crate::ledger::TakeoffLedger;
    use crate::measurement::MeasurementKind;
    use crate::scale::Scale;

    fn sample_ledger() -> TakeoffLedger {
        let mut ledger = TakeoffLedger::new();
        let walls = ledger
            .create_takeoff("Walls, internal", MeasurementKind::Linear)
            .expect("created")
            .id();
        let geometry = Shape::Polyline {
            points: vec![SurfacePoint::new(0.0, 0.0), SurfacePoint::new(250.0, 0.0)],
        };
        let scale = Scale::new(100.0).expect("valid scale");
        let measurement = Measurement::new(walls, "North", geometry, scale, 2).expect("valid");
        ledger.attach_measurement(walls, measurement).expect("attached");
        ledger.create_takeoff("Sockets", MeasurementKind::Count).expect("created");
        ledger
    }

    #[test]
    fn test_export_takeoffs_csv() {
        let ledger = sample_ledger();
        let csv = export_takeoffs_to_string(ledger.takeoffs(), &CsvExportConfig::default())
            .expect("export should succeed");

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID,Name,Kind,Quantity,Unit,Status,Measurements");
        assert!(lines[1].contains("\"Walls, internal\",linear,2.50,m,complete,1"));
        assert!(lines[2].ends_with("Sockets,count,0.00,count,pending,0"));
    }

    #[test]
    fn test_export_measurements_csv() {
        let ledger = sample_ledger();
        let csv = export_measurements_to_string(ledger.takeoffs(), &CsvExportConfig::default())
            .expect("export should succeed");

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Take-off,ID,Page,Kind,Label,Value"));
        assert!(lines[1].contains(",2,linear,North,2.50,m,100,"));
        assert!(lines[1].contains("\"Polyline[(0.00,0.00),(250.00,0.00)]\""));
    }

    #[test]
    fn test_export_without_headers_and_page_filter() {
        let ledger = sample_ledger();
        let config = CsvExportConfig {
            include_headers: false,
            delimiter: b';',
            page_filter: Some(vec![0]),
        };

        let csv = export_measurements_to_string(ledger.takeoffs(), &config)
            .expect("export should succeed");
        assert!(csv.is_empty());

        let csv = export_takeoffs_to_string(ledger.takeoffs(), &config)
            .expect("export should succeed");
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains(";Walls, internal;linear;2.50;m;complete;1"));
    }
}
