use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use log::debug;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use takeoff_core::{
    export_measurements_csv, export_takeoffs_csv, CsvExportConfig, MeasurementKind, Scale, Shape,
    SurfacePoint, Takeoff, TakeoffStatus, TakeoffStore,
};
use takeoff_storage::Storage;

#[derive(Debug, Parser)]
#[command(name = "takeoff-cli")]
#[command(about = "Take-off measurement CLI")]
pub struct Cli {
    /// Data directory (defaults to the platform local data dir)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stored take-offs as JSON.
    Summary,
    /// Export stored take-offs as CSV.
    ExportCsv {
        /// One row per measurement instead of per take-off
        #[arg(long)]
        measurements: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert a trace to a quantity.
    Measure {
        #[arg(long)]
        kind: MeasurementKind,
        /// Pixels per unit; defaults to the configured scale
        #[arg(long)]
        scale: Option<String>,
        /// Space-separated `x,y` points in surface pixels
        #[arg(long, allow_hyphen_values = true)]
        points: String,
    },
    /// Print the capture configuration as JSON.
    Config,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    id: String,
    name: String,
    kind: MeasurementKind,
    quantity: f64,
    formatted: String,
    unit: &'static str,
    status: TakeoffStatus,
    measurements: usize,
}

impl From<&Takeoff> for SummaryOutput {
    fn from(takeoff: &Takeoff) -> Self {
        Self {
            id: takeoff.id().to_string(),
            name: takeoff.name().to_string(),
            kind: takeoff.kind(),
            quantity: takeoff.quantity(),
            formatted: takeoff.formatted_quantity(),
            unit: takeoff.unit(),
            status: takeoff.status(),
            measurements: takeoff.measurements().len(),
        }
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let level = if cli.verbose { "debug" } else { "warn" };
    let _logger = Logger::try_with_env_or_str(level)
        .context("invalid log specification")?
        .start()
        .context("failed to start logger")?;

    let storage = match cli.store {
        Some(dir) => Storage::with_root(dir),
        None => Storage::from_default_project()?,
    };
    debug!("event=cli_start module=cli status=ok store={}", storage.root().display());

    match cli.command {
        Commands::Summary => run_summary(&storage),
        Commands::ExportCsv { measurements, output } => {
            run_export_csv(&storage, measurements, output.as_deref())
        }
        Commands::Measure { kind, scale, points } => {
            run_measure(&storage, kind, scale.as_deref(), &points)
        }
        Commands::Config => {
            let config = storage.load_config().context("failed to load config")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_takeoffs(storage: &Storage) -> Result<Vec<Takeoff>> {
    let store = storage.takeoff_store();
    let records = store
        .load_all()
        .with_context(|| format!("failed to read take-offs from {}", store.dir().display()))?;

    records
        .into_iter()
        .map(|record| {
            let id = record.id;
            Takeoff::try_from(record).with_context(|| format!("invalid take-off {id}"))
        })
        .collect()
}

fn run_summary(storage: &Storage) -> Result<()> {
    let takeoffs = load_takeoffs(storage)?;
    let payload: Vec<SummaryOutput> = takeoffs.iter().map(SummaryOutput::from).collect();

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_export_csv(storage: &Storage, measurements: bool, output: Option<&Path>) -> Result<()> {
    let takeoffs = load_takeoffs(storage)?;
    let config = CsvExportConfig::default();

    let mut buffer = Vec::new();
    if measurements {
        export_measurements_csv(&mut buffer, &takeoffs, &config)?;
    } else {
        export_takeoffs_csv(&mut buffer, &takeoffs, &config)?;
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &buffer)
                .with_context(|| format!("failed to write CSV to {}", path.display()))?;
            println!("{}", path.display());
        }
        None => std::io::stdout().write_all(&buffer)?,
    }
    Ok(())
}

fn run_measure(
    storage: &Storage,
    kind: MeasurementKind,
    scale: Option<&str>,
    points: &str,
) -> Result<()> {
    let scale = match scale {
        Some(text) => Scale::parse(text)?,
        None => storage.load_config().context("failed to load config")?.default_scale,
    };
    let points = parse_points(points)?;

    let value = match kind {
        MeasurementKind::Count => {
            if points.is_empty() {
                anyhow::bail!("count needs at least one point");
            }
            points.len() as f64
        }
        MeasurementKind::Area | MeasurementKind::Linear => {
            let shape = Shape::from_trace(kind, points)
                .with_context(|| format!("cannot build a {} trace", kind.as_str()))?;
            shape.quantity(scale)?
        }
    };

    println!("{}", kind.format_quantity(value));
    Ok(())
}

fn parse_points(input: &str) -> Result<Vec<SurfacePoint>> {
    input
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("point `{pair}` must look like `x,y`"))?;
            let x: f64 = x.trim().parse().with_context(|| format!("invalid x in `{pair}`"))?;
            let y: f64 = y.trim().parse().with_context(|| format!("invalid y in `{pair}`"))?;
            if !x.is_finite() || !y.is_finite() {
                anyhow::bail!("point `{pair}` is not finite");
            }
            Ok(SurfacePoint::new(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_points_accepts_pairs() {
        let points = parse_points(" 0,0  100,0\t100,-50 ").expect("valid points");
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], SurfacePoint::new(100.0, -50.0));
    }

    #[test]
    fn parse_points_rejects_malformed_pairs() {
        assert!(parse_points("0,0 10").is_err());
        assert!(parse_points("a,1").is_err());
        assert!(parse_points("inf,1").is_err());
        assert!(parse_points("").expect("empty is fine").is_empty());
    }
}
