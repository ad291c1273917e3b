//! Build the Parquet snapshot the dashboard starts from.
//!
//! Loads the hourly counts, joins sensor locations, and writes the canonical
//! table (derived timestamps included) so later runs skip the CSV parse.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use melbviz::data::snapshot;
use melbviz::{PedestrianDataset, Settings};

#[derive(Parser)]
#[command(name = "make_snapshot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load the pedestrian CSVs and write a Parquet snapshot")]
struct Cli {
    /// Hourly counts CSV (default: configured data directory)
    #[arg(long)]
    counts: Option<PathBuf>,

    /// Sensor locations CSV (default: configured data directory)
    #[arg(long)]
    sensors: Option<PathBuf>,

    /// Skip the sensor-location join
    #[arg(long, conflicts_with = "sensors")]
    no_locations: bool,

    /// Output file (default: <data dir>/melbviz.parquet)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the cleaned table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print the first N snapshot rows
    #[arg(long, value_name = "N")]
    preview: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load_default();

    let counts = cli.counts.unwrap_or_else(|| settings.counts_csv_path());
    let sensors = if cli.no_locations {
        None
    } else {
        Some(cli.sensors.unwrap_or_else(|| settings.sensor_csv_path()))
    };
    let output = cli.output.unwrap_or_else(|| settings.snapshot_path());

    let dataset = PedestrianDataset::load(&counts, sensors.as_deref(), &settings.dataset)
        .with_context(|| format!("loading {}", counts.display()))?;

    dataset
        .write_snapshot(&output)
        .with_context(|| format!("writing snapshot {}", output.display()))?;

    if let Some(csv_path) = &cli.csv {
        dataset
            .to_csv(csv_path)
            .with_context(|| format!("writing CSV {}", csv_path.display()))?;
    }

    if let Some(rows) = cli.preview {
        println!("{}", snapshot::preview(dataset.table(), rows)?);
    }

    println!(
        "Wrote {} hourly counts from {} sensors ({}–{}) to {}",
        dataset.len(),
        dataset.sensors().len(),
        dataset.years().first().map_or("-".to_string(), i32::to_string),
        dataset.years().last().map_or("-".to_string(), i32::to_string),
        output.display()
    );
    Ok(())
}
