use std::env;

use anyhow::{bail, Result};
use meter_core::aggregate;
use meter_core::domain::{FleetOverview, MeterSummary};
use meter_core::RawReading;
use reconciliation_service::{
    observability,
    pipeline::collect_batch,
    sources::{CsvFileSource, NdjsonFileSource},
    transform::validate_reading,
};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FleetReport {
    overview: FleetOverview,
    meters: Vec<MeterSummary>,
}

/// Offline fleet report: the overview numbers and per-meter summaries for a
/// reading file, as one JSON document on stdout.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: fleet_report <readings.csv|readings.ndjson>");
    }
    let path = &args[1];

    let raw = load_readings(path).await?;
    for reading in &raw {
        validate_reading(reading)?;
    }

    let report = FleetReport {
        overview: aggregate::fleet_overview(&raw),
        meters: aggregate::meter_summaries(&raw),
    };
    tracing::info!(
        meters = report.meters.len(),
        incidents = report.overview.total_incidents,
        "fleet report computed"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn load_readings(path: &str) -> Result<Vec<RawReading>> {
    let batch = if path.ends_with(".csv") {
        collect_batch(&CsvFileSource::new(path)).await?
    } else {
        collect_batch(&NdjsonFileSource::new(path)).await?
    };
    Ok(batch)
}
