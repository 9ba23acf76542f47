use std::env;
use std::io::Write;

use anyhow::{bail, Result};
use meter_core::RawReading;
use reconciliation_service::{
    observability,
    pipeline::collect_batch,
    sources::{CsvFileSource, NdjsonFileSource},
    transform::validate_reading,
};

/// Offline reconciliation: read a batch file, run the core, write the
/// reconciled hourly series as NDJSON to stdout.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: reconcile_file <readings.csv|readings.ndjson>");
    }
    let path = &args[1];

    let raw = load_readings(path).await?;
    for reading in &raw {
        validate_reading(reading)?;
    }

    let processed = meter_core::process(&raw);
    tracing::info!(
        raw = raw.len(),
        reconciled = processed.len(),
        "file reconciled"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &processed {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }

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
