use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use futures::Stream;
use meter_core::domain::parse_timestamp;
use meter_core::RawReading;

use crate::pipeline::{Envelope, PipelineError, Source};

/// CSV file source for raw meter readings.
///
/// Expected header columns (by name):
/// - ts (RFC 3339 timestamp)
/// - meter_id
/// - cumulative_volume (liters)
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<RawReading, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let timestamp = parse_timestamp(get("ts")?).map_err(|e| PipelineError::Source(e.to_string()))?;

    let meter_id = get("meter_id")?.trim().to_string();

    let volume_str = get("cumulative_volume")?;
    let cumulative_volume: f64 = volume_str.trim().parse().map_err(|e| {
        PipelineError::Source(format!("invalid cumulative_volume '{volume_str}': {e}"))
    })?;

    Ok(RawReading {
        meter_id,
        timestamp,
        cumulative_volume,
    })
}

#[async_trait::async_trait]
impl Source<RawReading> for CsvFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawReading>, PipelineError>> + Send>>
    {
        // Blocking CSV reader wrapped in a single async task; reading files
        // are small enough that this never starves the runtime.
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| PipelineError::Source(format!("failed to open CSV file: {e}")))?;
            let mut rdr = csv::Reader::from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))?
                .clone();

            for result in rdr.records() {
                let record = result.map_err(|e| PipelineError::Source(format!(
                    "failed to read CSV record: {e}"
                )))?;

                let reading = match record_to_reading(&record, &headers) {
                    Ok(r) => r,
                    Err(e) => {
                        metrics::counter!("reading_csv_parse_errors_total").increment(1);
                        Err(e)?
                    }
                };

                yield Envelope::now(reading);
            }
        };

        Box::pin(s)
    }
}
