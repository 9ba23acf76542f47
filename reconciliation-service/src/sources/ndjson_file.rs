use std::path::PathBuf;

use async_stream::try_stream;
use futures::Stream;
use meter_core::RawReading;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::pipeline::{Envelope, PipelineError, Source};

/// NDJSON file source for raw meter readings.
///
/// Each line is one wire-form reading, the same shape the HTTP ingest route
/// accepts: `{"meterId": ..., "timestamp": ..., "cumulativeVolume": ...}`.
pub struct NdjsonFileSource {
    path: PathBuf,
}

impl NdjsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<RawReading> for NdjsonFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawReading>, PipelineError>> + Send>>
    {
        let path = self.path.clone();
        let s = try_stream! {
            let file = File::open(&path).await.map_err(|e| {
                PipelineError::Source(format!("failed to open NDJSON file: {e}"))
            })?;
            let reader = BufReader::new(file);
            let mut lines = reader.lines();

            while let Some(line) = lines.next_line().await.map_err(|e| {
                PipelineError::Source(format!("failed to read NDJSON line: {e}"))
            })? {
                if line.trim().is_empty() {
                    continue;
                }

                let reading: RawReading = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        metrics::counter!("reading_ndjson_parse_errors_total").increment(1);
                        Err(PipelineError::Source(format!(
                            "failed to parse NDJSON line: {e}"
                        )))?
                    }
                };

                yield Envelope::now(reading);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn wire_line_parses_into_a_reading() {
        let line = r#"{"meterId":"MTR-001","timestamp":"2025-02-05T08:02:00Z","cumulativeVolume":10000}"#;

        let reading: RawReading = serde_json::from_str(line).expect("valid line");
        assert_eq!(reading.meter_id, "MTR-001");
        assert_eq!(reading.timestamp, datetime!(2025-02-05 08:02:00 UTC));
        assert_eq!(reading.cumulative_volume, 10000.0);
    }

    #[test]
    fn wire_line_with_bad_timestamp_fails() {
        let line = r#"{"meterId":"MTR-001","timestamp":"08:02","cumulativeVolume":10000}"#;

        assert!(serde_json::from_str::<RawReading>(line).is_err());
    }
}
