use meter_core::RawReading;
use time::macros::datetime;

use crate::pipeline::{Envelope, PipelineError, Transform};

/// Pure validation of an incoming raw reading.
///
/// Rules:
/// - meter id must be non-empty.
/// - cumulative volume must be a finite, non-negative number.
/// - timestamp must be within a broad sanity window [2000-01-01, 2100-01-01).
pub fn validate_reading(reading: &RawReading) -> Result<(), PipelineError> {
    if reading.meter_id.trim().is_empty() {
        return Err(PipelineError::Transform(
            "meter id must be non-empty".to_string(),
        ));
    }

    if !reading.cumulative_volume.is_finite() || reading.cumulative_volume < 0.0 {
        return Err(PipelineError::Transform(
            "cumulative volume must be a non-negative finite number".to_string(),
        ));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if reading.timestamp < min_ts || reading.timestamp >= max_ts {
        return Err(PipelineError::Transform(
            "timestamp out of allowed range".to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<RawReading, RawReading> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<RawReading>,
    ) -> Result<Envelope<RawReading>, PipelineError> {
        match validate_reading(&input.payload) {
            Ok(()) => Ok(input),
            Err(e) => {
                metrics::counter!("validation_reading_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
