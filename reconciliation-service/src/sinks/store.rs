use futures::StreamExt;
use meter_core::RawReading;

use crate::pipeline::{Envelope, PipelineError, Sink};
use crate::store::ReadingStore;

/// Terminal stage of the ingest pipeline: appends validated readings to the
/// shared in-memory store.
///
/// Readings are buffered and appended in batches so one write lock covers
/// many readings. Upstream errors (rejected readings, malformed lines) are
/// logged and counted but do not stop a long-running ingest stream.
pub struct StoreSink {
    store: ReadingStore,
    batch_size: usize,
}

impl StoreSink {
    pub fn new(store: ReadingStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    async fn flush(&self, buffer: &mut Vec<Envelope<RawReading>>) {
        if buffer.is_empty() {
            return;
        }

        let counter = metrics::counter!("store_appended_readings_total");
        counter.increment(buffer.len() as u64);

        // Approximate end-to-end latency from earliest received_at to now.
        if let Some(min_received) = buffer.iter().map(|e| e.received_at).min() {
            if let Ok(dur) = std::time::SystemTime::now().duration_since(min_received) {
                let hist = metrics::histogram!("ingest_end_to_end_latency_seconds");
                hist.record(dur.as_secs_f64());
            }
        }

        let batch: Vec<RawReading> = buffer.drain(..).map(|e| e.payload).collect();
        self.store.append(batch).await;
    }
}

#[async_trait::async_trait]
impl Sink<RawReading> for StoreSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<RawReading>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        let mut buffer: Vec<Envelope<RawReading>> = Vec::with_capacity(self.batch_size);

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(error = %e, "reading dropped before the store");
                    metrics::counter!("store_dropped_readings_total").increment(1);
                    continue;
                }
            };

            buffer.push(env);
            if buffer.len() >= self.batch_size {
                self.flush(&mut buffer).await;
            }
        }

        self.flush(&mut buffer).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn envelope(meter_id: &str, volume: f64) -> Envelope<RawReading> {
        Envelope::now(RawReading {
            meter_id: meter_id.to_string(),
            timestamp: datetime!(2025-02-05 08:02:00 UTC),
            cumulative_volume: volume,
        })
    }

    #[tokio::test]
    async fn drains_the_stream_into_the_store() {
        let store = ReadingStore::new();
        let sink = StoreSink::new(store.clone(), 2);

        let items: Vec<Result<Envelope<RawReading>, PipelineError>> = vec![
            Ok(envelope("MTR-001", 1.0)),
            Ok(envelope("MTR-002", 2.0)),
            Ok(envelope("MTR-003", 3.0)),
        ];
        let stream = futures::stream::iter(items);

        sink.run(stream).await.expect("sink completes");
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn upstream_errors_are_skipped() {
        let store = ReadingStore::new();
        let sink = StoreSink::new(store.clone(), 8);

        let items: Vec<Result<Envelope<RawReading>, PipelineError>> = vec![
            Ok(envelope("MTR-001", 1.0)),
            Err(PipelineError::Transform("rejected".to_string())),
            Ok(envelope("MTR-002", 2.0)),
        ];
        let stream = futures::stream::iter(items);

        sink.run(stream).await.expect("sink completes");
        assert_eq!(store.len().await, 2);
    }
}
