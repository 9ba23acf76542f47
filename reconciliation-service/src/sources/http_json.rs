use std::{net::SocketAddr, sync::Arc};

use axum::{extract::State, routing::post, Json, Router};
use futures::{Stream, StreamExt};
use meter_core::RawReading;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::pipeline::{Envelope, PipelineError, Source};

#[derive(Clone)]
struct SharedSender {
    tx: mpsc::Sender<Envelope<RawReading>>,
}

/// HTTP ingest source: `POST /ingest/readings` with a JSON array of raw
/// readings in wire form (`meterId`, `timestamp`, `cumulativeVolume`).
///
/// Malformed timestamps or missing fields never reach the pipeline; serde
/// rejects the request body with a 4xx before anything is enqueued.
#[derive(Clone)]
pub struct HttpJsonSource {
    receiver: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<Envelope<RawReading>>>>>,
}

impl HttpJsonSource {
    pub async fn new(bind_addr: &str, channel_capacity: usize) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let shared = SharedSender { tx };

        let app = Router::new()
            .route("/ingest/readings", post(ingest_readings))
            .with_state(shared.clone());

        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;

        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        tracing::error!(error = %e, "HTTP ingest server error");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to bind HTTP ingest listener");
                }
            }
        });

        Ok(Self {
            receiver: Arc::new(tokio::sync::Mutex::new(Some(rx))),
        })
    }
}

#[async_trait::async_trait]
impl Source<RawReading> for HttpJsonSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawReading>, PipelineError>> + Send>>
    {
        let mut guard = self.receiver.lock().await;
        let rx = guard
            .take()
            .expect("HttpJsonSource stream already taken; only one consumer supported");

        let stream = ReceiverStream::new(rx).map(Ok);
        Box::pin(stream)
    }
}

async fn ingest_readings(
    State(sender): State<SharedSender>,
    Json(payload): Json<Vec<RawReading>>,
) -> Result<(), axum::http::StatusCode> {
    metrics::counter!("http_ingest_requests_total").increment(1);
    metrics::counter!("http_ingest_readings_total").increment(payload.len() as u64);

    for reading in payload {
        if sender.tx.send(Envelope::now(reading)).await.is_err() {
            // Channel closed; treat as server error
            metrics::counter!("http_ingest_failed_total").increment(1);
            return Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(())
}
