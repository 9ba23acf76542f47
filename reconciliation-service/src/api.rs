use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use meter_core::aggregate;
use meter_core::domain::{FleetOverview, MeterDetail, MeterSummary, ProcessedReading};

use crate::store::ReadingStore;

/// Query surface over the reading store. One route per view the dashboard
/// renders: the full reconciled series, the fleet overview cards, the meter
/// table, and the per-meter detail page.
///
/// Every handler snapshots the store and reconciles on demand; nothing
/// derived is cached between requests.
pub fn router(store: ReadingStore) -> Router {
    Router::new()
        .route("/api/readings", get(all_readings))
        .route("/api/overview", get(overview))
        .route("/api/meters", get(meters))
        .route("/api/meters/:meter_id", get(meter_detail))
        .route("/api/meters/:meter_id/readings", get(meter_readings))
        .with_state(store)
}

/// Bind and serve the query API until the process exits.
pub async fn serve(bind_addr: &str, store: ReadingStore) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid api bind addr: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "query API listening");
    axum::serve(listener, router(store).into_make_service()).await?;

    Ok(())
}

async fn all_readings(State(store): State<ReadingStore>) -> Json<Vec<ProcessedReading>> {
    let raw = store.snapshot().await;
    Json(meter_core::process(&raw))
}

async fn overview(State(store): State<ReadingStore>) -> Json<FleetOverview> {
    let raw = store.snapshot().await;
    Json(aggregate::fleet_overview(&raw))
}

async fn meters(State(store): State<ReadingStore>) -> Json<Vec<MeterSummary>> {
    let raw = store.snapshot().await;
    Json(aggregate::meter_summaries(&raw))
}

async fn meter_detail(
    State(store): State<ReadingStore>,
    Path(meter_id): Path<String>,
) -> Result<Json<MeterDetail>, StatusCode> {
    let raw = store.snapshot().await;
    aggregate::meter_detail(&raw, &meter_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn meter_readings(
    State(store): State<ReadingStore>,
    Path(meter_id): Path<String>,
) -> Result<Json<Vec<ProcessedReading>>, StatusCode> {
    let raw = store.snapshot().await;
    let readings = aggregate::readings_for_meter(&raw, &meter_id);
    if readings.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(readings))
}
