use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::reading::hour_serde;

/// Health of a meter over its reconciled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterStatus {
    Normal,
    HasIncidents,
}

/// Per-meter aggregate over the reconciled series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSummary {
    pub meter_id: String,
    pub total_consumption: f64,
    /// Count of gap-estimated and counter-reset records.
    pub incident_count: usize,
    pub status: MeterStatus,
    /// Latest reconciled hour, serialized as an hour string.
    #[serde(with = "hour_serde")]
    pub last_reading: OffsetDateTime,
}

/// Record counts per quality flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagBreakdown {
    pub normal: usize,
    pub gap_estimated: usize,
    pub counter_reset: usize,
}

/// Fleet-wide headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetOverview {
    pub total_consumption: f64,
    pub total_incidents: usize,
    pub meter_count: usize,
}

/// Everything the per-meter view needs in one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDetail {
    pub summary: MeterSummary,
    pub flags: FlagBreakdown,
}
