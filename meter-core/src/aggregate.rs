//! Consumer-facing reductions over the reconciled series: the numbers a
//! dashboard or report renders. Each function recomputes the reconciliation
//! from the raw batch; nothing is cached between calls.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    FlagBreakdown, FleetOverview, MeterDetail, MeterStatus, MeterSummary, ProcessedReading,
    QualityFlag, RawReading,
};
use crate::reconcile::process;

/// Per-meter summaries, ordered by meter id. Meters with no reconciled
/// output have no summary.
pub fn meter_summaries(raw_readings: &[RawReading]) -> Vec<MeterSummary> {
    let mut summaries: BTreeMap<String, MeterSummary> = BTreeMap::new();

    for reading in process(raw_readings) {
        let summary = summaries
            .entry(reading.meter_id.clone())
            .or_insert_with(|| MeterSummary {
                meter_id: reading.meter_id.clone(),
                total_consumption: 0.0,
                incident_count: 0,
                status: MeterStatus::Normal,
                last_reading: reading.hour,
            });

        summary.total_consumption += reading.consumption;
        if reading.flag != QualityFlag::Normal {
            summary.incident_count += 1;
            summary.status = MeterStatus::HasIncidents;
        }
        if reading.hour > summary.last_reading {
            summary.last_reading = reading.hour;
        }
    }

    summaries.into_values().collect()
}

/// The reconciled series for a single meter.
pub fn readings_for_meter(raw_readings: &[RawReading], meter_id: &str) -> Vec<ProcessedReading> {
    process(raw_readings)
        .into_iter()
        .filter(|r| r.meter_id == meter_id)
        .collect()
}

/// Total consumption across the fleet.
pub fn fleet_total(raw_readings: &[RawReading]) -> f64 {
    process(raw_readings).iter().map(|r| r.consumption).sum()
}

/// Count of gap-estimated and counter-reset records across the fleet.
pub fn total_incidents(raw_readings: &[RawReading]) -> usize {
    process(raw_readings)
        .iter()
        .filter(|r| r.flag != QualityFlag::Normal)
        .count()
}

/// Record counts per quality flag over an already-reconciled sequence.
pub fn flag_breakdown(readings: &[ProcessedReading]) -> FlagBreakdown {
    let mut breakdown = FlagBreakdown::default();
    for reading in readings {
        match reading.flag {
            QualityFlag::Normal => breakdown.normal += 1,
            QualityFlag::GapEstimated => breakdown.gap_estimated += 1,
            QualityFlag::CounterReset => breakdown.counter_reset += 1,
        }
    }
    breakdown
}

/// Fleet-wide headline numbers in one pass.
pub fn fleet_overview(raw_readings: &[RawReading]) -> FleetOverview {
    let processed = process(raw_readings);

    let mut meters = BTreeSet::new();
    let mut total_consumption = 0.0;
    let mut total_incidents = 0;
    for reading in &processed {
        meters.insert(reading.meter_id.as_str());
        total_consumption += reading.consumption;
        if reading.flag != QualityFlag::Normal {
            total_incidents += 1;
        }
    }

    FleetOverview {
        total_consumption,
        total_incidents,
        meter_count: meters.len(),
    }
}

/// Summary plus flag counts for one meter; `None` when the meter has no
/// reconciled output.
pub fn meter_detail(raw_readings: &[RawReading], meter_id: &str) -> Option<MeterDetail> {
    let readings = readings_for_meter(raw_readings, meter_id);
    if readings.is_empty() {
        return None;
    }

    let summary = meter_summaries(raw_readings)
        .into_iter()
        .find(|s| s.meter_id == meter_id)?;

    Some(MeterDetail {
        summary,
        flags: flag_breakdown(&readings),
    })
}
