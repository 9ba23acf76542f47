//! The reconciliation core: deduplication, chronological ordering, per-meter
//! pairwise classification, and the final merge sort.
//!
//! The whole pass is pure and synchronous. Callers hand in a fully
//! materialized batch in any order and get back the hourly series sorted by
//! `(hour, meter_id)`.

use std::collections::{BTreeMap, HashSet};

use time::Duration;

use crate::domain::{hour_bucket, ProcessedReading, QualityFlag, RawReading};

/// Reconcile a raw reading batch into the hourly consumption series.
///
/// Input order is irrelevant. Exact duplicates (same meter, same instant)
/// collapse to their first occurrence. Meters with fewer than two readings
/// after deduplication contribute nothing.
pub fn process(raw_readings: &[RawReading]) -> Vec<ProcessedReading> {
    if raw_readings.is_empty() {
        return Vec::new();
    }

    let sanitized = sanitize(raw_readings);
    let by_meter = group_by_meter(&sanitized);

    let mut processed = Vec::new();
    for readings in by_meter.values() {
        if readings.len() < 2 {
            continue;
        }
        for pair in readings.windows(2) {
            processed.extend(reconcile_pair(pair[0], pair[1]));
        }
    }

    // Per-meter walks emit in hour order already, but the merged output must
    // never depend on map iteration order.
    processed.sort_by(|a, b| a.hour.cmp(&b.hour).then_with(|| a.meter_id.cmp(&b.meter_id)));
    processed
}

/// Drop exact duplicates (first occurrence wins) and order the batch by
/// timestamp, ties broken by meter id.
fn sanitize(readings: &[RawReading]) -> Vec<&RawReading> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&RawReading> = Vec::with_capacity(readings.len());

    for reading in readings {
        if seen.insert((reading.meter_id.as_str(), reading.timestamp)) {
            unique.push(reading);
        }
    }

    unique.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.meter_id.cmp(&b.meter_id))
    });
    unique
}

/// Partition the sanitized batch per meter, preserving its order.
fn group_by_meter<'a>(sanitized: &[&'a RawReading]) -> BTreeMap<&'a str, Vec<&'a RawReading>> {
    let mut grouped: BTreeMap<&str, Vec<&RawReading>> = BTreeMap::new();
    for &reading in sanitized {
        grouped
            .entry(reading.meter_id.as_str())
            .or_default()
            .push(reading);
    }
    grouped
}

/// Classify one consecutive pair of readings and emit its hourly records.
///
/// A backward counter is a reset: one record at the later reading's hour,
/// carrying the post-reset raw value. Otherwise the hour distance between
/// the two truncated timestamps decides: adjacent hours emit one normal
/// delta at the earlier hour, a wider span distributes the delta evenly
/// across every hour the gap covers, and a same-hour pair emits nothing.
fn reconcile_pair(previous: &RawReading, current: &RawReading) -> Vec<ProcessedReading> {
    if current.cumulative_volume < previous.cumulative_volume {
        return vec![ProcessedReading {
            meter_id: current.meter_id.clone(),
            hour: hour_bucket(current.timestamp),
            consumption: current.cumulative_volume,
            flag: QualityFlag::CounterReset,
        }];
    }

    let prev_hour = hour_bucket(previous.timestamp);
    let curr_hour = hour_bucket(current.timestamp);
    let hours_diff = (curr_hour - prev_hour).whole_hours();
    let delta = current.cumulative_volume - previous.cumulative_volume;

    match hours_diff {
        1 => vec![ProcessedReading {
            meter_id: previous.meter_id.clone(),
            hour: prev_hour,
            consumption: delta,
            flag: QualityFlag::Normal,
        }],
        h if h > 1 => {
            let per_hour = delta / h as f64;
            (0..h)
                .map(|i| ProcessedReading {
                    meter_id: previous.meter_id.clone(),
                    hour: prev_hour + Duration::hours(i),
                    consumption: per_hour,
                    flag: QualityFlag::GapEstimated,
                })
                .collect()
        }
        // Same hour bucket, counter unchanged or increased: the transition
        // is below the output resolution and is dropped.
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::OffsetDateTime;

    const EPSILON: f64 = 1e-9;

    fn reading(meter_id: &str, timestamp: OffsetDateTime, volume: f64) -> RawReading {
        RawReading {
            meter_id: meter_id.to_string(),
            timestamp,
            cumulative_volume: volume,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(process(&[]).is_empty());
    }

    #[test]
    fn adjacent_hours_produce_one_normal_record() {
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 09:05:00 UTC), 10045.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].meter_id, "MTR-001");
        assert_eq!(result[0].hour, datetime!(2025-02-05 08:00:00 UTC));
        assert_eq!(result[0].consumption, 45.0);
        assert_eq!(result[0].flag, QualityFlag::Normal);
    }

    #[test]
    fn gap_distributes_consumption_evenly() {
        let readings = vec![
            reading("MTR-002", datetime!(2025-02-05 10:07:00 UTC), 52230.0),
            reading("MTR-002", datetime!(2025-02-05 14:02:00 UTC), 52530.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 4);
        for (i, record) in result.iter().enumerate() {
            assert_eq!(record.flag, QualityFlag::GapEstimated);
            assert_eq!(record.consumption, 75.0);
            assert_eq!(
                record.hour,
                datetime!(2025-02-05 10:00:00 UTC) + Duration::hours(i as i64)
            );
        }

        let total: f64 = result.iter().map(|r| r.consumption).sum();
        assert!((total - 300.0).abs() < EPSILON);
    }

    #[test]
    fn long_gap_conserves_total_within_epsilon() {
        // 33 hourly shares of 1/33 must still sum back to the delta.
        let readings = vec![
            reading("MTR-002", datetime!(2025-02-05 10:30:00 UTC), 500.0),
            reading("MTR-002", datetime!(2025-02-06 19:10:00 UTC), 501.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 33);
        let total: f64 = result.iter().map(|r| r.consumption).sum();
        assert!((total - 1.0).abs() < EPSILON);
    }

    #[test]
    fn gap_spans_midnight() {
        let readings = vec![
            reading("MTR-002", datetime!(2025-02-05 23:10:00 UTC), 100.0),
            reading("MTR-002", datetime!(2025-02-06 01:05:00 UTC), 160.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].hour, datetime!(2025-02-05 23:00:00 UTC));
        assert_eq!(result[1].hour, datetime!(2025-02-06 00:00:00 UTC));
        assert_eq!(result[0].consumption, 30.0);
        assert_eq!(result[1].consumption, 30.0);
    }

    #[test]
    fn counter_reset_emits_single_record_at_later_hour() {
        let readings = vec![
            reading("MTR-003", datetime!(2025-02-05 12:03:00 UTC), 890410.0),
            reading("MTR-003", datetime!(2025-02-05 13:01:00 UTC), 45.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hour, datetime!(2025-02-05 13:00:00 UTC));
        assert_eq!(result[0].consumption, 45.0);
        assert_eq!(result[0].flag, QualityFlag::CounterReset);
    }

    #[test]
    fn counter_reset_ignores_elapsed_time() {
        // Days apart, still exactly one reset record, no interpolation.
        let readings = vec![
            reading("MTR-003", datetime!(2025-02-05 12:03:00 UTC), 890410.0),
            reading("MTR-003", datetime!(2025-02-09 06:44:00 UTC), 12.5),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hour, datetime!(2025-02-09 06:00:00 UTC));
        assert_eq!(result[0].consumption, 12.5);
        assert_eq!(result[0].flag, QualityFlag::CounterReset);
    }

    #[test]
    fn exact_duplicates_collapse_to_first_occurrence() {
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 09:05:00 UTC), 10045.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hour, datetime!(2025-02-05 08:00:00 UTC));
        assert_eq!(result[0].consumption, 45.0);
        assert_eq!(result[0].flag, QualityFlag::Normal);
    }

    #[test]
    fn same_instant_on_different_meters_is_not_a_duplicate() {
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 100.0),
            reading("MTR-002", datetime!(2025-02-05 08:02:00 UTC), 200.0),
            reading("MTR-001", datetime!(2025-02-05 09:02:00 UTC), 110.0),
            reading("MTR-002", datetime!(2025-02-05 09:02:00 UTC), 230.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].meter_id, "MTR-001");
        assert_eq!(result[0].consumption, 10.0);
        assert_eq!(result[1].meter_id, "MTR-002");
        assert_eq!(result[1].consumption, 30.0);
    }

    #[test]
    fn same_hour_pair_is_dropped() {
        // Two readings inside one hour bucket with a rising counter emit
        // nothing; the transition is deliberately discarded.
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 100.0),
            reading("MTR-001", datetime!(2025-02-05 08:40:00 UTC), 130.0),
        ];

        assert!(process(&readings).is_empty());
    }

    #[test]
    fn single_reading_meter_contributes_nothing() {
        let readings = vec![reading(
            "MTR-001",
            datetime!(2025-02-05 08:02:00 UTC),
            10000.0,
        )];

        assert!(process(&readings).is_empty());
    }

    #[test]
    fn meters_are_reconciled_independently() {
        let meter_a = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 09:05:00 UTC), 10045.0),
        ];
        let meter_b = vec![
            reading("MTR-002", datetime!(2025-02-05 08:05:00 UTC), 52100.0),
            reading("MTR-002", datetime!(2025-02-05 09:03:00 UTC), 52160.0),
        ];

        let mut combined = meter_a.clone();
        combined.extend(meter_b.clone());
        let result = process(&combined);

        let for_a: Vec<_> = result.iter().filter(|r| r.meter_id == "MTR-001").cloned().collect();
        let for_b: Vec<_> = result.iter().filter(|r| r.meter_id == "MTR-002").cloned().collect();

        assert_eq!(for_a, process(&meter_a));
        assert_eq!(for_b, process(&meter_b));
    }

    #[test]
    fn output_sorted_by_hour_then_meter() {
        let readings = vec![
            reading("MTR-B", datetime!(2025-02-05 08:10:00 UTC), 100.0),
            reading("MTR-B", datetime!(2025-02-05 12:20:00 UTC), 180.0),
            reading("MTR-A", datetime!(2025-02-05 09:01:00 UTC), 500.0),
            reading("MTR-A", datetime!(2025-02-05 10:59:00 UTC), 520.0),
        ];

        let result = process(&readings);

        assert!(!result.is_empty());
        for pair in result.windows(2) {
            let key_a = (pair[0].hour, pair[0].meter_id.as_str());
            let key_b = (pair[1].hour, pair[1].meter_id.as_str());
            assert!(key_a <= key_b, "output out of order: {key_a:?} > {key_b:?}");
        }
    }

    #[test]
    fn non_utc_offsets_align_to_utc_buckets() {
        // 09:02+01:00 and 10:05+01:00 are 08:02Z and 09:05Z.
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 09:02:00 +1), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 10:05:00 +1), 10045.0),
        ];

        let result = process(&readings);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hour, datetime!(2025-02-05 08:00:00 UTC));
        assert_eq!(result[0].flag, QualityFlag::Normal);
    }

    #[test]
    fn mixed_scenario_covers_all_flags() {
        let readings = vec![
            reading("MTR-001", datetime!(2025-02-05 08:02:00 UTC), 10000.0),
            reading("MTR-001", datetime!(2025-02-05 09:05:00 UTC), 10045.0),
            reading("MTR-001", datetime!(2025-02-05 11:07:00 UTC), 10140.0),
            reading("MTR-001", datetime!(2025-02-05 12:01:00 UTC), 10.0),
        ];

        let result = process(&readings);

        let normal: Vec<_> = result.iter().filter(|r| r.flag == QualityFlag::Normal).collect();
        let gap: Vec<_> = result
            .iter()
            .filter(|r| r.flag == QualityFlag::GapEstimated)
            .collect();
        let reset: Vec<_> = result
            .iter()
            .filter(|r| r.flag == QualityFlag::CounterReset)
            .collect();

        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].hour, datetime!(2025-02-05 08:00:00 UTC));
        assert_eq!(normal[0].consumption, 45.0);

        assert_eq!(gap.len(), 2);
        assert_eq!(gap[0].hour, datetime!(2025-02-05 09:00:00 UTC));
        assert_eq!(gap[1].hour, datetime!(2025-02-05 10:00:00 UTC));
        assert_eq!(gap[0].consumption, 47.5);
        assert_eq!(gap[1].consumption, 47.5);

        assert_eq!(reset.len(), 1);
        assert_eq!(reset[0].hour, datetime!(2025-02-05 12:00:00 UTC));
        assert_eq!(reset[0].consumption, 10.0);
    }
}
