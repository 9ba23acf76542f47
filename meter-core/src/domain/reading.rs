use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, Duration, OffsetDateTime, Time, UtcOffset,
};

/// A raw cumulative-volume reading as reported by a water meter.
///
/// Timestamps are RFC 3339 on the wire and may carry any offset; all hour
/// arithmetic downstream happens in UTC. The counter is the device's
/// lifetime total in liters and only ever moves backward on a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub cumulative_volume: f64,
}

/// One reconciled hour of consumption for a meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReading {
    pub meter_id: String,
    /// Start of the UTC hour this record covers. Always serialized with a
    /// `:00:00Z` suffix.
    #[serde(with = "hour_serde")]
    pub hour: OffsetDateTime,
    pub consumption: f64,
    pub flag: QualityFlag,
}

/// Data-quality tag attached to every reconciled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Delta between readings in adjacent hour buckets.
    Normal,
    /// Evenly distributed share of a delta that spans missing hours.
    GapEstimated,
    /// The counter moved backward; consumption is the post-reset raw value.
    CounterReset,
}

#[derive(thiserror::Error, Debug)]
#[error("invalid timestamp '{input}': {source}")]
pub struct InvalidTimestamp {
    pub input: String,
    #[source]
    pub source: time::error::Parse,
}

/// Parse an RFC 3339 timestamp, e.g. `2025-02-05T08:02:00Z`.
pub fn parse_timestamp(input: &str) -> Result<OffsetDateTime, InvalidTimestamp> {
    OffsetDateTime::parse(input.trim(), &Rfc3339).map_err(|source| InvalidTimestamp {
        input: input.to_string(),
        source,
    })
}

/// Truncate an instant to the start of its UTC hour.
pub fn hour_bucket(ts: OffsetDateTime) -> OffsetDateTime {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.replace_time(Time::MIDNIGHT) + Duration::hours(i64::from(utc.hour()))
}

/// Format an hour-aligned UTC instant as `YYYY-MM-DDTHH:00:00Z`.
pub fn hour_string(hour: OffsetDateTime) -> String {
    let utc = hour.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:00:00Z",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour()
    )
}

/// Serde helpers for hour-aligned fields: emits the `:00:00Z` form, accepts
/// any RFC 3339 string on the way back in.
pub(crate) mod hour_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    pub fn serialize<S>(hour: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::hour_string(*hour))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
    }
}
