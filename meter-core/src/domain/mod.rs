pub mod reading;
pub mod summary;

pub use reading::{
    hour_bucket, hour_string, parse_timestamp, InvalidTimestamp, ProcessedReading, QualityFlag,
    RawReading,
};
pub use summary::{FlagBreakdown, FleetOverview, MeterDetail, MeterStatus, MeterSummary};
