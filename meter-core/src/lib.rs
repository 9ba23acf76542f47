pub mod aggregate;
pub mod domain;
pub mod reconcile;

pub use domain::{ProcessedReading, QualityFlag, RawReading};
pub use reconcile::process;
