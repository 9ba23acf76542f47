use std::sync::Arc;

use meter_core::RawReading;
use tokio::sync::RwLock;

/// Shared in-memory batch of raw readings.
///
/// The reconciled series and every derived summary are recomputed from this
/// batch on each query; nothing processed is ever persisted. API handlers
/// take a snapshot so no lock is held while the core runs.
#[derive(Clone, Default)]
pub struct ReadingStore {
    inner: Arc<RwLock<Vec<RawReading>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, batch: Vec<RawReading>) {
        let mut readings = self.inner.write().await;
        readings.extend(batch);
    }

    pub async fn snapshot(&self) -> Vec<RawReading> {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
