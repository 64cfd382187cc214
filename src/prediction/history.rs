use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{classifier::QualityLabel, error::HistoryWriteError, validator::Reading};
use crate::db::models::PredictionRecord;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Write side of the prediction history.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn save_prediction(&self, record: PredictionRecord) -> anyhow::Result<()>;
}

/// Persists prediction records in the background.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn PredictionStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn PredictionStore>) -> Self {
        Self { store }
    }

    /// Spawn the write and return immediately. The outcome is only logged;
    /// the handle lets callers wait for it when they care.
    pub fn record(&self, user_id: i64, reading: Reading, label: QualityLabel) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let record = PredictionRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            ph: reading.ph,
            tds: reading.tds,
            result: label,
            created_at: Utc::now(),
        };

        tokio::spawn(async move {
            let record_id = record.id.clone();
            match store.save_prediction(record).await {
                Ok(()) => log_info!("recorded prediction {record_id} for user {user_id}"),
                Err(err) => {
                    let err = HistoryWriteError {
                        user_id,
                        reason: format!("{err:#}"),
                    };
                    log_error!("{err}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<PredictionRecord>>,
    }

    #[async_trait]
    impl PredictionStore for MemoryStore {
        async fn save_prediction(&self, record: PredictionRecord) -> anyhow::Result<()> {
            self.records.lock().await.push(record);
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PredictionStore for FailingStore {
        async fn save_prediction(&self, _record: PredictionRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn records_reading_and_label() {
        let store = Arc::new(MemoryStore::default());
        let recorder = HistoryRecorder::new(store.clone());

        recorder
            .record(7, Reading { ph: 7.1, tds: 310.0 }, QualityLabel::Safe)
            .await
            .unwrap();

        let records = store.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 7);
        assert_eq!(records[0].ph, 7.1);
        assert_eq!(records[0].result, QualityLabel::Safe);
    }

    #[tokio::test]
    async fn store_failures_do_not_escape_the_task() {
        let recorder = HistoryRecorder::new(Arc::new(FailingStore));
        let joined = recorder
            .record(1, Reading { ph: 7.0, tds: 100.0 }, QualityLabel::Moderate)
            .await;
        assert!(joined.is_ok());
    }
}
