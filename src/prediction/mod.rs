//! Prediction analytics pipeline.
//!
//! raw input -> validator -> classifier (via the model provider) ->
//! analytics -> background history write -> assembled response.

pub mod analytics;
pub mod classifier;
pub mod error;
pub mod history;
pub mod model_provider;
pub mod response;
pub mod validator;

use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;

pub use classifier::{
    classify, Classifier, ClassifierOutput, Confidence, ForestClassifier, InferenceError,
    LabelMap, QualityLabel,
};
pub use error::{HistoryWriteError, PredictionError};
pub use history::{HistoryRecorder, PredictionStore};
pub use model_provider::{resolve_model_path, ModelProvider};
pub use response::PredictionResponse;
pub use validator::{parse_reading, Field, RawValue, Reading, ValidationError};

use crate::db::models::User;

/// Raw pH / TDS values as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionInput {
    #[serde(default, alias = "ph_value")]
    pub ph: Option<RawValue>,
    #[serde(default, alias = "tds_value")]
    pub tds: Option<RawValue>,
}

/// A finished prediction plus the pending history write, if one was started.
#[derive(Debug)]
pub struct Prediction {
    pub response: PredictionResponse,
    pub recording: Option<JoinHandle<()>>,
}

pub struct PredictionService {
    models: Arc<ModelProvider>,
    labels: LabelMap,
    history: HistoryRecorder,
}

impl PredictionService {
    pub fn new(models: Arc<ModelProvider>, labels: LabelMap, history: HistoryRecorder) -> Self {
        Self {
            models,
            labels,
            history,
        }
    }

    pub fn models(&self) -> &ModelProvider {
        &self.models
    }

    /// Validate, classify and analyse one reading.
    ///
    /// Validation and model availability are checked before anything is
    /// written. The history write runs in the background for identified
    /// callers only and cannot change the outcome. Must be called inside a
    /// tokio runtime.
    pub fn predict(
        &self,
        caller: Option<&User>,
        input: &PredictionInput,
    ) -> Result<Prediction, PredictionError> {
        let reading = parse_reading(input.ph.as_ref(), input.tds.as_ref())?;
        let model = self.models.get_model()?;
        let classification = classify(model.as_ref(), &self.labels, &reading)?;

        let recording = caller.map(|user| {
            self.history
                .record(user.id, reading, classification.label.clone())
        });

        Ok(Prediction {
            response: PredictionResponse::assemble(reading, classification),
            recording,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;
    use crate::db::models::{PredictionRecord, Role};

    struct CountingModel {
        class_id: i64,
        calls: AtomicUsize,
    }

    impl Classifier for CountingModel {
        fn predict(&self, samples: &[classifier::Sample]) -> Result<Vec<i64>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.class_id; samples.len()])
        }
    }

    struct ExplodingModel;

    impl Classifier for ExplodingModel {
        fn predict(&self, _samples: &[classifier::Sample]) -> Result<Vec<i64>, InferenceError> {
            Err(InferenceError("bad input shape".into()))
        }
    }

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

    fn user() -> User {
        User {
            id: 42,
            username: "demo".into(),
            password_hash: String::new(),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service_with(model: Arc<dyn Classifier>, store: Arc<MemoryStore>) -> PredictionService {
        PredictionService::new(
            Arc::new(ModelProvider::preloaded(model)),
            LabelMap::default(),
            HistoryRecorder::new(store),
        )
    }

    fn form(ph: &str, tds: &str) -> PredictionInput {
        PredictionInput {
            ph: Some(RawValue::from(ph)),
            tds: Some(RawValue::from(tds)),
        }
    }

    #[tokio::test]
    async fn form_strings_are_classified_and_recorded() {
        let store = Arc::new(MemoryStore::default());
        let model = Arc::new(CountingModel {
            class_id: 0,
            calls: AtomicUsize::new(0),
        });
        let service = service_with(model, store.clone());

        let prediction = service.predict(Some(&user()), &form("7.1", "310")).unwrap();
        assert_eq!(prediction.response.reading, Reading { ph: 7.1, tds: 310.0 });
        assert_eq!(prediction.response.classification.label, QualityLabel::Safe);
        assert_eq!(prediction.response.quality_index.value, 90);

        prediction.recording.expect("recording started").await.unwrap();
        let records = store.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 42);
        assert_eq!(records[0].result, QualityLabel::Safe);
    }

    #[tokio::test]
    async fn anonymous_callers_are_not_recorded() {
        let store = Arc::new(MemoryStore::default());
        let model = Arc::new(CountingModel {
            class_id: 1,
            calls: AtomicUsize::new(0),
        });
        let service = service_with(model, store.clone());

        let prediction = service.predict(None, &form("8.9", "700")).unwrap();
        assert!(prediction.recording.is_none());
        assert_eq!(prediction.response.classification.label, QualityLabel::Moderate);
        assert!(store.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_tds_fails_before_model_is_called() {
        let store = Arc::new(MemoryStore::default());
        let model = Arc::new(CountingModel {
            class_id: 0,
            calls: AtomicUsize::new(0),
        });
        let service = service_with(model.clone(), store.clone());

        let input = PredictionInput {
            ph: Some(RawValue::from("7.0")),
            tds: None,
        };
        let err = service.predict(Some(&user()), &input).unwrap_err();

        assert!(matches!(
            err,
            PredictionError::Validation(ValidationError::MissingInput(Field::Tds))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(store.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn inference_failure_records_nothing() {
        let store = Arc::new(MemoryStore::default());
        let service = service_with(Arc::new(ExplodingModel), store.clone());

        let err = service.predict(Some(&user()), &form("7.0", "100")).unwrap_err();
        assert!(matches!(err, PredictionError::Inference(_)));
        assert!(store.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_model_is_reported_after_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let service = PredictionService::new(
            Arc::new(ModelProvider::new(dir.path().join("absent.json"))),
            LabelMap::default(),
            HistoryRecorder::new(store.clone()),
        );

        let err = service.predict(Some(&user()), &form("", "100")).unwrap_err();
        assert!(matches!(err, PredictionError::Validation(_)));

        let err = service.predict(Some(&user()), &form("7.0", "100")).unwrap_err();
        assert!(matches!(err, PredictionError::ModelUnavailable { .. }));
        assert!(store.records.lock().await.is_empty());
    }

    #[test]
    fn input_accepts_form_field_names() {
        let input: PredictionInput =
            serde_json::from_str(r#"{ "ph_value": "7.2", "tds_value": 240 }"#).unwrap();
        assert_eq!(input.ph, Some(RawValue::from("7.2")));
        assert_eq!(input.tds, Some(RawValue::Number(240.0)));
    }
}
