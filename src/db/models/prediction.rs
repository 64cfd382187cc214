//! Persisted prediction history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prediction::QualityLabel;

/// One classification outcome recorded for a user. Rows are insert-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    pub user_id: i64,
    pub ph: f64,
    pub tds: f64,
    pub result: QualityLabel,
    pub created_at: DateTime<Utc>,
}

/// History row joined with the owner's username for the admin overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWithOwner {
    #[serde(flatten)]
    pub record: PredictionRecord,
    pub username: String,
}

/// Narrows the admin listing. Every criterion is optional and they combine
/// with AND. `search` matches a substring of the username or the result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionFilter {
    pub username: Option<String>,
    pub result: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl PredictionFilter {
    /// Blank text criteria (e.g. `?username=`) mean "no filter".
    pub fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };
        Self {
            username: clean(self.username),
            result: clean(self.result),
            since: self.since,
            search: clean(self.search),
        }
    }
}
