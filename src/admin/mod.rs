//! Administrative overview of accounts and prediction activity.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{Database, PredictionFilter, PredictionWithOwner, User};

/// Window for counting recently joined accounts.
const ACTIVE_USER_WINDOW_DAYS: i64 = 30;
/// Window for counting recent predictions.
const RECENT_PREDICTION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub total_users: i64,
    pub total_predictions: i64,
    pub active_users: i64,
    pub recent_predictions: i64,
    pub users: Vec<User>,
    pub predictions: Vec<PredictionWithOwner>,
}

/// Build the overview as of `now`. Totals always cover everything; only the
/// prediction listing honours `filter`. Callers must have checked the admin
/// role.
pub async fn build_overview(
    db: &Database,
    now: DateTime<Utc>,
    filter: &PredictionFilter,
) -> Result<AdminOverview> {
    let total_users = db.count_users().await?;
    let total_predictions = db.count_predictions().await?;
    let active_users = db
        .count_users_joined_since(now - Duration::days(ACTIVE_USER_WINDOW_DAYS))
        .await?;
    let recent_predictions = db
        .count_predictions_since(now - Duration::hours(RECENT_PREDICTION_WINDOW_HOURS))
        .await?;

    Ok(AdminOverview {
        total_users,
        total_predictions,
        active_users,
        recent_predictions,
        users: db.list_users().await?,
        predictions: db.list_all_predictions(filter).await?,
    })
}
