//! Seed data for local development.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{Database, PredictionRecord, Role},
    identity::password::hash_password,
    prediction::QualityLabel,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo1234";

/// Create the demo account with two sample readings in one transaction.
/// Returns false when the account already exists, in which case nothing is
/// written.
pub async fn load_demo_data(db: &Database) -> Result<bool> {
    let now = Utc::now();
    let history = [
        (7.1, 310.0, QualityLabel::Safe, Duration::hours(2)),
        (9.0, 1200.0, QualityLabel::Contaminated, Duration::hours(1)),
    ]
    .into_iter()
    .map(|(ph, tds, result, age)| PredictionRecord {
        id: Uuid::new_v4().to_string(),
        user_id: 0,
        ph,
        tds,
        result,
        created_at: now - age,
    })
    .collect();

    let created = db
        .insert_user_with_history(
            DEMO_USERNAME,
            &hash_password(DEMO_PASSWORD),
            Role::User,
            history,
        )
        .await
        .context("Failed to load demo data")?;

    match created {
        Some(user) => {
            log_info!("demo data loaded for user '{}'", user.username);
            Ok(true)
        }
        None => {
            log_info!("demo user already exists; skipping");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::password::verify_password;

    #[tokio::test]
    async fn seeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();

        assert!(load_demo_data(&db).await.unwrap());
        assert!(!load_demo_data(&db).await.unwrap());

        let user = db.find_user_by_username(DEMO_USERNAME).await.unwrap().unwrap();
        assert!(verify_password(DEMO_PASSWORD, &user.password_hash));

        let history = db.list_predictions_for_user(user.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].result, QualityLabel::Contaminated);
        assert_eq!(history[1].result, QualityLabel::Safe);
        assert_eq!(history[1].tds, 310.0);
    }
}
