use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_label},
    models::{PredictionFilter, PredictionRecord, PredictionWithOwner},
};
use crate::prediction::PredictionStore;

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub(super) fn insert_prediction_row(conn: &Connection, record: &PredictionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO predictions (id, user_id, ph_input, tds_input, result, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.user_id,
            record.ph,
            record.tds,
            record.result.storage_value(),
            format_datetime(&record.created_at),
        ],
    )?;
    Ok(())
}

fn row_to_prediction(row: &Row) -> Result<PredictionRecord> {
    let created_at: String = row.get("created_at")?;
    let result: String = row.get("result")?;

    Ok(PredictionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        ph: row.get("ph_input")?,
        tds: row.get("tds_input")?,
        result: parse_label(result),
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| insert_prediction_row(conn, &record))
            .await
    }

    /// A user's history, newest first.
    pub async fn list_predictions_for_user(&self, user_id: i64) -> Result<Vec<PredictionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, ph_input, tds_input, result, created_at
                 FROM predictions
                 WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_prediction(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Predictions matching `filter` with their owner's username, newest
    /// first. Username, result and search comparisons ignore ASCII case.
    pub async fn list_all_predictions(
        &self,
        filter: &PredictionFilter,
    ) -> Result<Vec<PredictionWithOwner>> {
        let filter = filter.clone().normalized();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.user_id, p.ph_input, p.tds_input, p.result, p.created_at,
                        u.username
                 FROM predictions p
                 JOIN users u ON u.id = p.user_id
                 WHERE (?1 IS NULL OR u.username = ?1 COLLATE NOCASE)
                   AND (?2 IS NULL OR p.result = ?2 COLLATE NOCASE)
                   AND (?3 IS NULL OR p.created_at >= ?3)
                   AND (?4 IS NULL
                        OR u.username LIKE ?4 ESCAPE '\\'
                        OR p.result LIKE ?4 ESCAPE '\\')
                 ORDER BY p.created_at DESC",
            )?;

            let since = filter.since.as_ref().map(format_datetime);
            let search = filter.search.as_deref().map(like_pattern);
            let mut rows = stmt.query(params![filter.username, filter.result, since, search])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(PredictionWithOwner {
                    record: row_to_prediction(row)?,
                    username: row.get("username")?,
                });
            }

            Ok(records)
        })
        .await
    }

    pub async fn count_predictions(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    pub async fn count_predictions_since(&self, since: DateTime<Utc>) -> Result<i64> {
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM predictions WHERE created_at >= ?1",
                params![format_datetime(&since)],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl PredictionStore for Database {
    async fn save_prediction(&self, record: PredictionRecord) -> Result<()> {
        Database::insert_prediction(self, &record).await
    }
}
