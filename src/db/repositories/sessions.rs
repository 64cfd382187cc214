use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::Session,
};

fn row_to_session(row: &Row) -> Result<Session> {
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;

    Ok(Session {
        token: row.get("token")?,
        user_id: row.get("user_id")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        expires_at: parse_datetime(&expires_at, "expires_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.token,
                    record.user_id,
                    format_datetime(&record.created_at),
                    format_datetime(&record.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let token = token.to_string();
        self.execute(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT token, user_id, created_at, expires_at
                     FROM sessions
                     WHERE token = ?1",
                    params![token],
                    |row| Ok(row_to_session(row)),
                )
                .optional()?;

            raw.transpose()
        })
        .await
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
        .await
    }

    /// Drop sessions that expired before `now`; returns how many were removed.
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![format_datetime(&now)],
            )?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::models::Role;

    #[tokio::test]
    async fn stores_and_purges_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let user = db.insert_user("dave", "h", Role::User).await.unwrap().unwrap();
        let now = Utc::now();

        let live = Session {
            token: "live".into(),
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::hours(1),
        };
        let stale = Session {
            token: "stale".into(),
            user_id: user.id,
            created_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        };
        db.insert_session(&live).await.unwrap();
        db.insert_session(&stale).await.unwrap();

        let fetched = db.get_session("live").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user.id);

        assert_eq!(db.purge_expired_sessions(now).await.unwrap(), 1);
        assert!(db.get_session("stale").await.unwrap().is_none());

        db.delete_session("live").await.unwrap();
        assert!(db.get_session("live").await.unwrap().is_none());
    }
}
