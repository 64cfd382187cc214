use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, ToSql};

use super::predictions::insert_prediction_row;
use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_role},
    models::{PredictionRecord, Role, User},
};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

fn row_to_user(row: &Row) -> Result<User> {
    let role: String = row.get("role")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        role: parse_role(&role)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_user(conn: &Connection, filter: &str, value: &dyn ToSql) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter} = ?1");
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query([value])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_user(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Insert a new account. Returns `None` when the username is taken.
    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Option<User>> {
        self.insert_user_with_history(username, password_hash, role, Vec::new())
            .await
    }

    /// Insert a new account together with prior history in one transaction.
    /// Each record's `user_id` is replaced by the new account's id. Returns
    /// `None`, writing nothing, when the username is taken.
    pub async fn insert_user_with_history(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        history: Vec<PredictionRecord>,
    ) -> Result<Option<User>> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let now = format_datetime(&Utc::now());
            let inserted = tx.execute(
                "INSERT INTO users (username, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(username) DO NOTHING",
                params![username, password_hash, role.as_str(), now, now],
            )?;

            if inserted == 0 {
                return Ok(None);
            }

            let user_id = tx.last_insert_rowid();
            for record in history {
                insert_prediction_row(&tx, &PredictionRecord { user_id, ..record })?;
            }

            let user = select_user(&tx, "id", &user_id)?
                .ok_or_else(|| anyhow!("User not found after insert"))?;
            tx.commit()?;
            Ok(Some(user))
        })
        .await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.execute(move |conn| select_user(conn, "username", &username))
            .await
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        self.execute(move |conn| select_user(conn, "id", &user_id))
            .await
    }

    /// Replace the stored password hash. Returns false for an unknown user.
    pub async fn update_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE username = ?3",
                params![password_hash, format_datetime(&Utc::now()), username],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn set_user_role(&self, username: &str, role: Role) -> Result<bool> {
        let username = username.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE username = ?3",
                params![role.as_str(), format_datetime(&Utc::now()), username],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// All accounts, most recently joined first.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.execute(|conn| {
            let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query([])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(row_to_user(row)?);
            }
            Ok(users)
        })
        .await
    }

    pub async fn count_users(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    pub async fn count_users_joined_since(&self, since: DateTime<Utc>) -> Result<i64> {
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE created_at >= ?1",
                params![format_datetime(&since)],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    /// Remove an account; its predictions and sessions go with it.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
