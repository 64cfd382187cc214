use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{Database, Session};

/// Where login sessions live. Expired sessions are reported as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: i64, ttl: Duration) -> Result<Session>;
    async fn get(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>>;
    async fn remove(&self, token: &str) -> Result<()>;
}

fn new_session(user_id: i64, ttl: Duration) -> Session {
    let created_at = Utc::now();
    Session {
        token: Uuid::new_v4().simple().to_string(),
        user_id,
        created_at,
        expires_at: created_at + ttl,
    }
}

/// Process-local sessions; lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: i64, ttl: Duration) -> Result<Session> {
        let session = new_session(user_id, ttl);
        let mut guard = self.sessions.write().await;
        guard.retain(|_, existing| !existing.is_expired(session.created_at));
        guard.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let guard = self.sessions.read().await;
        Ok(guard
            .get(token)
            .filter(|session| !session.is_expired(now))
            .cloned())
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

/// Sessions persisted in SQLite so they survive restarts.
pub struct DatabaseSessionStore {
    db: Database,
}

impl DatabaseSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseSessionStore {
    async fn create(&self, user_id: i64, ttl: Duration) -> Result<Session> {
        let session = new_session(user_id, ttl);
        self.db.purge_expired_sessions(session.created_at).await?;
        self.db.insert_session(&session).await?;
        Ok(session)
    }

    async fn get(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let session = self.db.get_session(token).await?;
        Ok(session.filter(|session| !session.is_expired(now)))
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.db.delete_session(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    async fn exercise(store: &dyn SessionStore, user_id: i64) {
        let session = store.create(user_id, Duration::hours(1)).await.unwrap();
        let now = Utc::now();

        let found = store.get(&session.token, now).await.unwrap();
        assert_eq!(found.map(|s| s.user_id), Some(user_id));

        let later = now + Duration::hours(2);
        assert!(store.get(&session.token, later).await.unwrap().is_none());

        store.remove(&session.token).await.unwrap();
        assert!(store.get(&session.token, now).await.unwrap().is_none());
        assert!(store.get("missing", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        exercise(&MemorySessionStore::new(), 1).await;
    }

    #[tokio::test]
    async fn database_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let user = db.insert_user("erin", "h", Role::User).await.unwrap().unwrap();
        exercise(&DatabaseSessionStore::new(db), user.id).await;
    }
}
