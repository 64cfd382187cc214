//! Accounts, credentials and login sessions.

pub mod password;
pub mod sessions;

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

pub use sessions::{DatabaseSessionStore, MemorySessionStore, SessionStore};

use crate::db::{Database, Role, Session, User};
use password::{hash_password, verify_password};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("All fields required.")]
    MissingFields,
    #[error("Username already exists.")]
    UsernameTaken,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User not found.")]
    UnknownUser,
    #[error("Login required.")]
    Unauthenticated,
    #[error("Administrator access required.")]
    Forbidden,
    #[error("Administrators cannot delete their own account.")]
    SelfDeletion,
    #[error("identity storage failure: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        IdentityError::Storage(format!("{err:#}"))
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Checks the fields every password form shares.
fn check_new_password(password: &str, confirmation: &str) -> IdentityResult<()> {
    if password.is_empty() || confirmation.is_empty() {
        return Err(IdentityError::MissingFields);
    }
    if password != confirmation {
        return Err(IdentityError::PasswordMismatch);
    }
    Ok(())
}

pub struct IdentityService {
    db: Database,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl IdentityService {
    pub fn new(db: Database, sessions: Arc<dyn SessionStore>, session_ttl: Duration) -> Self {
        Self {
            db,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> IdentityResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(IdentityError::MissingFields);
        }
        check_new_password(password, confirmation)?;

        let user = self
            .db
            .insert_user(username, &hash_password(password), Role::User)
            .await?
            .ok_or(IdentityError::UsernameTaken)?;

        log_info!("registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> IdentityResult<User> {
        let user = self
            .db
            .find_user_by_username(username.trim())
            .await?
            .filter(|user| verify_password(password, &user.password_hash));

        match user {
            Some(user) => Ok(user),
            None => {
                log_warn!("failed login attempt for '{}'", username.trim());
                Err(IdentityError::InvalidCredentials)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> IdentityResult<(User, Session)> {
        let user = self.authenticate(username, password).await?;
        let session = self.sessions.create(user.id, self.session_ttl).await?;
        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> IdentityResult<()> {
        self.sessions.remove(token).await?;
        Ok(())
    }

    /// The user behind a session token, if the session is live.
    pub async fn resolve_session(&self, token: &str) -> IdentityResult<Option<User>> {
        let Some(session) = self.sessions.get(token, Utc::now()).await? else {
            return Ok(None);
        };
        Ok(self.db.find_user_by_id(session.user_id).await?)
    }

    /// Forgot-password flow: replace the password of an existing account.
    pub async fn set_new_password(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> IdentityResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(IdentityError::MissingFields);
        }
        check_new_password(password, confirmation)?;

        if !self.db.update_password(username, &hash_password(password)).await? {
            return Err(IdentityError::UnknownUser);
        }
        log_info!("password reset for {username}");
        Ok(())
    }

    pub async fn grant_admin(&self, username: &str) -> IdentityResult<()> {
        if !self.db.set_user_role(username.trim(), Role::Admin).await? {
            return Err(IdentityError::UnknownUser);
        }
        log_info!("granted admin role to {}", username.trim());
        Ok(())
    }

    /// Admin-only account removal. History and stored sessions cascade with
    /// the row; in-memory sessions stop resolving once the user is gone.
    pub async fn delete_user(&self, actor: &User, user_id: i64) -> IdentityResult<()> {
        self.require_admin(actor)?;
        if actor.id == user_id {
            return Err(IdentityError::SelfDeletion);
        }
        if !self.db.delete_user(user_id).await? {
            return Err(IdentityError::UnknownUser);
        }
        log_warn!("user {user_id} deleted by {}", actor.username);
        Ok(())
    }

    pub fn require_admin(&self, user: &User) -> IdentityResult<()> {
        if user.is_admin() {
            Ok(())
        } else {
            Err(IdentityError::Forbidden)
        }
    }
}
