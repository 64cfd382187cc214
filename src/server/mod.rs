//! JSON HTTP surface over the prediction, identity and admin services.

mod error;
mod extract;
mod handlers;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::{db::User, identity::IdentityError, AppState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/password/reset", post(handlers::reset_password))
        .route("/api/predict", post(handlers::predict))
        .route("/api/history", get(handlers::history))
        .route("/api/admin/overview", get(handlers::admin_overview))
        .route("/api/admin/users/{id}", delete(handlers::delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), check_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = state.settings.bind_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log_info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server stopped unexpectedly")?;

    log_info!("server shut down");
    Ok(())
}

/// Browser requests must come from a configured origin. Requests without an
/// `Origin` header (curl, server-to-server) pass.
async fn check_origin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|origin| state.settings.origin_allowed(origin))
            .unwrap_or(false);
        if !allowed {
            return ApiError::OriginRejected.into_response();
        }
    }
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The caller behind the bearer token. No token means anonymous; a token
/// that no longer resolves is an error rather than a silent downgrade.
async fn optional_caller(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    match state.identity.resolve_session(token).await? {
        Some(user) => Ok(Some(user)),
        None => Err(IdentityError::Unauthenticated.into()),
    }
}

async fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    optional_caller(state, headers)
        .await?
        .ok_or_else(|| IdentityError::Unauthenticated.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(bearer_token(&headers), None);
    }
}
