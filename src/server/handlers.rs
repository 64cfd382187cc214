use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    bearer_token,
    extract::{ApiJson, ApiPath, ApiQuery},
    optional_caller, require_caller, ApiError,
};
use crate::{
    admin::{build_overview, AdminOverview},
    db::{PredictionFilter, PredictionRecord, User},
    identity::IdentityError,
    prediction::{PredictionInput, PredictionResponse},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct CredentialsForm {
    username: String,
    #[serde(alias = "password1")]
    password: String,
    #[serde(alias = "confirm_password", alias = "password2")]
    confirm_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginResponse {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryResponse {
    predictions: Vec<PredictionRecord>,
}

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "modelLoaded": state.predictions.models().is_loaded(),
    }))
}

pub(super) async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<CredentialsForm>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .identity
        .register(&form.username, &form.password, &form.confirm_password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn login(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<CredentialsForm>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (user, session) = state.identity.login(&form.username, &form.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(IdentityError::Unauthenticated)?;
    state.identity.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn reset_password(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<CredentialsForm>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .identity
        .set_new_password(&form.username, &form.password, &form.confirm_password)
        .await?;
    Ok(Json(json!({ "status": "Password updated." })))
}

/// Anonymous callers get a result; signed-in callers also get a history
/// entry written in the background.
pub(super) async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<PredictionInput>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let caller = optional_caller(&state, &headers).await?;
    let prediction = state.predictions.predict(caller.as_ref(), &input)?;
    Ok(Json(prediction.response))
}

pub(super) async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = require_caller(&state, &headers).await?;
    let predictions = state.db.list_predictions_for_user(user.id).await?;
    Ok(Json(HistoryResponse { predictions }))
}

/// Optional `username`, `result`, `since` (RFC 3339) and `search` query
/// parameters narrow the prediction listing.
pub(super) async fn admin_overview(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(filter): ApiQuery<PredictionFilter>,
) -> Result<Json<AdminOverview>, ApiError> {
    let user = require_caller(&state, &headers).await?;
    state.identity.require_admin(&user)?;
    Ok(Json(build_overview(&state.db, Utc::now(), &filter).await?))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let actor = require_caller(&state, &headers).await?;
    state.identity.delete_user(&actor, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
