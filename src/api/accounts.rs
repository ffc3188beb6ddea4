//! Registration, login and profile handlers.
//!
//! Calls that hash or verify a password are CPU bound and run on the
//! blocking pool.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use consilium_core::models::{Account, CreateAccountInput, TokenPair, UpdateAccountInput};
use consilium_core::StoreError;

use super::extract::{CurrentUser, JsonBody};
use super::{ApiError, AppState};

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    account: CreateAccountInput,
    password_confirm: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    user: Account,
    tokens: TokenPair,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if body.account.password != body.password_confirm {
        return Err(ApiError::field("password", "Password fields didn't match."));
    }

    let db = state.db.clone();
    let iterations = state.password_iterations;
    let user = blocking(move || db.create_account(body.account, iterations)).await?;
    let tokens = state.db.issue_tokens(user.id, &state.tokens)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { user, tokens })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    phone: String,
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || db.verify_credentials(&body.phone, &body.password))
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "login failed"))?;
    let tokens = state.db.issue_tokens(user.id, &state.tokens)?;
    tracing::info!(account_id = %user.id, "login");

    Ok(Json(AuthResponse { user, tokens }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // the body is optional here
    let request: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };
    if let Some(refresh) = request.refresh_token {
        state
            .db
            .revoke_refresh_token(user.id, &refresh, &state.tokens)
            .map_err(|e| match e {
                StoreError::InvalidToken => ApiError::BadRequest("Invalid token".into()),
                other => other.into(),
            })?;
    }
    Ok(Json(json!({ "message": "Successfully logged out" })))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    refresh: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let access = state.db.refresh_access_token(&body.refresh, &state.tokens)?;
    Ok(Json(json!({ "access": access })))
}

pub async fn profile(CurrentUser(user): CurrentUser) -> Json<Account> {
    Json(user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<UpdateAccountInput>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.db.update_account(user.id, body)?))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let iterations = state.password_iterations;
    blocking(move || {
        db.change_password(user.id, &body.old_password, &body.new_password, iterations)
    })
    .await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}
