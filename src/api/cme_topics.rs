use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use consilium_core::models::{CmeTopic, CreateCmeTopicInput, Page};

use super::analyses::{checked_page, PageQuery};
use super::extract::{CurrentUser, IdPath, JsonBody, QueryParams};
use super::{ApiError, AppState};

pub async fn list_topics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Page<CmeTopic>>, ApiError> {
    let request = query.request()?;
    let page = state.db.list_cme_topics(user.id, request)?;
    checked_page(page, request)
}

pub async fn create_topic(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CreateCmeTopicInput>,
) -> Result<(StatusCode, Json<CmeTopic>), ApiError> {
    let topic = state.db.create_cme_topic(user.id, body)?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn get_topic(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<CmeTopic>, ApiError> {
    state
        .db
        .get_cme_topic(user.id, id)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

pub async fn complete_topic(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<CmeTopic>, ApiError> {
    state
        .db
        .complete_cme_topic(user.id, id)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}
