use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use consilium_core::models::{CaseLibraryEntry, CreateCaseLibraryInput, Page};

use super::analyses::{checked_page, PageQuery};
use super::extract::{CurrentUser, IdPath, JsonBody, QueryParams};
use super::{ApiError, AppState};

pub async fn list_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Page<CaseLibraryEntry>>, ApiError> {
    let request = query.request()?;
    let page = state.db.list_library(user.id, request)?;
    checked_page(page, request)
}

pub async fn create_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CreateCaseLibraryInput>,
) -> Result<(StatusCode, Json<CaseLibraryEntry>), ApiError> {
    let entry = state.db.add_to_library(user.id, body)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<CaseLibraryEntry>, ApiError> {
    state
        .db
        .get_library_entry(user.id, id)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

pub async fn record_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    let view_count = state
        .db
        .record_case_view(user.id, id)?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(json!({ "view_count": view_count })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<Vec<CaseLibraryEntry>>, ApiError> {
    Ok(Json(state.db.search_library(user.id, &query.q)?))
}
