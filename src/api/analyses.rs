use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use consilium_core::models::{
    Analysis, AnalysisFilter, AnalysisListItem, AnalysisOrdering, CreateAnalysisInput,
    DashboardStats, Page, PageRequest, UpdateAnalysisInput, RECENT_ANALYSES_LIMIT,
};

use super::extract::{CurrentUser, IdPath, JsonBody, QueryParams};
use super::{ApiError, AppState};

/// Shared by paginated listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    page_size: Option<String>,
}

impl PageQuery {
    /// A non-numeric or zero `page` is as invalid as one past the end.
    /// A bad `page_size` falls back to the default.
    pub fn request(&self) -> Result<PageRequest, ApiError> {
        let page = match self.page.as_deref() {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => Some(n),
                _ => return Err(invalid_page()),
            },
        };
        let page_size = self
            .page_size
            .as_deref()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|n| *n > 0);
        Ok(PageRequest::new(page, page_size))
    }
}

pub fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".into())
}

/// Turn an empty trailing page into 404, the way page-number pagination does.
pub fn checked_page<T>(page: Page<T>, request: PageRequest) -> Result<Json<Page<T>>, ApiError> {
    if page.is_out_of_range(request) {
        return Err(invalid_page());
    }
    Ok(Json(page))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    is_completed: Option<String>,
    patient_id: Option<String>,
    search: Option<String>,
    ordering: Option<String>,
    #[serde(flatten)]
    paging: PageQuery,
}

impl ListQuery {
    fn filter(&self) -> Result<AnalysisFilter, ApiError> {
        let ordering = match self.ordering.as_deref().map(str::trim) {
            None | Some("") => AnalysisOrdering::default(),
            Some(raw) => AnalysisOrdering::from_str(raw).ok_or_else(|| {
                ApiError::field("ordering", format!("Invalid ordering field: {raw}."))
            })?,
        };
        Ok(AnalysisFilter {
            is_completed: self
                .is_completed
                .as_deref()
                .map(|v| v.eq_ignore_ascii_case("true")),
            patient_id: self.patient_id.clone().filter(|p| !p.is_empty()),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ordering,
        })
    }
}

pub async fn list_analyses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Page<AnalysisListItem>>, ApiError> {
    let filter = query.filter()?;
    let request = query.paging.request()?;
    let page = state.db.list_analyses(user.id, &filter, request)?;
    checked_page(page, request)
}

pub async fn create_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CreateAnalysisInput>,
) -> Result<(StatusCode, Json<Analysis>), ApiError> {
    let analysis = state.db.create_analysis(user.id, body)?;
    state.dashboard.invalidate(user.id);
    tracing::info!(account_id = %user.id, analysis_id = %analysis.id, "analysis saved");
    Ok((StatusCode::CREATED, Json(analysis)))
}

pub async fn recent_analyses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Vec<AnalysisListItem>>, ApiError> {
    let filter = query.filter()?;
    Ok(Json(state.db.recent_analyses(
        user.id,
        &filter,
        RECENT_ANALYSES_LIMIT,
    )?))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let generation = state.dashboard.generation();
    if let Some(stats) = state.dashboard.get(user.id) {
        return Ok(Json(stats));
    }
    let stats = state.db.dashboard_stats(user.id)?;
    state.dashboard.insert(user.id, generation, stats.clone());
    Ok(Json(stats))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<Analysis>, ApiError> {
    state
        .db
        .get_analysis(user.id, id)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

/// PUT: the record is replaced, so the fields a new analysis requires must
/// all be present.
pub async fn replace_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
    JsonBody(full): JsonBody<CreateAnalysisInput>,
) -> Result<Json<Analysis>, ApiError> {
    let update = UpdateAnalysisInput {
        patient_id: Some(full.patient_id),
        patient_data: Some(full.patient_data),
        debate_history: Some(full.debate_history),
        final_report: Some(full.final_report),
        differential_diagnoses: Some(full.differential_diagnoses),
        selected_specialists: Some(full.selected_specialists),
        follow_up_history: Some(full.follow_up_history),
        detected_medications: Some(full.detected_medications),
        is_completed: full.is_completed,
    };
    apply_update(&state, user.id, id, update)
}

pub async fn patch_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<UpdateAnalysisInput>,
) -> Result<Json<Analysis>, ApiError> {
    apply_update(&state, user.id, id, body)
}

fn apply_update(
    state: &AppState,
    user: uuid::Uuid,
    id: uuid::Uuid,
    update: UpdateAnalysisInput,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = state
        .db
        .update_analysis(user, id, update)?
        .ok_or_else(ApiError::not_found)?;
    state.dashboard.invalidate(user);
    Ok(Json(analysis))
}

pub async fn delete_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_analysis(user.id, id)? {
        return Err(ApiError::not_found());
    }
    state.dashboard.invalidate(user.id);
    tracing::info!(account_id = %user.id, analysis_id = %id, "analysis deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = state
        .db
        .complete_analysis(user.id, id)?
        .ok_or_else(ApiError::not_found)?;
    state.dashboard.invalidate(user.id);
    Ok(Json(analysis))
}

pub async fn longitudinal_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    IdPath(id): IdPath,
) -> Result<Json<Vec<AnalysisListItem>>, ApiError> {
    state
        .db
        .longitudinal_view(user.id, id)?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}
