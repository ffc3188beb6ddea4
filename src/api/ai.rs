//! Handlers for `/api/ai/`. Each validates its input, calls the gateway and
//! wraps the result; provider failures become the public AI error messages
//! through `From<AiError> for ApiError`.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use consilium_core::models::CreateCmeTopicInput;
use consilium_core::validation::{MAX_TEXT_LEN, MAX_TOPIC_LEN};
use consilium_core::FieldErrors;

use crate::ai::Language;

use super::extract::{CurrentUser, JsonBody};
use super::{ApiError, AppState};

/// Analyses used when the caller does not supply any.
const CME_HISTORY_LIMIT: usize = 10;

fn parse_language(raw: Option<&str>, errors: &mut FieldErrors) -> Language {
    match raw {
        None => Language::default(),
        Some(code) => Language::from_code(code).unwrap_or_else(|| {
            errors.add(
                "language",
                format!(
                    "Invalid language. Must be one of: {}",
                    Language::CODES.join(", ")
                ),
            );
            Language::default()
        }),
    }
}

fn check_patient_data(value: &Value, errors: &mut FieldErrors) {
    if !value.is_object() {
        errors.add("patient_data", "Patient data must be a dictionary.");
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientRequest {
    patient_data: Value,
    #[serde(default)]
    language: Option<String>,
}

impl PatientRequest {
    fn validate(&self) -> Result<Language, ApiError> {
        let mut errors = FieldErrors::new();
        check_patient_data(&self.patient_data, &mut errors);
        let language = parse_language(self.language.as_deref(), &mut errors);
        errors.into_result().map_err(ApiError::Validation)?;
        Ok(language)
    }
}

pub async fn clarifying_questions(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PatientRequest>,
) -> Result<Json<Value>, ApiError> {
    let language = body.validate()?;
    let questions = state
        .ai
        .clarifying_questions(&body.patient_data, language)
        .await?;
    Ok(Json(json!({ "questions": questions })))
}

pub async fn recommend_specialists(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PatientRequest>,
) -> Result<Json<Value>, ApiError> {
    let language = body.validate()?;
    let recommendations = state
        .ai
        .recommend_specialists(&body.patient_data, language)
        .await?;
    Ok(Json(json!({ "recommendations": recommendations })))
}

pub async fn initial_diagnoses(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PatientRequest>,
) -> Result<Json<Value>, ApiError> {
    let language = body.validate()?;
    let diagnoses = state
        .ai
        .initial_diagnoses(&body.patient_data, language)
        .await?;
    Ok(Json(json!({ "diagnoses": diagnoses })))
}

#[derive(Debug, Deserialize)]
pub struct FinalReportRequest {
    patient_data: Value,
    debate_history: Vec<Value>,
    diagnoses: Vec<Value>,
    #[serde(default)]
    language: Option<String>,
}

pub async fn final_report(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<FinalReportRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = FieldErrors::new();
    check_patient_data(&body.patient_data, &mut errors);
    let language = parse_language(body.language.as_deref(), &mut errors);
    errors.into_result().map_err(ApiError::Validation)?;

    let report = state
        .ai
        .final_report(
            &body.patient_data,
            &body.debate_history,
            &body.diagnoses,
            language,
        )
        .await?;
    Ok(Json(json!(report)))
}

#[derive(Debug, Deserialize)]
pub struct DrugInteractionRequest {
    medications: Vec<String>,
    #[serde(default)]
    language: Option<String>,
}

pub async fn drug_interactions(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<DrugInteractionRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = FieldErrors::new();
    let medications: Vec<String> = body
        .medications
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if medications.is_empty() {
        errors.add("medications", "This list may not be empty.");
    }
    let language = parse_language(body.language.as_deref(), &mut errors);
    errors.into_result().map_err(ApiError::Validation)?;

    let interactions = state.ai.drug_interactions(&medications, language).await?;
    Ok(Json(json!({ "interactions": interactions })))
}

#[derive(Debug, Deserialize)]
pub struct CmeTopicsRequest {
    #[serde(default)]
    analyses: Option<Vec<Value>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    save: bool,
}

pub async fn cme_topics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CmeTopicsRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = FieldErrors::new();
    let language = parse_language(body.language.as_deref(), &mut errors);
    errors.into_result().map_err(ApiError::Validation)?;

    let analyses = match body.analyses {
        Some(analyses) => analyses,
        None => state
            .db
            .latest_analyses(user.id, CME_HISTORY_LIMIT)?
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::Internal(format!("serializing analyses: {e}")))?,
    };

    let suggestion = state.ai.cme_topics(&analyses, language).await?;
    if !body.save {
        return Ok(Json(json!({ "topics": suggestion.topics })));
    }

    let sources = owned_analysis_ids(&state, user.id, &analyses)?;
    let inputs: Vec<CreateCmeTopicInput> = suggestion
        .topics
        .iter()
        .filter(|t| !t.topic.trim().is_empty() && !t.relevance.trim().is_empty())
        .map(|t| CreateCmeTopicInput {
            topic: clip(&t.topic, MAX_TOPIC_LEN),
            relevance: clip(&t.relevance, MAX_TEXT_LEN),
            source_analyses: sources.clone(),
            is_completed: false,
        })
        .collect();
    let saved = state.db.create_cme_topics(user.id, inputs)?;
    tracing::info!(account_id = %user.id, saved = saved.len(), "CME topics saved");

    Ok(Json(json!({ "topics": suggestion.topics, "saved": saved })))
}

/// Model output is not the caller's input; cut it to fit instead of
/// rejecting the whole batch.
fn clip(text: &str, max_len: usize) -> String {
    text.trim().chars().take(max_len).collect()
}

/// Ids of the caller's own analyses among `analyses`, in order, deduplicated.
fn owned_analysis_ids(
    state: &AppState,
    user: Uuid,
    analyses: &[Value],
) -> Result<Vec<Uuid>, ApiError> {
    let mut ids = Vec::new();
    for id in analyses
        .iter()
        .take(CME_HISTORY_LIMIT)
        .filter_map(|a| a.get("id").and_then(Value::as_str))
        .filter_map(|raw| Uuid::parse_str(raw).ok())
    {
        if !ids.contains(&id) && state.db.get_analysis(user, id)?.is_some() {
            ids.push(id);
        }
    }
    Ok(ids)
}
