use std::sync::Arc;

use schemars::{generate::SchemaSettings, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::prompts;
use super::types::*;
use super::{AiError, AiProvider, Language};

pub const MAX_CLARIFYING_QUESTIONS: usize = 10;

const DEFAULT_COUNCIL_MODEL: &str = "Gemini";

const SPECIALIST_MODELS: [(&str, &str); 20] = [
    ("Cardiology", "Gemini"),
    ("Neurology", "Claude"),
    ("Radiology", "GPT"),
    ("Oncology", "Llama"),
    ("Endocrinology", "Grok"),
    ("Gastroenterology", "Gemini"),
    ("Pulmonology", "GPT"),
    ("Nephrology", "Gemini"),
    ("Rheumatology", "Claude"),
    ("Infectious Disease", "Llama"),
    ("Hematology", "Llama"),
    ("Geriatrics", "Gemini"),
    ("Emergency Medicine", "GPT"),
    ("Internal Medicine", "Gemini"),
    ("Pediatrics", "Claude"),
    ("Dermatology", "GPT"),
    ("Orthopedics", "GPT"),
    ("Urology", "Gemini"),
    ("Gynecology", "Gemini"),
    ("Psychiatry", "Claude"),
];

/// Council model that voices a specialty. Unknown specialties get the default.
pub fn specialist_model(specialty: &str) -> &'static str {
    SPECIALIST_MODELS
        .iter()
        .find(|(name, _)| *name == specialty)
        .map(|(_, model)| *model)
        .unwrap_or(DEFAULT_COUNCIL_MODEL)
}

/// Schema handed to the provider for structured output.
fn response_schema<T: JsonSchema>() -> Value {
    let schema = SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();
    let mut value = Value::from(schema);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// Drop a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Suggested CME topics plus the diagnoses they were derived from.
#[derive(Debug, Clone)]
pub struct CmeSuggestion {
    pub diagnoses: Vec<String>,
    pub topics: Vec<CmeTopicSuggestion>,
}

#[derive(Clone)]
pub struct AiGateway {
    provider: Arc<dyn AiProvider>,
}

impl AiGateway {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }

    async fn structured<T>(&self, operation: &'static str, prompt: String) -> Result<T, AiError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = response_schema::<T>();
        let raw = self.provider.generate(&prompt, Some(&schema)).await?;
        serde_json::from_str(strip_code_fences(&raw)).map_err(|e| {
            tracing::warn!(operation, error = %e, "AI response did not match the schema");
            AiError::InvalidResponse(e.to_string())
        })
    }

    pub async fn clarifying_questions(
        &self,
        patient_data: &Value,
        language: Language,
    ) -> Result<Vec<String>, AiError> {
        let reply: ClarifyingQuestions = self
            .structured(
                "clarifying_questions",
                prompts::clarifying_questions(patient_data, language),
            )
            .await?;
        let mut questions = reply.questions;
        questions.truncate(MAX_CLARIFYING_QUESTIONS);
        Ok(questions)
    }

    pub async fn recommend_specialists(
        &self,
        patient_data: &Value,
        language: Language,
    ) -> Result<Vec<SpecialistRecommendation>, AiError> {
        let reply: SpecialtyPicks = self
            .structured(
                "recommend_specialists",
                prompts::recommend_specialists(patient_data, language),
            )
            .await?;
        Ok(reply
            .recommendations
            .into_iter()
            .map(|pick| SpecialistRecommendation {
                model: specialist_model(&pick.specialty).to_string(),
                specialty: pick.specialty,
                reason: pick.reason,
            })
            .collect())
    }

    pub async fn initial_diagnoses(
        &self,
        patient_data: &Value,
        language: Language,
    ) -> Result<Vec<Diagnosis>, AiError> {
        let reply: InitialDiagnoses = self
            .structured(
                "initial_diagnoses",
                prompts::initial_diagnoses(patient_data, language),
            )
            .await?;
        Ok(reply.diagnoses)
    }

    pub async fn final_report(
        &self,
        patient_data: &Value,
        debate_history: &[Value],
        diagnoses: &[Value],
        language: Language,
    ) -> Result<FinalReport, AiError> {
        self.structured(
            "final_report",
            prompts::final_report(patient_data, debate_history, diagnoses, language),
        )
        .await
    }

    pub async fn drug_interactions(
        &self,
        medications: &[String],
        language: Language,
    ) -> Result<Vec<DrugInteraction>, AiError> {
        let reply: DrugInteractions = self
            .structured(
                "drug_interactions",
                prompts::drug_interactions(medications, language),
            )
            .await?;
        Ok(reply.interactions)
    }

    /// `analyses` are serialized analysis records, newest first.
    pub async fn cme_topics(
        &self,
        analyses: &[Value],
        language: Language,
    ) -> Result<CmeSuggestion, AiError> {
        let diagnoses = prompts::cme_diagnoses(analyses);
        let reply: CmeTopicSuggestions = self
            .structured("cme_topics", prompts::cme_topics(&diagnoses, language))
            .await?;
        Ok(CmeSuggestion {
            diagnoses,
            topics: reply.topics,
        })
    }
}
