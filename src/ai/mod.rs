//! AI gateway: prompt construction, the provider seam, and post-processing
//! of model output for the six consultation helpers.

mod gateway;
mod gemini;
mod prompts;
mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use gateway::{
    specialist_model, AiGateway, CmeSuggestion, MAX_CLARIFYING_QUESTIONS,
};
pub use gemini::GeminiClient;
pub use types::*;

/// A text-generation backend.
///
/// `schema`, when given, is the JSON schema the reply must satisfy; the
/// provider asks the model for JSON output and returns the raw text.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(&self, prompt: &str, schema: Option<&Value>) -> Result<String, AiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI provider is not configured")]
    NotConfigured,
    #[error("AI provider rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("AI provider rejected the request: {0}")]
    InvalidRequest(String),
    #[error("AI provider returned malformed output: {0}")]
    InvalidResponse(String),
    #[error("AI provider unavailable: {0}")]
    Unavailable(String),
}

impl AiError {
    /// Classify a provider failure message.
    pub(crate) fn from_message(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("quota") || lower.contains("rate limit") {
            Self::RateLimited(message)
        } else if lower.contains("invalid") || lower.contains("malformed") {
            Self::InvalidRequest(message)
        } else {
            Self::Unavailable(message)
        }
    }
}

/// Output language of AI responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "uz-L")]
    UzbekLatin,
    #[serde(rename = "uz-C")]
    UzbekCyrillic,
    #[serde(rename = "ru")]
    Russian,
}

impl Language {
    pub const CODES: [&'static str; 4] = ["en", "uz-L", "uz-C", "ru"];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Self::English),
            "uz-L" => Some(Self::UzbekLatin),
            "uz-C" => Some(Self::UzbekCyrillic),
            "ru" => Some(Self::Russian),
            _ => None,
        }
    }

    /// Name of the language as written into prompts.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::UzbekLatin => "Uzbek (Latin script)",
            Self::UzbekCyrillic => "Uzbek (Cyrillic script)",
            Self::Russian => "Russian",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_messages() {
        assert!(matches!(
            AiError::from_message("Quota exceeded for project".into()),
            AiError::RateLimited(_)
        ));
        assert!(matches!(
            AiError::from_message("Invalid argument: contents".into()),
            AiError::InvalidRequest(_)
        ));
        assert!(matches!(
            AiError::from_message("backend error".into()),
            AiError::Unavailable(_)
        ));
    }

    #[test]
    fn language_codes_round_trip() {
        for code in Language::CODES {
            let language = Language::from_code(code).unwrap();
            assert_eq!(serde_json::to_value(language).unwrap(), code);
        }
        assert_eq!(Language::from_code("de"), None);
        assert_eq!(Language::UzbekCyrillic.prompt_name(), "Uzbek (Cyrillic script)");
    }
}
