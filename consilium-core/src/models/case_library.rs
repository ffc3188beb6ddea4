use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AnalysisListItem;

pub const ANONYMOUS: &str = "Anonymous";

/// An analysis published to the case library for educational reuse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseLibraryEntry {
    pub id: Uuid,
    pub analysis: Uuid,
    pub analysis_data: AnalysisListItem,
    pub tags: Vec<String>,
    pub final_diagnosis: String,
    pub outcome: String,
    pub is_anonymous: bool,
    pub is_public: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseLibraryEntry {
    /// Hide identifying fields from viewers other than the owner.
    pub(crate) fn anonymize(&mut self) {
        self.analysis_data.patient_name = ANONYMOUS.to_string();
        self.analysis_data.user_name = ANONYMOUS.to_string();
        self.analysis_data.patient_id = String::new();
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseLibraryInput {
    pub analysis: Uuid,
    #[serde(default)]
    pub tags: Vec<String>,
    pub final_diagnosis: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default = "default_true")]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_public: bool,
}
