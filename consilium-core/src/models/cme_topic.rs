use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Continuing Medical Education topic tracked for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CmeTopic {
    pub id: Uuid,
    pub user: Uuid,
    pub topic: String,
    pub relevance: String,
    pub source_analyses: Vec<Uuid>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCmeTopicInput {
    pub topic: String,
    pub relevance: String,
    #[serde(default)]
    pub source_analyses: Vec<Uuid>,
    #[serde(default)]
    pub is_completed: bool,
}
