use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform user, identified by phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub total_analyses: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountInput {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(skip)]
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccountInput {
    pub phone: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_some")]
    pub email: Option<Option<String>>,
}
