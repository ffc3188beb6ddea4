use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A patient analysis: the submitted case plus everything the AI council
/// produced for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub id: Uuid,
    pub user: Uuid,
    pub user_name: String,
    pub patient_id: String,
    pub patient_data: Value,
    pub debate_history: Value,
    pub final_report: Option<Value>,
    pub differential_diagnoses: Value,
    pub selected_specialists: Value,
    pub follow_up_history: Value,
    pub detected_medications: Option<Value>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight projection used by list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisListItem {
    pub id: Uuid,
    pub user_name: String,
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis_summary: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn to_list_item(&self) -> AnalysisListItem {
        AnalysisListItem {
            id: self.id,
            user_name: self.user_name.clone(),
            patient_id: self.patient_id.clone(),
            patient_name: patient_name(&self.patient_data),
            diagnosis_summary: diagnosis_summary(self.final_report.as_ref()),
            is_completed: self.is_completed,
            created_at: self.created_at,
        }
    }

    /// Names listed under `final_report.consensusDiagnosis`, in order.
    pub fn consensus_diagnosis_names(&self) -> Vec<String> {
        self.final_report
            .as_ref()
            .and_then(|report| report.get("consensusDiagnosis"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|dx| dx.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `"{firstName} {lastName}"` from the patient record, or `"Unknown"`.
pub fn patient_name(patient_data: &Value) -> String {
    let Some(data) = patient_data.as_object() else {
        return "Unknown".to_string();
    };
    let part = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("");
    format!("{} {}", part("firstName"), part("lastName"))
        .trim()
        .to_string()
}

/// Headline diagnosis of a final report.
pub fn diagnosis_summary(final_report: Option<&Value>) -> String {
    let consensus = final_report
        .filter(|report| report.is_object())
        .and_then(|report| report.get("consensusDiagnosis"));

    match consensus {
        None | Some(Value::Null) => "In progress".to_string(),
        Some(Value::Array(items)) if items.is_empty() => "In progress".to_string(),
        Some(Value::Array(items)) => items[0]
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("No diagnosis")
            .to_string(),
        Some(Value::Bool(false)) => "In progress".to_string(),
        Some(Value::String(s)) if s.is_empty() => "In progress".to_string(),
        Some(Value::Object(map)) if map.is_empty() => "In progress".to_string(),
        Some(_) => "No diagnosis".to_string(),
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnalysisInput {
    pub patient_id: String,
    pub patient_data: Value,
    #[serde(default = "empty_list")]
    pub debate_history: Value,
    #[serde(default)]
    pub final_report: Option<Value>,
    #[serde(default = "empty_list")]
    pub differential_diagnoses: Value,
    #[serde(default = "empty_list")]
    pub selected_specialists: Value,
    #[serde(default = "empty_list")]
    pub follow_up_history: Value,
    #[serde(default)]
    pub detected_medications: Option<Value>,
    /// Submitted analyses are finished council runs unless stated otherwise.
    #[serde(default)]
    pub is_completed: Option<bool>,
}

/// Partial update. Absent fields are left untouched; for the nullable
/// fields an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAnalysisInput {
    pub patient_id: Option<String>,
    pub patient_data: Option<Value>,
    pub debate_history: Option<Value>,
    #[serde(default, deserialize_with = "super::deserialize_some")]
    pub final_report: Option<Option<Value>>,
    pub differential_diagnoses: Option<Value>,
    pub selected_specialists: Option<Value>,
    pub follow_up_history: Option<Value>,
    #[serde(default, deserialize_with = "super::deserialize_some")]
    pub detected_medications: Option<Option<Value>>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AnalysisOrdering {
    CreatedAt,
    #[default]
    CreatedAtDesc,
    UpdatedAt,
    UpdatedAtDesc,
    PatientId,
    PatientIdDesc,
}

impl AnalysisOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::CreatedAtDesc => "-created_at",
            Self::UpdatedAt => "updated_at",
            Self::UpdatedAtDesc => "-updated_at",
            Self::PatientId => "patient_id",
            Self::PatientIdDesc => "-patient_id",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "-created_at" => Some(Self::CreatedAtDesc),
            "updated_at" => Some(Self::UpdatedAt),
            "-updated_at" => Some(Self::UpdatedAtDesc),
            "patient_id" => Some(Self::PatientId),
            "-patient_id" => Some(Self::PatientIdDesc),
            _ => None,
        }
    }

    pub(crate) fn sql(&self) -> &'static str {
        match self {
            Self::CreatedAt => "a.created_at ASC, a.rowid ASC",
            Self::CreatedAtDesc => "a.created_at DESC, a.rowid DESC",
            Self::UpdatedAt => "a.updated_at ASC, a.rowid ASC",
            Self::UpdatedAtDesc => "a.updated_at DESC, a.rowid DESC",
            Self::PatientId => "a.patient_id ASC, a.created_at DESC",
            Self::PatientIdDesc => "a.patient_id DESC, a.created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub is_completed: Option<bool>,
    pub patient_id: Option<String>,
    /// Case-insensitive substring of the serialized patient data.
    pub search: Option<String>,
    pub ordering: AnalysisOrdering,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patient_name_from_record() {
        assert_eq!(
            patient_name(&json!({"firstName": "Aziz", "lastName": "Karimov"})),
            "Aziz Karimov"
        );
        assert_eq!(patient_name(&json!({"lastName": "Karimov"})), "Karimov");
        assert_eq!(patient_name(&json!("not an object")), "Unknown");
    }

    #[test]
    fn diagnosis_summary_variants() {
        assert_eq!(diagnosis_summary(None), "In progress");
        assert_eq!(
            diagnosis_summary(Some(&json!({"consensusDiagnosis": []}))),
            "In progress"
        );
        assert_eq!(
            diagnosis_summary(Some(&json!({"consensusDiagnosis": [{"name": "Angina"}]}))),
            "Angina"
        );
        assert_eq!(
            diagnosis_summary(Some(&json!({"consensusDiagnosis": [{"probability": 0.4}]}))),
            "No diagnosis"
        );
        assert_eq!(
            diagnosis_summary(Some(&json!({"consensusDiagnosis": "Angina"}))),
            "No diagnosis"
        );
        assert_eq!(diagnosis_summary(Some(&json!(["x"]))), "In progress");
    }

    #[test]
    fn partial_update_distinguishes_null_from_absent() {
        let absent: UpdateAnalysisInput = serde_json::from_value(json!({})).unwrap();
        assert!(absent.final_report.is_none());

        let cleared: UpdateAnalysisInput =
            serde_json::from_value(json!({"final_report": null})).unwrap();
        assert_eq!(cleared.final_report, Some(None));
    }

    #[test]
    fn ordering_round_trips_through_names() {
        for ordering in [
            AnalysisOrdering::CreatedAt,
            AnalysisOrdering::CreatedAtDesc,
            AnalysisOrdering::PatientIdDesc,
        ] {
            assert_eq!(AnalysisOrdering::from_str(ordering.as_str()), Some(ordering));
        }
        assert_eq!(AnalysisOrdering::from_str("password"), None);
    }
}
