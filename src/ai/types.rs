use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyingQuestions {
    pub questions: Vec<String>,
}

/// A specialty as proposed by the model, before a council model is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpecialtyPick {
    pub specialty: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpecialtyPicks {
    #[schemars(length(min = 5, max = 6))]
    pub recommendations: Vec<SpecialtyPick>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistRecommendation {
    pub specialty: String,
    pub reason: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub name: String,
    pub probability: f64,
    pub justification: String,
    pub evidence_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InitialDiagnoses {
    pub diagnoses: Vec<Diagnosis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RejectedHypothesis {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MedicationRecommendation {
    pub name: String,
    pub dosage: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct FinalReport {
    pub consensus_diagnosis: Vec<Diagnosis>,
    pub rejected_hypotheses: Vec<RejectedHypothesis>,
    pub recommended_tests: Vec<String>,
    pub treatment_plan: Vec<String>,
    pub medication_recommendations: Vec<MedicationRecommendation>,
    pub unexpected_findings: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DrugInteraction {
    pub interaction: String,
    pub severity: String,
    pub mechanism: String,
    pub management: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DrugInteractions {
    pub interactions: Vec<DrugInteraction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CmeTopicSuggestion {
    pub topic: String,
    pub relevance: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CmeTopicSuggestions {
    pub topics: Vec<CmeTopicSuggestion>,
}
