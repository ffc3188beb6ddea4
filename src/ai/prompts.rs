//! Prompt text for each consultation helper.

use serde_json::Value;

use super::Language;

const NOT_PROVIDED: &str = "Not provided";
/// Debate messages carried into the final report prompt.
pub const DEBATE_TAIL: usize = 10;
const DEBATE_EXCERPT_CHARS: usize = 200;
/// Analyses scanned for CME suggestions.
pub const CME_ANALYSES: usize = 10;
const CME_DIAGNOSES: usize = 20;

pub const SPECIALTIES: [(&str, &str); 20] = [
    ("Cardiology", "Heart and cardiovascular diseases, chest pain, hypertension, arrhythmias"),
    ("Neurology", "Brain, nerves, headaches, seizures, neurological conditions"),
    ("Radiology", "Medical imaging interpretation, X-rays, CT scans, MRIs, ultrasound"),
    ("Oncology", "Cancer, tumors, malignancies, cancer diagnosis and treatment"),
    ("Endocrinology", "Hormones, diabetes, thyroid disorders, metabolic conditions"),
    ("Gastroenterology", "Digestive system, liver, stomach, intestines"),
    ("Pulmonology", "Lungs, respiratory system, breathing disorders"),
    ("Nephrology", "Kidneys, renal diseases, dialysis"),
    ("Rheumatology", "Joints, autoimmune diseases, arthritis"),
    ("Infectious Disease", "Infections, bacterial/viral diseases, antibiotics"),
    ("Hematology", "Blood disorders, anemia, clotting problems"),
    ("Geriatrics", "Elderly care, age-related conditions"),
    ("Emergency Medicine", "Acute care, trauma, critical conditions"),
    ("Internal Medicine", "General medicine, complex multi-system diseases"),
    ("Pediatrics", "Children's health, pediatric conditions"),
    ("Dermatology", "Skin conditions, dermatological diseases"),
    ("Orthopedics", "Bones, joints, fractures, musculoskeletal"),
    ("Urology", "Urinary system, kidneys, bladder"),
    ("Gynecology", "Women's reproductive health"),
    ("Psychiatry", "Mental health, psychological conditions"),
];

/// A patient field rendered for a prompt.
fn field(patient_data: &Value, key: &str) -> String {
    match patient_data.get(key) {
        None | Some(Value::Null) => NOT_PROVIDED.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => NOT_PROVIDED.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn text(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).unwrap_or("")
}

/// Any JSON value as prompt text; missing and null read as empty.
fn plain(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn patient_name(patient_data: &Value) -> String {
    format!(
        "{} {}",
        text(patient_data.get("firstName")),
        text(patient_data.get("lastName"))
    )
    .trim()
    .to_string()
}

pub fn clarifying_questions(patient_data: &Value, language: Language) -> String {
    format!(
        "Based on the following patient information, generate 3-5 clarifying questions \
that would help in making a more accurate diagnosis.

Patient Information:
- Complaints: {complaints}
- History: {history}
- Objective Data: {objective}
- Lab Results: {labs}

Return the questions in {lang} as JSON: {{\"questions\": [\"Question 1?\", \"Question 2?\"]}}",
        complaints = field(patient_data, "complaints"),
        history = field(patient_data, "history"),
        objective = field(patient_data, "objectiveData"),
        labs = field(patient_data, "labResults"),
        lang = language.prompt_name(),
    )
}

pub fn recommend_specialists(patient_data: &Value, language: Language) -> String {
    let catalogue = SPECIALTIES
        .iter()
        .map(|(name, scope)| format!("- \"{name}\" ({scope})"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a medical consultation coordinator. Based on the patient's condition, symptoms \
and clinical data, recommend 5-6 MEDICAL SPECIALTIES that are most relevant for this specific case. \
Tailor the team to the disease or symptom type; do not return a generic team. \
Return medical specialties only, never AI model names.

Patient Information:
- Age: {age}
- Gender: {gender}
- Chief Complaints (Symptoms): {complaints}
- Medical History: {history}
- Objective Physical Examination Data: {objective}
- Laboratory Results: {labs}
- Current Medications: {medications}
- Additional Information: {additional}

Available Medical Specialties (use EXACT names):
{catalogue}

Instructions:
1. Identify the primary disease or symptom category.
2. Select 5-6 specialties that relate to that condition and its complications.
3. Consider related organ systems and likely comorbidities.
4. Order them by relevance, most important first.
5. For each, explain why it is needed for THIS case.

Return the recommendations in {lang} as JSON:
{{\"recommendations\": [{{\"specialty\": \"Cardiology\", \"reason\": \"...\"}}]}}",
        age = field(patient_data, "age"),
        gender = field(patient_data, "gender"),
        complaints = field(patient_data, "complaints"),
        history = field(patient_data, "history"),
        objective = field(patient_data, "objectiveData"),
        labs = field(patient_data, "labResults"),
        medications = field(patient_data, "currentMedications"),
        additional = field(patient_data, "additionalInfo"),
        lang = language.prompt_name(),
    )
}

pub fn initial_diagnoses(patient_data: &Value, language: Language) -> String {
    format!(
        "Based on the patient information, generate 3-5 differential diagnoses \
with probability estimates and justification.

Patient Information:
- Name: {name}
- Age: {age}
- Gender: {gender}
- Complaints: {complaints}
- History: {history}
- Objective Data: {objective}
- Lab Results: {labs}

Return in {lang} as JSON:
{{\"diagnoses\": [{{\"name\": \"Diagnosis name\", \"probability\": 0.75, \
\"justification\": \"Why this diagnosis is likely\", \"evidenceLevel\": \"High/Moderate/Low\"}}]}}",
        name = patient_name(patient_data),
        age = field(patient_data, "age"),
        gender = field(patient_data, "gender"),
        complaints = field(patient_data, "complaints"),
        history = field(patient_data, "history"),
        objective = field(patient_data, "objectiveData"),
        labs = field(patient_data, "labResults"),
        lang = language.prompt_name(),
    )
}

/// `author: excerpt...` lines for the last [`DEBATE_TAIL`] messages.
pub fn debate_summary(debate_history: &[Value]) -> String {
    let start = debate_history.len().saturating_sub(DEBATE_TAIL);
    debate_history[start..]
        .iter()
        .map(|message| {
            let author = message
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let excerpt: String = text(message.get("content"))
                .chars()
                .take(DEBATE_EXCERPT_CHARS)
                .collect();
            format!("{author}: {excerpt}...")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn final_report(
    patient_data: &Value,
    debate_history: &[Value],
    diagnoses: &[Value],
    language: Language,
) -> String {
    let considered =
        serde_json::to_string_pretty(diagnoses).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Generate a comprehensive medical report based on the AI council discussion.

Patient: {name}
Age: {age}, Gender: {gender}

Chief Complaints: {complaints}

Differential Diagnoses Considered:
{considered}

Debate Summary:
{summary}

Generate a complete report in {lang} with:
- Consensus diagnosis (most likely diagnoses with probability)
- Rejected hypotheses and why
- Recommended tests
- Treatment plan
- Medication recommendations
- Follow-up plan
- Prognosis
- Any unexpected findings

Return as structured JSON.",
        name = patient_name(patient_data),
        age = plain(patient_data.get("age")),
        gender = plain(patient_data.get("gender")),
        complaints = plain(patient_data.get("complaints")),
        summary = debate_summary(debate_history),
        lang = language.prompt_name(),
    )
}

pub fn drug_interactions(medications: &[String], language: Language) -> String {
    format!(
        "Check for potential drug interactions between these medications:
{list}

Return interactions in {lang} as JSON:
{{\"interactions\": [{{\"interaction\": \"Drug A + Drug B\", \"severity\": \"High/Medium/Low\", \
\"mechanism\": \"How they interact\", \"management\": \"What to do\"}}]}}",
        list = medications.join(", "),
        lang = language.prompt_name(),
    )
}

/// Consensus diagnosis names from the first [`CME_ANALYSES`] analyses:
/// at most [`CME_DIAGNOSES`] names, duplicates dropped, order kept.
pub fn cme_diagnoses(analyses: &[Value]) -> Vec<String> {
    let names = analyses
        .iter()
        .take(CME_ANALYSES)
        .filter_map(|analysis| analysis.get("final_report"))
        .filter_map(|report| report.get("consensusDiagnosis"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|dx| dx.as_object())
        .map(|dx| text(dx.get("name")).to_string())
        .take(CME_DIAGNOSES);

    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

pub fn cme_topics(diagnoses: &[String], language: Language) -> String {
    format!(
        "Based on these recent cases: {cases}

Suggest 3-5 CME (Continuing Medical Education) topics that would be \
most relevant for this physician, written in {lang}.

Return as JSON:
{{\"topics\": [{{\"topic\": \"Topic name\", \"relevance\": \"Why this is relevant\"}}]}}",
        cases = diagnoses.join(", "),
        lang = language.prompt_name(),
    )
}
