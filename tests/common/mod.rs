//! Fixtures shared by the API specs: an in-memory server and a canned AI
//! provider.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{json, Value};

use consilium::ai::{AiError, AiProvider};
use consilium::api::{create_router, AppState};
use consilium::config::Config;
use consilium::db::Database;
use consilium::models::{Account, CreateAccountInput};

pub const PASSWORD: &str = "s3cure-passphrase";
pub const TRUSTED_ORIGIN: &str = "http://localhost:5173";

/// Answers every structured call with a fixed reply chosen from the
/// top-level property of the requested schema.
pub struct FakeProvider {
    failure: Option<fn() -> AiError>,
    topics: Option<Value>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failure: None,
            topics: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(failure: fn() -> AiError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(failure),
            topics: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Suggest these CME topics instead of the default pair.
    pub fn with_topics(topics: Value) -> Arc<Self> {
        Arc::new(Self {
            failure: None,
            topics: Some(topics),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn reply_for(&self, schema: &Value) -> Value {
        let has = |key: &str| schema["properties"].get(key).is_some();
        if has("questions") {
            json!({ "questions": ["How long have the symptoms lasted?", "Any fever?"] })
        } else if has("recommendations") {
            json!({ "recommendations": [
                { "specialty": "Cardiology", "reason": "chest pain" },
                { "specialty": "Neurology", "reason": "headache" },
                { "specialty": "Pulmonology", "reason": "dyspnea" },
                { "specialty": "Internal Medicine", "reason": "overview" },
                { "specialty": "Sports Medicine", "reason": "athlete" }
            ] })
        } else if has("diagnoses") {
            json!({ "diagnoses": [
                { "name": "Angina", "probability": 0.6, "justification": "exertional pain", "evidenceLevel": "Medium" }
            ] })
        } else if has("consensusDiagnosis") {
            json!({
                "consensusDiagnosis": [
                    { "name": "Stable angina", "probability": 0.7, "justification": "ECG", "evidenceLevel": "High" }
                ],
                "recommendedTests": ["Stress test"],
                "unexpectedFindings": ""
            })
        } else if has("interactions") {
            json!({ "interactions": [
                { "interaction": "Warfarin + Aspirin", "severity": "High", "mechanism": "additive bleeding", "management": "avoid" }
            ] })
        } else if let Some(topics) = &self.topics {
            json!({ "topics": topics })
        } else {
            json!({ "topics": [
                { "topic": "Angina management update", "relevance": "recent cardiology cases" },
                { "topic": "ECG interpretation", "relevance": "frequent chest pain" }
            ] })
        }
    }
}

#[async_trait]
impl AiProvider for FakeProvider {
    async fn generate(&self, prompt: &str, schema: Option<&Value>) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        let schema = schema.cloned().unwrap_or(Value::Null);
        Ok(format!("```json\n{}\n```", self.reply_for(&schema)))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.secret_key = "test-secret-key".into();
    config.auth.password_iterations = 1_000;
    config.server.csrf_trusted_origins = vec![TRUSTED_ORIGIN.into()];
    config
}

pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
}

pub fn app_with(config: &Config, provider: Arc<dyn AiProvider>) -> TestApp {
    let db = Database::open_memory().expect("Failed to create test database");
    let state = AppState::new(db.clone(), config, provider);
    let server = TestServer::new(create_router(state)).expect("Failed to start test server");
    TestApp { server, db }
}

pub fn app() -> TestApp {
    app_with(&test_config(), FakeProvider::new())
}

/// A registered account and its token pair.
pub struct Session {
    pub user: Value,
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn id(&self) -> uuid::Uuid {
        self.user["id"].as_str().unwrap().parse().unwrap()
    }
}

pub async fn register(server: &TestServer, phone: &str) -> Session {
    let response = server
        .post("/api/auth/register/")
        .json(&json!({
            "phone": phone,
            "name": "Dr. Test",
            "password": PASSWORD,
            "password_confirm": PASSWORD,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    Session {
        user: body["user"].clone(),
        access: body["tokens"]["access"].as_str().unwrap().to_string(),
        refresh: body["tokens"]["refresh"].as_str().unwrap().to_string(),
    }
}

/// Create a staff account directly in the store, then sign in over HTTP.
pub async fn staff_session(app: &TestApp, phone: &str) -> Session {
    let account: Account = app
        .db
        .create_account(
            CreateAccountInput {
                phone: phone.into(),
                name: "Admin".into(),
                email: None,
                password: PASSWORD.into(),
                is_staff: true,
            },
            1_000,
        )
        .unwrap();
    let body: Value = app
        .server
        .post("/api/auth/login/")
        .json(&json!({ "phone": account.phone, "password": PASSWORD }))
        .await
        .json();
    Session {
        user: body["user"].clone(),
        access: body["tokens"]["access"].as_str().unwrap().to_string(),
        refresh: body["tokens"]["refresh"].as_str().unwrap().to_string(),
    }
}

pub fn analysis_body(patient_id: &str, diagnosis: Option<&str>) -> Value {
    json!({
        "patient_id": patient_id,
        "patient_data": { "firstName": "Jane", "lastName": "Doe", "age": 52, "complaints": "chest pain" },
        "debate_history": [{ "author": "Cardiology", "content": "Likely angina." }],
        "final_report": diagnosis.map(|name| json!({ "consensusDiagnosis": [{ "name": name }] })),
    })
}

pub async fn create_analysis(server: &TestServer, session: &Session, body: Value) -> Value {
    let response = server
        .post("/api/analyses/")
        .authorization_bearer(&session.access)
        .json(&body)
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}
