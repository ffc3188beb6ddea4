mod common;

use speculate2::speculate;

speculate! {
    use axum::http::{header, StatusCode};
    use serde_json::{json, Value};
    use tokio_test::block_on;

    use consilium::ai::AiError;

    use crate::common::*;

    fn patient() -> Value {
        json!({ "patient_data": { "firstName": "Jane", "age": 52, "complaints": "chest pain" } })
    }

    describe "consultation helpers" {
        it "requires authentication" {
            block_on(async {
                let app = app();
                app.server
                    .post("/api/ai/clarifying-questions/")
                    .json(&patient())
                    .await
                    .assert_status(StatusCode::UNAUTHORIZED);
            });
        }

        it "returns clarifying questions" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/clarifying-questions/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await;
                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["questions"].as_array().unwrap().len(), 2);
            });
        }

        it "assigns council models to recommended specialists" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let body: Value = app.server
                    .post("/api/ai/recommend-specialists/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await
                    .json();
                let recs = body["recommendations"].as_array().unwrap();
                assert_eq!(recs[0], json!({ "specialty": "Cardiology", "reason": "chest pain", "model": "Gemini" }));
                assert_eq!(recs[1]["model"], "Claude");
                assert_eq!(recs[4]["model"], "Gemini");
            });
        }

        it "returns initial diagnoses in camelCase" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let body: Value = app.server
                    .post("/api/ai/initial-diagnoses/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await
                    .json();
                assert_eq!(body["diagnoses"][0]["evidenceLevel"], "Medium");
            });
        }

        it "fills in missing final report sections" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/final-report/")
                    .authorization_bearer(&session.access)
                    .json(&json!({
                        "patient_data": { "firstName": "Jane" },
                        "debate_history": [{ "author": "Cardiology", "content": "ECG shows ST depression" }],
                        "diagnoses": [{ "name": "Angina" }],
                    }))
                    .await;
                response.assert_status_ok();
                let report: Value = response.json();
                assert_eq!(report["consensusDiagnosis"][0]["name"], "Stable angina");
                assert_eq!(report["treatmentPlan"], json!([]));
                assert_eq!(report["recommendedTests"], json!(["Stress test"]));
            });
        }

        it "requires at least one medication" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/drug-interactions/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "medications": [] }))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                assert!(response.json::<Value>()["medications"].is_array());

                let body: Value = app.server
                    .post("/api/ai/drug-interactions/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "medications": ["Warfarin", "Aspirin"], "language": "ru" }))
                    .await
                    .json();
                assert_eq!(body["interactions"][0]["severity"], "High");
            });
        }

        it "rejects unsupported languages" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let mut body = patient();
                body["language"] = json!("de");
                let response = app.server
                    .post("/api/ai/clarifying-questions/")
                    .authorization_bearer(&session.access)
                    .json(&body)
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                response.assert_json(&json!({
                    "language": ["Invalid language. Must be one of: en, uz-L, uz-C, ru"]
                }));
            });
        }

        it "rejects patient data that is not an object" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/initial-diagnoses/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "patient_data": "Jane, 52" }))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                response.assert_json(&json!({ "patient_data": ["Patient data must be a dictionary."] }));
            });
        }
    }

    describe "cme suggestions" {
        it "draws on the caller's recent analyses" {
            block_on(async {
                let provider = FakeProvider::new();
                let app = app_with(&test_config(), provider.clone());
                let session = register(&app.server, "+998901234567").await;
                create_analysis(&app.server, &session, analysis_body("PT-1", Some("Angina"))).await;

                let body: Value = app.server
                    .post("/api/ai/cme-topics/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "language": "uz-L" }))
                    .await
                    .json();
                assert_eq!(body["topics"].as_array().unwrap().len(), 2);
                assert!(body.get("saved").is_none());

                let prompts = provider.prompts.lock().unwrap();
                assert!(prompts.last().unwrap().contains("Angina"));
            });
        }

        it "saves suggestions linked to their source analyses" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let analysis = create_analysis(&app.server, &session, analysis_body("PT-1", Some("Angina"))).await;

                let body: Value = app.server
                    .post("/api/ai/cme-topics/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "save": true }))
                    .await
                    .json();
                let saved = body["saved"].as_array().unwrap();
                assert_eq!(saved.len(), 2);
                assert_eq!(saved[0]["source_analyses"], json!([analysis["id"]]));

                let page: Value = app.server
                    .get("/api/analyses/cme-topics/")
                    .authorization_bearer(&session.access)
                    .await
                    .json();
                assert_eq!(page["count"], 2);
            });
        }
        it "shortens overlong suggested topics before saving" {
            block_on(async {
                let long_topic = "Т".repeat(600);
                let provider = FakeProvider::with_topics(json!([
                    { "topic": long_topic, "relevance": "many cases" },
                    { "topic": "  ", "relevance": "dropped" }
                ]));
                let app = app_with(&test_config(), provider);
                let session = register(&app.server, "+998901234567").await;

                let response = app.server
                    .post("/api/ai/cme-topics/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "save": true, "analyses": [] }))
                    .await;
                response.assert_status_ok();
                let body: Value = response.json();
                let saved = body["saved"].as_array().unwrap();
                assert_eq!(saved.len(), 1);
                assert_eq!(saved[0]["topic"].as_str().unwrap().chars().count(), 500);
            });
        }
    }

    describe "provider failures" {
        it "reports quota exhaustion as unavailable" {
            block_on(async {
                let app = app_with(&test_config(), FakeProvider::failing(|| AiError::RateLimited("quota".into())));
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/clarifying-questions/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await;
                response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
                response.assert_json(&json!({ "error": "AI service rate limit exceeded. Please try again later." }));
            });
        }

        it "reports rejected requests as invalid input" {
            block_on(async {
                let app = app_with(&test_config(), FakeProvider::failing(|| AiError::InvalidRequest("bad".into())));
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/initial-diagnoses/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                response.assert_json(&json!({ "error": "Invalid input data. Please check your request." }));
            });
        }

        it "reports a missing key as temporarily unavailable" {
            block_on(async {
                let app = app_with(&test_config(), FakeProvider::failing(|| AiError::NotConfigured));
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/ai/recommend-specialists/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await;
                response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
                response.assert_json(&json!({ "error": "Service temporarily unavailable. Please try again later." }));
            });
        }
    }

    describe "throttling" {
        it "limits requests per account per minute" {
            block_on(async {
                let mut config = test_config();
                config.ai.requests_per_minute = 2;
                let app = app_with(&config, FakeProvider::new());
                let session = register(&app.server, "+998901234567").await;

                for _ in 0..2 {
                    app.server
                        .post("/api/ai/clarifying-questions/")
                        .authorization_bearer(&session.access)
                        .json(&patient())
                        .await
                        .assert_status_ok();
                }
                let response = app.server
                    .post("/api/ai/clarifying-questions/")
                    .authorization_bearer(&session.access)
                    .json(&patient())
                    .await;
                response.assert_status(StatusCode::TOO_MANY_REQUESTS);
                let retry_after: u64 = response.header(header::RETRY_AFTER).to_str().unwrap().parse().unwrap();
                assert!((1..=60).contains(&retry_after));

                let other = register(&app.server, "+998907654321").await;
                app.server
                    .post("/api/ai/clarifying-questions/")
                    .authorization_bearer(&other.access)
                    .json(&patient())
                    .await
                    .assert_status_ok();
            });
        }

        it "exempts staff accounts" {
            block_on(async {
                let mut config = test_config();
                config.ai.requests_per_minute = 1;
                let app = app_with(&config, FakeProvider::new());
                let admin = staff_session(&app, "+998900000001").await;

                for _ in 0..3 {
                    app.server
                        .post("/api/ai/clarifying-questions/")
                        .authorization_bearer(&admin.access)
                        .json(&patient())
                        .await
                        .assert_status_ok();
                }
            });
        }
    }
}
