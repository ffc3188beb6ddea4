mod common;

use speculate2::speculate;

speculate! {
    use axum::http::{header, HeaderValue, StatusCode};
    use serde_json::{json, Value};
    use tokio_test::block_on;

    use crate::common::*;

    describe "registration" {
        it "creates an account and returns a token pair" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;

                assert_eq!(session.user["phone"], "+998901234567");
                assert_eq!(session.user["total_analyses"], 0);
                assert!(session.user.get("password_hash").is_none());
                assert!(!session.access.is_empty());
                assert_ne!(session.access, session.refresh);
            });
        }

        it "rejects mismatched password confirmation" {
            block_on(async {
                let app = app();
                let response = app.server
                    .post("/api/auth/register/")
                    .json(&json!({
                        "phone": "+998901234567",
                        "name": "Dr. Test",
                        "password": PASSWORD,
                        "password_confirm": "something-else",
                    }))
                    .await;

                response.assert_status(StatusCode::BAD_REQUEST);
                response.assert_json(&json!({ "password": ["Password fields didn't match."] }));
            });
        }

        it "reports missing fields by name" {
            block_on(async {
                let app = app();
                let response = app.server
                    .post("/api/auth/register/")
                    .json(&json!({ "phone": "+998901234567", "name": "Dr. Test", "password_confirm": "x" }))
                    .await;

                response.assert_status(StatusCode::BAD_REQUEST);
                let body: Value = response.json();
                assert_eq!(body["password"], json!(["This field is required."]));
            });
        }

        it "rejects a duplicate phone" {
            block_on(async {
                let app = app();
                register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/register/")
                    .json(&json!({
                        "phone": "+998901234567",
                        "name": "Someone Else",
                        "password": PASSWORD,
                        "password_confirm": PASSWORD,
                    }))
                    .await;

                response.assert_status(StatusCode::BAD_REQUEST);
                let body: Value = response.json();
                assert!(body["phone"].is_array());
            });
        }
    }

    describe "login" {
        it "returns fresh tokens for valid credentials" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/login/")
                    .json(&json!({ "phone": "+998901234567", "password": PASSWORD }))
                    .await;

                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["user"]["id"], session.user["id"]);
                assert_ne!(body["tokens"]["access"].as_str().unwrap(), session.access);
            });
        }

        it "answers 401 for a wrong password" {
            block_on(async {
                let app = app();
                register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/login/")
                    .json(&json!({ "phone": "+998901234567", "password": "wrong-password" }))
                    .await;

                response.assert_status(StatusCode::UNAUTHORIZED);
                response.assert_json(&json!({ "error": "Invalid credentials" }));
            });
        }

        it "refuses disabled accounts" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                app.db.set_account_active(session.id(), false).unwrap();

                let response = app.server
                    .post("/api/auth/login/")
                    .json(&json!({ "phone": "+998901234567", "password": PASSWORD }))
                    .await;

                response.assert_status(StatusCode::UNAUTHORIZED);
                response.assert_json(&json!({ "error": "User account is disabled" }));
            });
        }
    }

    describe "tokens" {
        it "requires credentials on protected routes" {
            block_on(async {
                let app = app();
                let response = app.server.get("/api/auth/profile/").await;
                response.assert_status(StatusCode::UNAUTHORIZED);
                response.assert_json(&json!({ "error": "Authentication credentials were not provided." }));

                let response = app.server
                    .get("/api/auth/profile/")
                    .authorization_bearer("not-a-token")
                    .await;
                response.assert_status(StatusCode::UNAUTHORIZED);
            });
        }

        it "mints a new access token from the refresh token" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/token/refresh/")
                    .json(&json!({ "refresh": session.refresh }))
                    .await;

                response.assert_status_ok();
                let access = response.json::<Value>()["access"].as_str().unwrap().to_string();
                app.server
                    .get("/api/auth/profile/")
                    .authorization_bearer(&access)
                    .await
                    .assert_status_ok();
            });
        }

        it "does not accept an access token as a refresh token" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                app.server
                    .post("/api/auth/token/refresh/")
                    .json(&json!({ "refresh": session.access }))
                    .await
                    .assert_status(StatusCode::UNAUTHORIZED);
            });
        }

        it "revokes the session on logout" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/logout/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "refresh_token": session.refresh }))
                    .await;

                response.assert_status_ok();
                response.assert_json(&json!({ "message": "Successfully logged out" }));

                app.server
                    .get("/api/auth/profile/")
                    .authorization_bearer(&session.access)
                    .await
                    .assert_status(StatusCode::UNAUTHORIZED);
                app.server
                    .post("/api/auth/token/refresh/")
                    .json(&json!({ "refresh": session.refresh }))
                    .await
                    .assert_status(StatusCode::UNAUTHORIZED);
            });
        }

        it "accepts a logout without a body" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                app.server
                    .post("/api/auth/logout/")
                    .authorization_bearer(&session.access)
                    .await
                    .assert_status_ok();
            });
        }

        it "rejects logging out another account's refresh token" {
            block_on(async {
                let app = app();
                let alice = register(&app.server, "+998901234567").await;
                let bob = register(&app.server, "+998907654321").await;
                app.server
                    .post("/api/auth/logout/")
                    .authorization_bearer(&alice.access)
                    .json(&json!({ "refresh_token": bob.refresh }))
                    .await
                    .assert_status(StatusCode::BAD_REQUEST);
            });
        }
    }

    describe "profile" {
        it "updates only the given fields" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .patch("/api/auth/profile/update/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "email": "doc@example.com" }))
                    .await;

                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["email"], "doc@example.com");
                assert_eq!(body["name"], "Dr. Test");
            });
        }

        it "changes the password" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/password/change/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "old_password": PASSWORD, "new_password": "an-even-better-one" }))
                    .await;
                response.assert_status_ok();
                response.assert_json(&json!({ "message": "Password changed successfully" }));

                app.server
                    .post("/api/auth/login/")
                    .json(&json!({ "phone": "+998901234567", "password": "an-even-better-one" }))
                    .await
                    .assert_status_ok();
            });
        }

        it "reports a wrong old password on its field" {
            block_on(async {
                let app = app();
                let session = register(&app.server, "+998901234567").await;
                let response = app.server
                    .post("/api/auth/password/change/")
                    .authorization_bearer(&session.access)
                    .json(&json!({ "old_password": "nope-nope-nope", "new_password": "an-even-better-one" }))
                    .await;

                response.assert_status(StatusCode::BAD_REQUEST);
                let body: Value = response.json();
                assert!(body["old_password"].is_array());
            });
        }
    }

    describe "origin check" {
        it "blocks writes from untrusted origins" {
            block_on(async {
                let app = app();
                let response = app.server
                    .post("/api/auth/login/")
                    .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example"))
                    .json(&json!({ "phone": "+998901234567", "password": PASSWORD }))
                    .await;

                response.assert_status(StatusCode::FORBIDDEN);
                response.assert_json(&json!({ "error": "Origin not trusted" }));
            });
        }

        it "lets trusted origins and reads through" {
            block_on(async {
                let app = app();
                app.server
                    .post("/api/auth/register/")
                    .add_header(header::ORIGIN, HeaderValue::from_static(TRUSTED_ORIGIN))
                    .json(&json!({
                        "phone": "+998901234567",
                        "name": "Dr. Test",
                        "password": PASSWORD,
                        "password_confirm": PASSWORD,
                    }))
                    .await
                    .assert_status(StatusCode::CREATED);

                app.server
                    .get("/api/auth/profile/")
                    .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example"))
                    .await
                    .assert_status(StatusCode::UNAUTHORIZED);
            });
        }
    }
}
