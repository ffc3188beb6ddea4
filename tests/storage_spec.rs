mod common;

use speculate2::speculate;

speculate! {
    use axum_test::TestServer;
    use serde_json::json;
    use tokio_test::block_on;

    use consilium::api::{create_router, AppState};
    use consilium::db::Database;

    use crate::common::*;

    describe "on-disk database" {
        it "keeps accounts and analyses across restarts" {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("data").join("consilium.db");
            let config = test_config();

            let user_id = block_on(async {
                let db = Database::open(&path).unwrap();
                db.migrate().unwrap();
                let server = TestServer::new(create_router(AppState::new(db, &config, FakeProvider::new()))).unwrap();
                let session = register(&server, "+998901234567").await;
                create_analysis(&server, &session, analysis_body("PT-1", Some("Angina"))).await;
                session.id()
            });

            let reopened = Database::open(&path).unwrap();
            reopened.migrate().unwrap();
            let account = reopened.verify_credentials("+998901234567", PASSWORD).unwrap();
            assert_eq!(account.id, user_id);
            assert_eq!(account.total_analyses, 1);

            block_on(async {
                let server = TestServer::new(create_router(AppState::new(
                    reopened,
                    &config,
                    FakeProvider::new(),
                )))
                .unwrap();
                server
                    .post("/api/auth/login/")
                    .json(&json!({ "phone": "+998901234567", "password": PASSWORD }))
                    .await
                    .assert_status_ok();
            });
        }
    }
}
