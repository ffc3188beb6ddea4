use speculate2::speculate;

speculate! {
    use consilium_core::models::*;
    use consilium_core::{Database, StoreError};
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn setup_db() -> Database {
        Database::open_memory().expect("Failed to create test database")
    }

    fn signup(db: &Database, phone: &str) -> Account {
        db.create_account(
            CreateAccountInput {
                phone: phone.to_string(),
                name: "Dr. Test".to_string(),
                email: None,
                password: "s3cure-passphrase".to_string(),
                is_staff: false,
            },
            1_000,
        )
        .expect("Failed to create account")
    }

    fn input(patient_id: &str, first_name: &str, report: Option<Value>) -> CreateAnalysisInput {
        serde_json::from_value(json!({
            "patient_id": patient_id,
            "patient_data": { "firstName": first_name, "lastName": "Doe", "age": 40 },
            "final_report": report,
        }))
        .expect("valid analysis input")
    }

    fn report(names: &[&str]) -> Value {
        json!({
            "consensusDiagnosis": names
                .iter()
                .map(|name| json!({ "name": name, "probability": 60 }))
                .collect::<Vec<_>>()
        })
    }

    fn create(db: &Database, user: Uuid, patient_id: &str) -> Analysis {
        db.create_analysis(user, input(patient_id, "Jane", None))
            .expect("Failed to create analysis")
    }

    describe "create" {
        it "defaults to completed and counts towards the owner's total" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let analysis = create(&db, user.id, "PT-1");

            assert!(analysis.is_completed);
            assert_eq!(analysis.user_name, "Dr. Test");
            assert_eq!(analysis.debate_history, json!([]));
            assert_eq!(db.get_account(user.id).unwrap().unwrap().total_analyses, 1);
        }

        it "honours an explicit in-progress flag" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let mut draft = input("PT-1", "Jane", None);
            draft.is_completed = Some(false);

            assert!(!db.create_analysis(user.id, draft).unwrap().is_completed);
        }

        it "rejects malformed patient ids and payloads" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let mut bad = input("PT 1", "Jane", None);
            bad.patient_data = json!("just a string");
            bad.selected_specialists = json!({ "not": "a list" });

            let Err(StoreError::Validation(errors)) = db.create_analysis(user.id, bad) else {
                panic!("expected validation error");
            };
            assert!(errors.get("patient_id").is_some());
            assert!(errors.get("patient_data").is_some());
            assert!(errors.get("selected_specialists").is_some());
        }
    }

    describe "ownership" {
        it "hides other accounts' analyses" {
            let db = setup_db();
            let owner = signup(&db, "+998901111111");
            let other = signup(&db, "+998902222222");
            let analysis = create(&db, owner.id, "PT-1");

            assert!(db.get_analysis(other.id, analysis.id).unwrap().is_none());
            assert!(db.update_analysis(other.id, analysis.id, UpdateAnalysisInput::default()).unwrap().is_none());
            assert!(!db.delete_analysis(other.id, analysis.id).unwrap());
            assert!(db.longitudinal_view(other.id, analysis.id).unwrap().is_none());
        }
    }

    describe "list" {
        it "paginates newest first" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let ids: Vec<Uuid> = (0..5).map(|i| create(&db, user.id, &format!("PT-{i}")).id).collect();

            let first = db.list_analyses(user.id, &AnalysisFilter::default(), PageRequest::new(Some(1), Some(2))).unwrap();
            assert_eq!(first.count, 5);
            assert_eq!(first.next, Some(2));
            assert_eq!(first.previous, None);
            assert_eq!(first.results[0].id, ids[4]);
            assert_eq!(first.results[1].id, ids[3]);

            let last = db.list_analyses(user.id, &AnalysisFilter::default(), PageRequest::new(Some(3), Some(2))).unwrap();
            assert_eq!(last.results.len(), 1);
            assert_eq!(last.next, None);
        }

        it "filters by completion, patient and patient data text" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            create(&db, user.id, "PT-1");
            db.create_analysis(user.id, input("PT-2", "Rustam", None)).unwrap();
            let mut draft = input("PT-3", "Jane", None);
            draft.is_completed = Some(false);
            db.create_analysis(user.id, draft).unwrap();

            let page = PageRequest::default();
            let pending = AnalysisFilter { is_completed: Some(false), ..Default::default() };
            assert_eq!(db.list_analyses(user.id, &pending, page).unwrap().count, 1);

            let by_patient = AnalysisFilter { patient_id: Some("PT-2".into()), ..Default::default() };
            assert_eq!(db.list_analyses(user.id, &by_patient, page).unwrap().count, 1);

            let search = AnalysisFilter { search: Some("rustam".into()), ..Default::default() };
            let found = db.list_analyses(user.id, &search, page).unwrap();
            assert_eq!(found.count, 1);
            assert_eq!(found.results[0].patient_name, "Rustam Doe");
        }

        it "treats LIKE wildcards in search as literals" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            create(&db, user.id, "PT-1");

            let search = AnalysisFilter { search: Some("%".into()), ..Default::default() };
            assert_eq!(db.list_analyses(user.id, &search, PageRequest::default()).unwrap().count, 0);
        }

        it "orders by patient id on request" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            create(&db, user.id, "B");
            create(&db, user.id, "A");
            create(&db, user.id, "C");

            let filter = AnalysisFilter { ordering: AnalysisOrdering::PatientId, ..Default::default() };
            let items = db.recent_analyses(user.id, &filter, 10).unwrap();
            let order: Vec<&str> = items.iter().map(|i| i.patient_id.as_str()).collect();
            assert_eq!(order, vec!["A", "B", "C"]);
        }
    }

    describe "update" {
        it "keeps absent fields and clears explicit nulls" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let analysis = db.create_analysis(user.id, input("PT-1", "Jane", Some(report(&["Flu"])))).unwrap();

            let patch: UpdateAnalysisInput = serde_json::from_value(json!({
                "final_report": null,
                "follow_up_history": [{ "question": "Fever?" }]
            })).unwrap();
            let updated = db.update_analysis(user.id, analysis.id, patch).unwrap().unwrap();

            assert_eq!(updated.final_report, None);
            assert_eq!(updated.follow_up_history, json!([{ "question": "Fever?" }]));
            assert_eq!(updated.patient_data, analysis.patient_data);
            assert!(updated.updated_at >= analysis.updated_at);
        }

        it "completes an analysis idempotently" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let mut draft = input("PT-1", "Jane", None);
            draft.is_completed = Some(false);
            let analysis = db.create_analysis(user.id, draft).unwrap();

            assert!(db.complete_analysis(user.id, analysis.id).unwrap().unwrap().is_completed);
            assert!(db.complete_analysis(user.id, analysis.id).unwrap().unwrap().is_completed);
        }
    }

    describe "delete" {
        it "removes the row and recounts the total" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let analysis = create(&db, user.id, "PT-1");
            create(&db, user.id, "PT-2");

            assert!(db.delete_analysis(user.id, analysis.id).unwrap());
            assert!(!db.delete_analysis(user.id, analysis.id).unwrap());
            assert_eq!(db.get_account(user.id).unwrap().unwrap().total_analyses, 1);
        }
    }

    describe "longitudinal view" {
        it "lists the same patient's analyses oldest first" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let first = create(&db, user.id, "PT-1");
            create(&db, user.id, "PT-2");
            let second = create(&db, user.id, "PT-1");

            let history = db.longitudinal_view(user.id, second.id).unwrap().unwrap();
            let ids: Vec<Uuid> = history.iter().map(|i| i.id).collect();
            assert_eq!(ids, vec![first.id, second.id]);
        }
    }

    describe "dashboard stats" {
        it "is empty for a new account" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let stats = db.dashboard_stats(user.id).unwrap();

            assert_eq!(stats.total_analyses, 0);
            assert!(stats.common_diagnoses.is_empty());
            assert!(stats.recent_analyses.is_empty());
            assert_eq!(stats.feedback_accuracy, 0.85);
        }

        it "ranks consensus diagnoses of completed analyses" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            db.create_analysis(user.id, input("PT-1", "A", Some(report(&["Flu", "Cold"])))).unwrap();
            db.create_analysis(user.id, input("PT-2", "B", Some(report(&["Flu"])))).unwrap();
            let mut draft = input("PT-3", "C", Some(report(&["Cold", "Cold"])));
            draft.is_completed = Some(false);
            db.create_analysis(user.id, draft).unwrap();

            let stats = db.dashboard_stats(user.id).unwrap();
            assert_eq!(stats.total_analyses, 3);
            assert_eq!(stats.common_diagnoses[0], DiagnosisCount { name: "Flu".into(), count: 2 });
            assert_eq!(stats.common_diagnoses[1], DiagnosisCount { name: "Cold".into(), count: 1 });
        }

        it "tops up recent analyses with in-progress ones" {
            let db = setup_db();
            let user = signup(&db, "+998901234567");
            let done = create(&db, user.id, "PT-1");
            let mut draft = input("PT-2", "Jane", None);
            draft.is_completed = Some(false);
            let pending = db.create_analysis(user.id, draft).unwrap();

            let recent = db.dashboard_stats(user.id).unwrap().recent_analyses;
            let ids: Vec<Uuid> = recent.iter().map(|i| i.id).collect();
            assert_eq!(ids, vec![done.id, pending.id]);
        }
    }
}
