//! REST API.
//!
//! All routes live under `/api/` and carry a trailing slash. State is shared
//! through [`AppState`]; authentication happens in the [`CurrentUser`]
//! extractor, AI routes additionally pass through the per-account throttle.

mod accounts;
mod ai;
mod analyses;
mod cache;
mod case_library;
mod cme_topics;
pub mod error;
mod extract;
mod origin;
mod throttle;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use consilium_core::models::TokenPolicy;
use consilium_core::Database;

use crate::ai::{AiGateway, AiProvider};
use crate::config::Config;

pub use cache::DashboardCache;
pub use error::ApiError;
pub use extract::CurrentUser;
pub use throttle::RateLimiter;

/// Shared state for handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: Arc<TokenPolicy>,
    pub password_iterations: u32,
    pub ai: AiGateway,
    pub throttle: Arc<Mutex<RateLimiter>>,
    pub dashboard: DashboardCache,
    pub cors_origins: Arc<Vec<String>>,
    pub trusted_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(db: Database, config: &Config, provider: Arc<dyn AiProvider>) -> Self {
        Self {
            db,
            tokens: Arc::new(TokenPolicy {
                secret_key: config.auth.secret_key.clone(),
                access_ttl: chrono::Duration::minutes(config.auth.access_token_lifetime_minutes),
                refresh_ttl: chrono::Duration::days(config.auth.refresh_token_lifetime_days),
            }),
            password_iterations: config.auth.password_iterations,
            ai: AiGateway::new(provider),
            throttle: Arc::new(Mutex::new(RateLimiter::new(
                config.ai.requests_per_minute,
                config.ai.requests_per_hour,
            ))),
            dashboard: DashboardCache::new(Duration::from_secs(config.cache.dashboard_ttl_secs)),
            cors_origins: Arc::new(config.server.cors_allowed_origins.clone()),
            trusted_origins: Arc::new(config.trusted_origins()),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register/", post(accounts::register))
        .route("/api/auth/login/", post(accounts::login))
        .route("/api/auth/logout/", post(accounts::logout))
        .route("/api/auth/token/refresh/", post(accounts::refresh_token))
        .route("/api/auth/profile/", get(accounts::profile))
        .route(
            "/api/auth/profile/update/",
            axum::routing::put(accounts::update_profile).patch(accounts::update_profile),
        )
        .route("/api/auth/password/change/", post(accounts::change_password));

    let analysis_routes = Router::new()
        .route(
            "/api/analyses/",
            get(analyses::list_analyses).post(analyses::create_analysis),
        )
        .route("/api/analyses/recent/", get(analyses::recent_analyses))
        .route("/api/analyses/dashboard-stats/", get(analyses::dashboard_stats))
        .route(
            "/api/analyses/{id}/",
            get(analyses::get_analysis)
                .put(analyses::replace_analysis)
                .patch(analyses::patch_analysis)
                .delete(analyses::delete_analysis),
        )
        .route("/api/analyses/{id}/complete/", post(analyses::complete_analysis))
        .route(
            "/api/analyses/{id}/longitudinal/",
            get(analyses::longitudinal_view),
        )
        .route(
            "/api/analyses/case-library/",
            get(case_library::list_cases).post(case_library::create_case),
        )
        .route("/api/analyses/case-library/search/", get(case_library::search_cases))
        .route("/api/analyses/case-library/{id}/", get(case_library::get_case))
        .route("/api/analyses/case-library/{id}/view/", post(case_library::record_view))
        .route(
            "/api/analyses/cme-topics/",
            get(cme_topics::list_topics).post(cme_topics::create_topic),
        )
        .route("/api/analyses/cme-topics/{id}/", get(cme_topics::get_topic))
        .route(
            "/api/analyses/cme-topics/{id}/complete/",
            post(cme_topics::complete_topic),
        );

    let ai_routes = Router::new()
        .route("/api/ai/clarifying-questions/", post(ai::clarifying_questions))
        .route("/api/ai/recommend-specialists/", post(ai::recommend_specialists))
        .route("/api/ai/initial-diagnoses/", post(ai::initial_diagnoses))
        .route("/api/ai/final-report/", post(ai::final_report))
        .route("/api/ai/drug-interactions/", post(ai::drug_interactions))
        .route("/api/ai/cme-topics/", post(ai::cme_topics))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            throttle::limit_ai_requests,
        ));

    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .merge(auth_routes)
        .merge(analysis_routes)
        .merge(ai_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    origin::check_origin,
                )),
        )
        .with_state(state)
}
