use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;

use super::{ApiError, AppState};

fn is_unsafe(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Reject state-changing browser requests from origins outside the trusted
/// list. Requests without an `Origin` header are not browser cross-site
/// submissions and pass through.
pub async fn check_origin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_unsafe(req.method()) {
        if let Some(origin) = req.headers().get(header::ORIGIN) {
            let trusted = origin
                .to_str()
                .map(|origin| state.trusted_origins.iter().any(|t| t == origin))
                .unwrap_or(false);
            if !trusted {
                tracing::warn!(origin = ?origin, path = %req.uri().path(), "rejected untrusted origin");
                return Err(ApiError::Forbidden("Origin not trusted".into()));
            }
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_writes_are_checked() {
        assert!(is_unsafe(&Method::DELETE));
        assert!(is_unsafe(&Method::PATCH));
        assert!(!is_unsafe(&Method::GET));
        assert!(!is_unsafe(&Method::OPTIONS));
    }
}
