//! Per-account throttling of the AI routes.
//!
//! Sliding windows of one minute and one hour. Staff accounts are exempt.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use super::{ApiError, AppState, CurrentUser};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct RateLimiter {
    windows: HashMap<Uuid, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            last_sweep: Instant::now(),
        }
    }

    /// Record a request for `account`, or return the seconds until one
    /// would be accepted.
    pub fn check(&mut self, account: Uuid) -> Result<(), u64> {
        self.check_at(account, Instant::now())
    }

    fn check_at(&mut self, account: Uuid, now: Instant) -> Result<(), u64> {
        self.sweep(now);

        let entries = self.windows.entry(account).or_default();
        entries.retain(|ts| now.duration_since(*ts) < HOUR);

        let in_last_minute: Vec<&Instant> = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < MINUTE)
            .collect();
        if in_last_minute.len() as u32 >= self.per_minute {
            return Err(retry_after(in_last_minute.first().copied(), MINUTE, now));
        }
        if entries.len() as u32 >= self.per_hour {
            return Err(retry_after(entries.first(), HOUR, now));
        }

        entries.push(now);
        Ok(())
    }

    /// Drop accounts with nothing left in the hour window, at most once a minute.
    fn sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < MINUTE {
            return;
        }
        self.windows
            .retain(|_, entries| entries.last().is_some_and(|ts| now.duration_since(*ts) < HOUR));
        self.last_sweep = now;
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Whole seconds until `oldest` leaves a window of length `window`, at least 1.
/// With no recorded request (a zero limit) the whole window applies.
fn retry_after(oldest: Option<&Instant>, window: Duration, now: Instant) -> u64 {
    let remaining = match oldest {
        Some(oldest) => window.saturating_sub(now.duration_since(*oldest)),
        None => window,
    };
    remaining.as_secs_f64().ceil().max(1.0) as u64
}

/// Route layer for `/api/ai/`. Authenticates first so anonymous callers get
/// 401 rather than consuming a slot.
pub async fn limit_ai_requests(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !account.is_staff {
        // MutexGuard is !Send, release it before awaiting
        let verdict = {
            let mut limiter = state
                .throttle
                .lock()
                .map_err(|_| ApiError::Internal("rate limiter lock poisoned".into()))?;
            limiter.check(account.id)
        };
        if let Err(retry_after) = verdict {
            tracing::warn!(account_id = %account.id, retry_after, "AI request throttled");
            return Err(ApiError::RateLimited { retry_after });
        }
    }

    req.extensions_mut().insert(CurrentUser(account));
    Ok(next.run(req).await)
}
