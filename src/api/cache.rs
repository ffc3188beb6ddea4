//! Short-lived per-account cache for dashboard statistics.
//!
//! Every invalidation bumps a generation counter. Stats computed under an
//! older generation are not stored, so a write racing a dashboard read
//! cannot leave stale numbers behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use consilium_core::models::DashboardStats;

#[derive(Default)]
struct Entries {
    generation: u64,
    stats: HashMap<Uuid, (Instant, DashboardStats)>,
}

#[derive(Clone)]
pub struct DashboardCache {
    ttl: Duration,
    entries: Arc<Mutex<Entries>>,
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(Entries::default())),
        }
    }

    /// Take before computing stats, hand back to [`DashboardCache::insert`].
    pub fn generation(&self) -> u64 {
        self.entries.lock().map(|e| e.generation).unwrap_or(u64::MAX)
    }

    pub fn get(&self, account: Uuid) -> Option<DashboardStats> {
        let mut entries = self.entries.lock().ok()?;
        match entries.stats.get(&account) {
            Some((stored, stats)) if stored.elapsed() < self.ttl => Some(stats.clone()),
            Some(_) => {
                entries.stats.remove(&account);
                None
            }
            None => None,
        }
    }

    /// Store `stats` unless something was invalidated since `generation`.
    pub fn insert(&self, account: Uuid, generation: u64, stats: DashboardStats) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            if entries.generation == generation {
                entries.stats.insert(account, (Instant::now(), stats));
            }
        }
    }

    /// Forget the cached stats of `account` after one of its analyses changed.
    pub fn invalidate(&self, account: Uuid) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.generation = entries.generation.wrapping_add(1);
            entries.stats.remove(&account);
        }
    }
}
