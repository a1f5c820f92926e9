use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::{gateway::COLLECTIONS, search::SearchCoordinator};

/// Per-collection revision counters.
///
/// Every mutation through the command layer bumps the counter for the
/// collection it touched. A reader records the revision it last observed
/// and re-fetches when the counter has moved on.
pub struct Revisions {
    counters: HashMap<&'static str, AtomicU64>,
}

impl Revisions {
    pub fn new() -> Self {
        let counters = COLLECTIONS
            .iter()
            .map(|name| (*name, AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    pub fn bump(&self, collection: &str) -> u64 {
        match self.counters.get(collection) {
            Some(counter) => counter.fetch_add(1, Ordering::SeqCst) + 1,
            None => 0,
        }
    }

    pub fn current(&self, collection: &str) -> u64 {
        self.counters
            .get(collection)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn is_stale(&self, collection: &str, observed: u64) -> bool {
        self.current(collection) != observed
    }
}

impl Default for Revisions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<RwLock<SqlitePool>>,
    pub active_household_id: Arc<Mutex<String>>,
    pub revisions: Arc<Revisions>,
    pub search: Arc<SearchCoordinator>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(RwLock::new(pool)),
            active_household_id: Arc::new(Mutex::new(String::new())),
            revisions: Arc::new(Revisions::new()),
            search: Arc::new(SearchCoordinator::new()),
        }
    }

    pub fn pool_clone(&self) -> SqlitePool {
        self.pool.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn replace_pool(&self, new_pool: SqlitePool) {
        let mut guard = self.pool.write().unwrap_or_else(|e| e.into_inner());
        *guard = new_pool;
    }

    pub fn set_active_household_id(&self, id: impl Into<String>) {
        let mut guard = self
            .active_household_id
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = id.into();
    }

    pub fn active_household_id(&self) -> String {
        self.active_household_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
