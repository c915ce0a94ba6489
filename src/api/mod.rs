// src/api/mod.rs

pub mod health;
pub mod monitor;

use std::sync::Arc;

// AppState definition
use crate::config::Config;
use crate::db::Database;
use crate::services::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub scheduler: Arc<Scheduler>,
}

#[cfg(test)]
pub(crate) fn test_state(store: Arc<crate::services::testing::MemoryStore>) -> AppState {
    AppState {
        db: crate::db::test_database(),
        config: crate::config::test_config(),
        scheduler: Arc::new(Scheduler::new(Arc::new(
            crate::services::testing::idle_engine(store),
        ))),
    }
}
