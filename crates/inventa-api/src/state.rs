use std::sync::Arc;

use anyhow::Result;

use inventa_db::Database;

use crate::config::Config;
use crate::sessions::SessionStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppStateInner {
    /// Open the configured storage backend and build the shared state.
    pub fn new(config: Config) -> Result<AppState> {
        let db = Database::open(&config.storage)?;
        let sessions = SessionStore::new(config.session_ttl);
        Ok(Arc::new(Self {
            db,
            sessions,
            config,
        }))
    }
}
