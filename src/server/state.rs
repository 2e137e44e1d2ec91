//! Shared application state.

use crate::config::Config;
use crate::db::Database;
use crate::lifecycle::BookLifecycle;
use crate::tasks::TaskQueue;
use std::sync::Arc;

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Catalog database.
    pub db: Database,
    /// Producer handle into the task pipeline.
    pub queue: TaskQueue,
    /// Book lifecycle for page serving.
    pub lifecycle: BookLifecycle,
}

impl AppState {
    /// Assemble the state from its parts.
    pub fn new(config: Config, db: Database, queue: TaskQueue) -> Self {
        let lifecycle = BookLifecycle::new(db.clone(), config.media.thumbnail_size);
        Self {
            config: Arc::new(config),
            db,
            queue,
            lifecycle,
        }
    }
}
