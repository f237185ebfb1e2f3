//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use wayfarer_chat::SuggestService;
use wayfarer_core::config::WayfarerConfig;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WayfarerConfig>,
    pub suggest: Arc<SuggestService>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: WayfarerConfig, suggest: SuggestService) -> Self {
        Self {
            config: Arc::new(config),
            suggest: Arc::new(suggest),
            start_time: Instant::now(),
        }
    }
}
