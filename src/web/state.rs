use crate::core::api_logs::ApiLogBook;
use crate::core::assistant::Assistant;
use std::sync::Arc;
use std::time::Instant;

/// Shared by every handler; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub log_book: Arc<ApiLogBook>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(assistant: Assistant, log_book: Arc<ApiLogBook>) -> Self {
        Self {
            assistant: Arc::new(assistant),
            log_book,
            start_time: Instant::now(),
        }
    }
}
