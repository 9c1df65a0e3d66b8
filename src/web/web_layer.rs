// Web layer - the HTTP API in front of the assistant.

#[path = "error.rs"]
pub mod error;

#[path = "handlers.rs"]
pub mod handlers;

#[path = "routes.rs"]
pub mod routes;

#[path = "state.rs"]
pub mod state;

pub use routes::{create_router, start_server};
pub use state::AppState;
