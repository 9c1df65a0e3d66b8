use super::handlers;
use super::state::AppState;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    // The browser client may be served from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/process_goal", post(handlers::process_goal))
        .route("/confirm_selection", post(handlers::confirm_selection))
        .route("/get_logs", get(handlers::get_logs))
        .route("/test_apis", post(handlers::test_apis))
        .route("/get_status", get(handlers::get_status))
        .route("/get_history", get(handlers::get_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
