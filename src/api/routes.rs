use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use std::sync::Arc;

use crate::api::handlers::connection::AppState;
use crate::api::handlers::{connection, sql};
use crate::config::Config;
use crate::services::DriverPoolFactory;
use crate::storage::SqliteStorage;

/// Create router backed by SQLite storage and the real database drivers
pub fn create_router_with_state(storage: Arc<SqliteStorage>, config: Config) -> Router {
    let factory = Arc::new(DriverPoolFactory::new(config.pool.clone()));
    let state = AppState::new(storage.clone(), storage, factory);
    create_router(state)
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/connections",
            get(connection::list_connections).post(connection::create_connection),
        )
        .route("/api/connections/test", post(connection::test_connection))
        .route(
            "/api/connections/active",
            get(connection::get_active_connection).delete(connection::deactivate_connection),
        )
        .route("/api/connections/schema", get(connection::get_schema))
        .route(
            "/api/connections/{id}",
            put(connection::update_connection).delete(connection::delete_connection),
        )
        .route(
            "/api/connections/{id}/activate",
            post(connection::activate_connection),
        )
        .route("/api/sql/execute", post(sql::execute_sql))
        .route("/api/sql/history", get(sql::get_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
