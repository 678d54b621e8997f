use axum::{extract::State, Json};

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{SqlRequest, TenantId};

/// Execute SQL against the tenant's active connection.
/// Statement failures come back as a result with `success: false`.
pub async fn execute_sql(
    tenant: TenantId,
    State(state): State<AppState>,
    Json(payload): Json<SqlRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state.sql_service.execute(&tenant, &payload.sql).await?;

    Ok(Json(serde_json::json!({
        "success": result.is_success(),
        "message": result.message(),
        "result": result
    })))
}

/// Statements executed on the active connection, newest first
pub async fn get_history(
    tenant: TenantId,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let history = state.sql_service.history(&tenant).await?;
    Ok(Json(serde_json::json!({ "history": history })))
}
