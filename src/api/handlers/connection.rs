use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{ConnectionRequest, ConnectionResponse, TenantId};
use crate::services::{ConnectionManager, PoolFactory, SchemaService, SqlExecutionService};
use crate::storage::{ConnectionRegistry, HistorySink};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub sql_service: Arc<SqlExecutionService>,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        history: Arc<dyn HistorySink>,
        factory: Arc<dyn PoolFactory>,
    ) -> Self {
        let manager = Arc::new(ConnectionManager::new(registry, factory));
        let sql_service = Arc::new(SqlExecutionService::new(manager.clone(), history));
        Self {
            manager,
            sql_service,
        }
    }
}

/// List the tenant's connections
pub async fn list_connections(
    tenant: TenantId,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let connections: Vec<ConnectionResponse> = state
        .manager
        .list_all(&tenant)
        .await?
        .iter()
        .map(ConnectionResponse::from)
        .collect();

    Ok(Json(serde_json::json!({
        "connections": connections
    })))
}

/// Save a new connection and make it the active one
pub async fn create_connection(
    tenant: TenantId,
    State(state): State<AppState>,
    Json(payload): Json<ConnectionRequest>,
) -> Result<(StatusCode, Json<ConnectionResponse>), AppError> {
    tracing::info!("Creating {} connection {} for tenant {}", payload.db_type, payload.name, tenant);
    let config = state.manager.create_and_activate(&tenant, &payload).await?;
    Ok((StatusCode::CREATED, Json(ConnectionResponse::from(&config))))
}

/// Check that unsaved parameters reach a live database
pub async fn test_connection(
    State(state): State<AppState>,
    Json(payload): Json<ConnectionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.manager.test(&payload).await {
        Ok(success) => Ok(Json(serde_json::json!({ "success": success }))),
        Err(AppError::ConnectionTestFailed(reason)) => Ok(Json(serde_json::json!({
            "success": false,
            "message": reason
        }))),
        Err(e) => Err(e),
    }
}

pub async fn get_active_connection(
    tenant: TenantId,
    State(state): State<AppState>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let config = state.manager.get_active(&tenant).await?;
    Ok(Json(ConnectionResponse::from(&config)))
}

pub async fn deactivate_connection(
    tenant: TenantId,
    State(state): State<AppState>,
) -> StatusCode {
    state.manager.deactivate(&tenant).await;
    StatusCode::NO_CONTENT
}

/// Schema of the active connection as plain text
pub async fn get_schema(
    tenant: TenantId,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resource = state.manager.get_active_resource(&tenant).await?;
    let schema = SchemaService::extract_schema(resource.as_ref()).await;
    Ok(Json(serde_json::json!({ "schema": schema })))
}

pub async fn activate_connection(
    tenant: TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let config = state.manager.activate(&tenant, &id).await?;
    Ok(Json(ConnectionResponse::from(&config)))
}

pub async fn update_connection(
    tenant: TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ConnectionRequest>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let config = state.manager.update(&tenant, &id, &payload).await?;
    Ok(Json(ConnectionResponse::from(&config)))
}

/// Delete a connection
pub async fn delete_connection(
    tenant: TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("Deleting connection: {}", id);

    state.manager.delete(&tenant, &id).await.map_err(|e| {
        tracing::warn!("Failed to delete connection {}: {}", id, e);
        e
    })?;

    Ok(StatusCode::NO_CONTENT)
}
