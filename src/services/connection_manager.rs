use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{ConnectionConfig, ConnectionRequest, TenantId};
use crate::services::active_connections::{ActiveConnection, ActiveConnectionTable};
use crate::services::database::PooledResource;
use crate::services::pool_factory::PoolFactory;
use crate::storage::ConnectionRegistry;

/// Per-tenant connection lifecycle: registry access, activation and teardown.
///
/// Every lookup goes through the tenant-scoped registry methods, so a tenant
/// can never activate, update or delete a config it does not own.
pub struct ConnectionManager {
    registry: Arc<dyn ConnectionRegistry>,
    factory: Arc<dyn PoolFactory>,
    active: Arc<ActiveConnectionTable>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, factory: Arc<dyn PoolFactory>) -> Self {
        Self {
            registry,
            factory,
            active: Arc::new(ActiveConnectionTable::new()),
        }
    }

    pub fn active_table(&self) -> &Arc<ActiveConnectionTable> {
        &self.active
    }

    async fn load_owned(&self, tenant: &TenantId, id: &str) -> Result<ConnectionConfig, AppError> {
        self.registry
            .find_by_id_and_tenant(id, tenant)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))
    }

    /// Build a pool for the tenant's config and make it the active connection.
    /// A previously active pool is closed once the new one is installed.
    pub async fn activate(&self, tenant: &TenantId, id: &str) -> Result<ConnectionConfig, AppError> {
        let config = self.load_owned(tenant, id).await?;

        tracing::info!("Activating connection {} ({}) for tenant {}", config.name, config.id, tenant);
        let resource = self.factory.build(&config).await?;

        self.active
            .put(tenant.clone(), ActiveConnection::new(config.clone(), resource))
            .await;

        Ok(config)
    }

    /// Drop the tenant's active connection; a no-op when none is active
    pub async fn deactivate(&self, tenant: &TenantId) {
        if !self.active.remove(tenant).await {
            tracing::debug!("No active connection to close for tenant {}", tenant);
        }
    }

    /// Session-end hook
    pub async fn cleanup(&self, tenant: &TenantId) {
        self.deactivate(tenant).await;
    }

    /// Delete a config. If it is the active one, it is deactivated first.
    pub async fn delete(&self, tenant: &TenantId, id: &str) -> Result<(), AppError> {
        let config = self.load_owned(tenant, id).await?;

        if self.active.remove_if(tenant, &config.id).await {
            tracing::info!("Deleted connection {} was active; closing its pool", config.id);
        }

        if !self.registry.delete(&config).await? {
            return Err(AppError::NotFound(format!("Connection {} not found", id)));
        }

        tracing::info!("Connection deleted successfully: {}", id);
        Ok(())
    }

    /// Pre-flight reachability check; changes no state
    pub async fn test(&self, request: &ConnectionRequest) -> Result<bool, AppError> {
        self.factory.test_only(request).await
    }

    pub async fn list_all(&self, tenant: &TenantId) -> Result<Vec<ConnectionConfig>, AppError> {
        self.registry.find_all_by_tenant(tenant).await
    }

    pub async fn get_active(&self, tenant: &TenantId) -> Result<ConnectionConfig, AppError> {
        self.active
            .get(tenant)
            .await
            .map(|active| active.config.clone())
            .ok_or_else(|| AppError::NoActiveConnection(tenant.to_string()))
    }

    pub async fn get_active_connection(&self, tenant: &TenantId) -> Result<Arc<ActiveConnection>, AppError> {
        self.active
            .get(tenant)
            .await
            .ok_or_else(|| AppError::NoActiveConnection(tenant.to_string()))
    }

    pub async fn get_active_resource(&self, tenant: &TenantId) -> Result<Arc<dyn PooledResource>, AppError> {
        Ok(self.get_active_connection(tenant).await?.resource.clone())
    }

    /// Validate and persist a new config without activating it
    pub async fn create(&self, tenant: &TenantId, request: &ConnectionRequest) -> Result<ConnectionConfig, AppError> {
        let config = ConnectionConfig::from_request(tenant.clone(), request)?;
        self.registry.save(&config).await?;
        tracing::info!("Saved connection {} ({}) for tenant {}", config.name, config.id, tenant);
        Ok(config)
    }

    /// Persist a new config, then activate it.
    /// The saved config is kept even when activation fails.
    pub async fn create_and_activate(
        &self,
        tenant: &TenantId,
        request: &ConnectionRequest,
    ) -> Result<ConnectionConfig, AppError> {
        let config = self.create(tenant, request).await?;
        self.activate(tenant, &config.id).await
    }

    /// Replace the parameters of an owned config.
    /// An active pool keeps its old parameters until the next activation.
    pub async fn update(
        &self,
        tenant: &TenantId,
        id: &str,
        request: &ConnectionRequest,
    ) -> Result<ConnectionConfig, AppError> {
        let mut config = self.load_owned(tenant, id).await?;
        config.apply(request)?;
        self.registry.save(&config).await?;
        tracing::info!("Updated connection {} for tenant {}", config.id, tenant);
        Ok(config)
    }
}
