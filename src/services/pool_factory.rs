use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::PoolSettings;
use crate::models::{ConnectionConfig, ConnectionRequest};
use crate::services::database::{create_pool, PooledResource};

/// Builds validated connection pools from stored or unsaved configs
#[async_trait::async_trait]
pub trait PoolFactory: Send + Sync {
    /// Build a pool and confirm one physical connection answers.
    /// A pool that fails the ping is closed before the error is returned.
    async fn build(&self, config: &ConnectionConfig) -> Result<Arc<dyn PooledResource>, AppError>;

    /// Same open-and-ping sequence for unsaved parameters; nothing is retained
    async fn test_only(&self, request: &ConnectionRequest) -> Result<bool, AppError>;
}

/// Pool factory backed by the real PostgreSQL and MySQL drivers
pub struct DriverPoolFactory {
    settings: PoolSettings,
}

impl DriverPoolFactory {
    pub fn new(settings: PoolSettings) -> Self {
        Self { settings }
    }

    /// Ping the pool under the connect timeout, closing it on failure
    async fn ensure_live(&self, resource: &Arc<dyn PooledResource>, uri: &str) -> Result<(), AppError> {
        let timeout = self.settings.connect_timeout();
        let outcome = match tokio::time::timeout(timeout, resource.ping()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ConnectionTestFailed(format!(
                "no response from {} within {} seconds",
                uri,
                timeout.as_secs()
            ))),
        };

        if let Err(e) = outcome {
            tracing::warn!("Liveness check failed for {}: {}", uri, e);
            resource.close().await;
            return Err(match e {
                AppError::ConnectionTestFailed(_) => e,
                other => AppError::ConnectionTestFailed(other.to_string()),
            });
        }

        Ok(())
    }
}

impl Default for DriverPoolFactory {
    fn default() -> Self {
        Self::new(PoolSettings::default())
    }
}

#[async_trait::async_trait]
impl PoolFactory for DriverPoolFactory {
    async fn build(&self, config: &ConnectionConfig) -> Result<Arc<dyn PooledResource>, AppError> {
        let uri = config.connection_uri();
        tracing::info!(
            "Creating {} pool for: {} (max_size: {})",
            config.engine.as_str(),
            uri,
            self.settings.max_size
        );

        let resource = create_pool(config, &self.settings)?;
        self.ensure_live(&resource, &uri).await?;

        tracing::info!("Successfully created connection pool for: {}", uri);
        Ok(resource)
    }

    async fn test_only(&self, request: &ConnectionRequest) -> Result<bool, AppError> {
        let config = request.to_transient_config()?;
        let uri = config.connection_uri();

        let resource = create_pool(&config, &self.settings)?;
        self.ensure_live(&resource, &uri).await?;
        resource.close().await;

        tracing::info!("Test connection succeeded for: {}", uri);
        Ok(true)
    }
}
