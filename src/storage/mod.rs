pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::api::middleware::AppError;
use crate::models::{ConnectionConfig, QueryHistory, TenantId};

/// Persistence of tenant-owned connection configs.
///
/// Lookups are always keyed by tenant as well as id, so a config owned by
/// another tenant is indistinguishable from a missing one.
#[async_trait::async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Insert or replace a config
    async fn save(&self, config: &ConnectionConfig) -> Result<(), AppError>;

    async fn find_by_id_and_tenant(
        &self,
        id: &str,
        tenant: &TenantId,
    ) -> Result<Option<ConnectionConfig>, AppError>;

    async fn find_all_by_tenant(&self, tenant: &TenantId) -> Result<Vec<ConnectionConfig>, AppError>;

    async fn delete(&self, config: &ConnectionConfig) -> Result<bool, AppError>;
}

/// Sink for successfully executed statements
#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &QueryHistory) -> Result<(), AppError>;

    /// Entries for one tenant and connection, newest first
    async fn history_for(
        &self,
        tenant: &TenantId,
        connection_id: &str,
    ) -> Result<Vec<QueryHistory>, AppError>;
}
