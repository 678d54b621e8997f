use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{ConnectionConfig, TenantId};
use crate::services::database::PooledResource;

/// A tenant's live pool together with the config it was built from
pub struct ActiveConnection {
    pub config: ConnectionConfig,
    pub resource: Arc<dyn PooledResource>,
}

impl ActiveConnection {
    pub fn new(config: ConnectionConfig, resource: Arc<dyn PooledResource>) -> Self {
        Self { config, resource }
    }
}

/// Process-wide table of active connections, at most one per tenant.
///
/// Entries are swapped under the write lock and the displaced pool is
/// closed on a background task. Readers observe either the old or the new
/// entry, and callers never wait for statements still running on the old pool.
#[derive(Default)]
pub struct ActiveConnectionTable {
    entries: RwLock<HashMap<TenantId, Arc<ActiveConnection>>>,
}

impl ActiveConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `entry` for the tenant and close whatever it replaces
    pub async fn put(&self, tenant: TenantId, entry: ActiveConnection) {
        let displaced = {
            let mut entries = self.entries.write().await;
            entries.insert(tenant.clone(), Arc::new(entry))
        };

        if let Some(old) = displaced {
            tracing::info!(
                "Replacing active connection {} for tenant {}",
                old.config.id,
                tenant
            );
            Self::close_in_background(old, tenant);
        }
    }

    fn close_in_background(old: Arc<ActiveConnection>, tenant: TenantId) {
        tokio::spawn(async move {
            old.resource.close().await;
            tracing::info!("Closed active connection {} for tenant {}", old.config.id, tenant);
        });
    }

    pub async fn get(&self, tenant: &TenantId) -> Option<Arc<ActiveConnection>> {
        let entries = self.entries.read().await;
        entries.get(tenant).cloned()
    }

    /// Evict and close the tenant's entry. Returns false when there was none.
    pub async fn remove(&self, tenant: &TenantId) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            entries.remove(tenant)
        };

        match removed {
            Some(old) => {
                Self::close_in_background(old, tenant.clone());
                true
            }
            None => false,
        }
    }

    /// Evict and close the tenant's entry only if it was built from `connection_id`
    pub async fn remove_if(&self, tenant: &TenantId, connection_id: &str) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            match entries.get(tenant) {
                Some(active) if active.config.id == connection_id => entries.remove(tenant),
                _ => None,
            }
        };

        match removed {
            Some(old) => {
                Self::close_in_background(old, tenant.clone());
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{config_for, FakeResource};
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_replaces_and_closes_previous() {
        let table = ActiveConnectionTable::new();
        let tenant = TenantId::new("alice");
        let first = FakeResource::new();
        let second = FakeResource::new();

        table
            .put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "a"), first.clone()))
            .await;
        table
            .put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "b"), second.clone()))
            .await;

        assert_eq!(table.len().await, 1);
        assert_eq!(table.get(&tenant).await.unwrap().config.name, "b");
        assert_eq!(first.wait_for_closes(1).await, 1);
        assert_eq!(second.close_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let table = ActiveConnectionTable::new();
        let tenant = TenantId::new("alice");
        let resource = FakeResource::new();
        table
            .put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "a"), resource.clone()))
            .await;

        assert!(table.remove(&tenant).await);
        assert!(!table.remove(&tenant).await);
        assert!(table.get(&tenant).await.is_none());
        assert_eq!(resource.wait_for_closes(1).await, 1);
    }

    #[tokio::test]
    async fn test_remove_if_only_matches_active_config() {
        let table = ActiveConnectionTable::new();
        let tenant = TenantId::new("alice");
        let resource = FakeResource::new();
        let config = config_for(&tenant, "a");
        let active_id = config.id.clone();
        table
            .put(tenant.clone(), ActiveConnection::new(config, resource.clone()))
            .await;

        assert!(!table.remove_if(&tenant, "some-other-id").await);
        assert!(table.get(&tenant).await.is_some());

        assert!(table.remove_if(&tenant, &active_id).await);
        assert!(table.is_empty().await);
        assert_eq!(resource.wait_for_closes(1).await, 1);
    }

    #[tokio::test]
    async fn test_slow_close_does_not_block_swap_or_remove() {
        let table = ActiveConnectionTable::new();
        let tenant = TenantId::new("alice");
        let stuck = FakeResource::new();
        stuck.hang_on_close();
        let next = FakeResource::new();
        next.hang_on_close();

        table
            .put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "a"), stuck.clone()))
            .await;

        let swap = tokio::time::timeout(
            Duration::from_secs(1),
            table.put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "b"), next.clone())),
        )
        .await;
        assert!(swap.is_ok());
        assert_eq!(table.get(&tenant).await.unwrap().config.name, "b");

        let removed = tokio::time::timeout(Duration::from_secs(1), table.remove(&tenant)).await;
        assert_eq!(removed.ok(), Some(true));

        // both closes were started even though neither finishes
        assert_eq!(stuck.wait_for_closes(1).await, 1);
        assert_eq!(next.wait_for_closes(1).await, 1);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let table = Arc::new(ActiveConnectionTable::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let table = table.clone();
            handles.push(tokio::spawn(async move {
                let tenant = TenantId::new(format!("tenant-{}", i));
                let resource = FakeResource::new();
                table
                    .put(tenant.clone(), ActiveConnection::new(config_for(&tenant, "db"), resource))
                    .await;
                table.get(&tenant).await.unwrap().config.tenant_id.clone()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), TenantId::new(format!("tenant-{}", i)));
        }
        assert_eq!(table.len().await, 8);
    }
}
