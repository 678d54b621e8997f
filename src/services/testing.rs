// Test doubles for the driver layer and the persistence interfaces
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::api::middleware::AppError;
use crate::models::{Column, ConnectionConfig, ConnectionRequest, EngineKind, QueryHistory, Table, TenantId};
use crate::services::database::{PooledResource, StatementOutcome};
use crate::services::pool_factory::PoolFactory;
use crate::storage::{ConnectionRegistry, HistorySink};

pub fn request_for(name: &str) -> ConnectionRequest {
    ConnectionRequest {
        name: name.to_string(),
        db_type: "postgresql".to_string(),
        host: "localhost".to_string(),
        port: 5432,
        database: "shop".to_string(),
        username: "app".to_string(),
        password: "pw".to_string(),
    }
}

pub fn config_for(tenant: &TenantId, name: &str) -> ConnectionConfig {
    ConnectionConfig::from_request(tenant.clone(), &request_for(name)).unwrap()
}

pub fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Scripted driver response for one SQL string
#[derive(Clone)]
pub enum Scripted {
    Outcome(StatementOutcome),
    ExecutionFailure(String),
}

/// In-memory pooled resource. SQL not present in the script fails to prepare,
/// and so does more than one statement, as with the real drivers.
#[derive(Default)]
pub struct FakeResource {
    script: Mutex<HashMap<String, Scripted>>,
    schema: Mutex<Vec<(Table, Vec<Column>)>>,
    broken_metadata: Mutex<bool>,
    hangs_on_close: Mutex<bool>,
    closes: AtomicUsize,
    prepares: AtomicUsize,
    executes: AtomicUsize,
}

impl FakeResource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, sql: &str, response: Scripted) {
        self.script.lock().unwrap().insert(sql.to_string(), response);
    }

    pub fn rows(&self, sql: &str, columns: &[&str], rows: Vec<Map<String, Value>>) {
        self.script(
            sql,
            Scripted::Outcome(StatementOutcome::Rows {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            }),
        );
    }

    pub fn add_table(&self, table: Table, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(name, data_type)| Column {
                name: name.to_string(),
                data_type: data_type.to_string(),
            })
            .collect();
        self.schema.lock().unwrap().push((table, columns));
    }

    pub fn break_metadata(&self) {
        *self.broken_metadata.lock().unwrap() = true;
    }

    /// Make `close` start but never complete, like a pool draining a long statement
    pub fn hang_on_close(&self) {
        *self.hangs_on_close.lock().unwrap() = true;
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Closes run on background tasks; give them a moment to start
    pub async fn wait_for_closes(&self, expected: usize) -> usize {
        for _ in 0..100 {
            if self.close_count() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.close_count()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PooledResource for FakeResource {
    fn engine(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn prepare(&self, sql: &str) -> Result<(), AppError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        let statements = sql.split(';').filter(|part| !part.trim().is_empty()).count();
        if statements > 1 {
            return Err(AppError::Database(
                "cannot insert multiple commands into a prepared statement".to_string(),
            ));
        }
        if self.script.lock().unwrap().contains_key(sql) {
            Ok(())
        } else {
            Err(AppError::Database(format!("syntax error at or near \"{}\"", sql)))
        }
    }

    async fn execute(&self, sql: &str) -> Result<StatementOutcome, AppError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().get(sql).cloned();
        match scripted {
            Some(Scripted::Outcome(outcome)) => Ok(outcome),
            Some(Scripted::ExecutionFailure(message)) => Err(AppError::Database(message)),
            None => Err(AppError::Database(format!("unexpected statement: {}", sql))),
        }
    }

    async fn tables(&self) -> Result<Vec<Table>, AppError> {
        if *self.broken_metadata.lock().unwrap() {
            return Err(AppError::Database("permission denied for schema".to_string()));
        }
        Ok(self.schema.lock().unwrap().iter().map(|(t, _)| t.clone()).collect())
    }

    async fn columns(&self, table: &Table) -> Result<Vec<Column>, AppError> {
        Ok(self
            .schema
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, columns)| columns.clone())
            .unwrap_or_default())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let hangs = *self.hangs_on_close.lock().unwrap();
        if hangs {
            std::future::pending::<()>().await;
        }
    }
}

/// Pool factory handing out fake resources and remembering every one it built
#[derive(Default)]
pub struct FakePoolFactory {
    built: Mutex<Vec<(String, Arc<FakeResource>)>>,
    unreachable_hosts: Mutex<HashSet<String>>,
}

impl FakePoolFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn make_unreachable(&self, host: &str) {
        self.unreachable_hosts.lock().unwrap().insert(host.to_string());
    }

    /// Resources built so far, paired with the config id they were built for
    pub fn built(&self) -> Vec<(String, Arc<FakeResource>)> {
        self.built.lock().unwrap().clone()
    }

    pub fn last_built(&self) -> Arc<FakeResource> {
        self.built.lock().unwrap().last().map(|(_, r)| r.clone()).unwrap()
    }

    fn check_reachable(&self, host: &str) -> Result<(), AppError> {
        if self.unreachable_hosts.lock().unwrap().contains(host) {
            return Err(AppError::ConnectionTestFailed(format!("could not connect to {}", host)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PoolFactory for FakePoolFactory {
    async fn build(&self, config: &ConnectionConfig) -> Result<Arc<dyn PooledResource>, AppError> {
        self.check_reachable(&config.host)?;
        let resource = FakeResource::new();
        self.built.lock().unwrap().push((config.id.clone(), resource.clone()));
        Ok(resource)
    }

    async fn test_only(&self, request: &ConnectionRequest) -> Result<bool, AppError> {
        request.engine()?;
        self.check_reachable(&request.host)?;
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryRegistry {
    configs: Mutex<Vec<ConnectionConfig>>,
}

impl InMemoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl ConnectionRegistry for InMemoryRegistry {
    async fn save(&self, config: &ConnectionConfig) -> Result<(), AppError> {
        let mut configs = self.configs.lock().unwrap();
        configs.retain(|c| c.id != config.id);
        configs.push(config.clone());
        Ok(())
    }

    async fn find_by_id_and_tenant(
        &self,
        id: &str,
        tenant: &TenantId,
    ) -> Result<Option<ConnectionConfig>, AppError> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && &c.tenant_id == tenant)
            .cloned())
    }

    async fn find_all_by_tenant(&self, tenant: &TenantId) -> Result<Vec<ConnectionConfig>, AppError> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn delete(&self, config: &ConnectionConfig) -> Result<bool, AppError> {
        let mut configs = self.configs.lock().unwrap();
        let before = configs.len();
        configs.retain(|c| !(c.id == config.id && c.tenant_id == config.tenant_id));
        Ok(configs.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryHistory {
    entries: Mutex<Vec<QueryHistory>>,
    failing: Mutex<bool>,
}

impl InMemoryHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<QueryHistory> {
        self.entries.lock().unwrap().clone()
    }

    pub fn fail_writes(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait::async_trait]
impl HistorySink for InMemoryHistory {
    async fn record(&self, entry: &QueryHistory) -> Result<(), AppError> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::Database("history table is locked".to_string()));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn history_for(
        &self,
        tenant: &TenantId,
        connection_id: &str,
    ) -> Result<Vec<QueryHistory>, AppError> {
        let mut entries: Vec<QueryHistory> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.tenant_id == tenant && e.connection_id == connection_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(entries)
    }
}
