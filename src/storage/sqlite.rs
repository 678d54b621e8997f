use rusqlite::{Connection, Result as SqliteResult, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::models::{ConnectionConfig, EngineKind, QueryHistory, QueryType, TenantId};
use crate::storage::{ConnectionRegistry, HistorySink};

const CONNECTION_COLUMNS: &str =
    "id, tenant_id, name, db_type, host, port, database_name, username, password, created_at";

/// SQLite storage for connection configs and query history
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            let mut cleaned = path_str.trim_start_matches("sqlite:");
            cleaned = cleaned.trim_start_matches("//");
            cleaned
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        // History rows go away with their connection
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                db_type TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                database_name TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS query_history (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                connection_id TEXT NOT NULL,
                query_text TEXT NOT NULL,
                query_type TEXT NOT NULL,
                executed_at TEXT NOT NULL,
                FOREIGN KEY (connection_id) REFERENCES connections(id) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_connections_tenant ON connections(tenant_id, created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_query_history_tenant_connection ON query_history(tenant_id, connection_id, executed_at DESC)",
            [],
        )?;

        Ok(())
    }

    fn parse_timestamp(idx: usize, value: String) -> SqliteResult<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
    }

    fn connection_from_row(row: &Row<'_>) -> SqliteResult<ConnectionConfig> {
        let db_type: String = row.get(3)?;
        let engine = db_type
            .parse::<EngineKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

        Ok(ConnectionConfig {
            id: row.get(0)?,
            tenant_id: TenantId::new(row.get::<_, String>(1)?),
            name: row.get(2)?,
            engine,
            host: row.get(4)?,
            port: row.get(5)?,
            database: row.get(6)?,
            username: row.get(7)?,
            password: row.get(8)?,
            created_at: Self::parse_timestamp(9, row.get(9)?)?,
        })
    }

    fn history_from_row(row: &Row<'_>) -> SqliteResult<QueryHistory> {
        Ok(QueryHistory {
            id: row.get(0)?,
            tenant_id: TenantId::new(row.get::<_, String>(1)?),
            connection_id: row.get(2)?,
            query_text: row.get(3)?,
            query_type: QueryType::from_keyword(&row.get::<_, String>(4)?),
            executed_at: Self::parse_timestamp(5, row.get(5)?)?,
        })
    }

    /// Save a connection config. Updates happen in place so the history
    /// rows referencing it are not cascaded away.
    pub async fn save_connection(&self, config: &ConnectionConfig) -> SqliteResult<()> {
        let db_conn = self.conn.lock().await;
        db_conn.execute(
            &format!(
                r#"
                INSERT INTO connections ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    db_type = excluded.db_type,
                    host = excluded.host,
                    port = excluded.port,
                    database_name = excluded.database_name,
                    username = excluded.username,
                    password = excluded.password
                "#,
                CONNECTION_COLUMNS
            ),
            rusqlite::params![
                config.id,
                config.tenant_id.as_str(),
                config.name,
                config.engine.as_str(),
                config.host,
                config.port,
                config.database,
                config.username,
                config.password,
                config.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a connection by ID, scoped to its owning tenant
    pub async fn get_connection(&self, id: &str, tenant: &TenantId) -> SqliteResult<Option<ConnectionConfig>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!(
            "SELECT {} FROM connections WHERE id = ?1 AND tenant_id = ?2",
            CONNECTION_COLUMNS
        ))?;

        match stmt.query_row(rusqlite::params![id, tenant.as_str()], Self::connection_from_row) {
            Ok(config) => Ok(Some(config)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List a tenant's connections, newest first
    pub async fn list_connections(&self, tenant: &TenantId) -> SqliteResult<Vec<ConnectionConfig>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(&format!(
            "SELECT {} FROM connections WHERE tenant_id = ?1 ORDER BY created_at DESC",
            CONNECTION_COLUMNS
        ))?;

        let rows = stmt.query_map(rusqlite::params![tenant.as_str()], Self::connection_from_row)?;

        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?);
        }
        Ok(connections)
    }

    /// Delete a connection owned by the given tenant
    pub async fn delete_connection(&self, id: &str, tenant: &TenantId) -> SqliteResult<bool> {
        let db_conn = self.conn.lock().await;
        let rows_affected = db_conn.execute(
            "DELETE FROM connections WHERE id = ?1 AND tenant_id = ?2",
            rusqlite::params![id, tenant.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Append a query history entry
    pub async fn save_query_history(&self, entry: &QueryHistory) -> SqliteResult<()> {
        let db_conn = self.conn.lock().await;
        db_conn.execute(
            r#"
            INSERT INTO query_history
            (id, tenant_id, connection_id, query_text, query_type, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            rusqlite::params![
                entry.id,
                entry.tenant_id.as_str(),
                entry.connection_id,
                entry.query_text,
                entry.query_type.as_str(),
                entry.executed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Query history for a tenant's connection, newest first
    pub async fn list_query_history(&self, tenant: &TenantId, connection_id: &str) -> SqliteResult<Vec<QueryHistory>> {
        let db_conn = self.conn.lock().await;
        let mut stmt = db_conn.prepare(
            r#"
            SELECT id, tenant_id, connection_id, query_text, query_type, executed_at
            FROM query_history
            WHERE tenant_id = ?1 AND connection_id = ?2
            ORDER BY executed_at DESC
            "#,
        )?;

        let rows = stmt.query_map(rusqlite::params![tenant.as_str(), connection_id], Self::history_from_row)?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }
}

#[async_trait::async_trait]
impl ConnectionRegistry for SqliteStorage {
    async fn save(&self, config: &ConnectionConfig) -> Result<(), AppError> {
        Ok(self.save_connection(config).await?)
    }

    async fn find_by_id_and_tenant(
        &self,
        id: &str,
        tenant: &TenantId,
    ) -> Result<Option<ConnectionConfig>, AppError> {
        Ok(self.get_connection(id, tenant).await?)
    }

    async fn find_all_by_tenant(&self, tenant: &TenantId) -> Result<Vec<ConnectionConfig>, AppError> {
        Ok(self.list_connections(tenant).await?)
    }

    async fn delete(&self, config: &ConnectionConfig) -> Result<bool, AppError> {
        Ok(self.delete_connection(&config.id, &config.tenant_id).await?)
    }
}

#[async_trait::async_trait]
impl HistorySink for SqliteStorage {
    async fn record(&self, entry: &QueryHistory) -> Result<(), AppError> {
        Ok(self.save_query_history(entry).await?)
    }

    async fn history_for(
        &self,
        tenant: &TenantId,
        connection_id: &str,
    ) -> Result<Vec<QueryHistory>, AppError> {
        Ok(self.list_query_history(tenant, connection_id).await?)
    }
}
