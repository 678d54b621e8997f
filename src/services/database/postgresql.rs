// PostgreSQL pool backed by deadpool-postgres
use crate::api::middleware::AppError;
use crate::config::PoolSettings;
use crate::models::{Column, ConnectionConfig, EngineKind, Table};
use crate::services::database::adapter::{numeric_text_to_json, PooledResource, StatementOutcome};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::types::Type;
use tokio_postgres::{NoTls, SimpleQueryMessage, SimpleQueryRow};
use url::Url;

pub struct PostgreSQLPool {
    pool: Pool,
    connection_uri: String,
    closed: AtomicBool,
}

impl PostgreSQLPool {
    pub fn new(config: &ConnectionConfig, settings: &PoolSettings) -> Result<Self, AppError> {
        let connection_uri = config.connection_uri();

        // Validate PostgreSQL URL format
        let url = Url::parse(&connection_uri)
            .map_err(|e| AppError::Validation(format!("Invalid PostgreSQL URL: {}", e)))?;
        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(AppError::Validation("URL must use postgresql:// or postgres:// scheme".to_string()));
        }

        let mut pg_config: tokio_postgres::Config = connection_uri
            .parse()
            .map_err(|e: tokio_postgres::Error| AppError::Validation(format!("Invalid PostgreSQL URL: {}", e)))?;
        pg_config
            .user(config.username.as_str())
            .password(config.password.as_str())
            .connect_timeout(settings.connect_timeout());

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(settings.max_size)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(settings.checkout_timeout()))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self {
            pool,
            connection_uri,
            closed: AtomicBool::new(false),
        })
    }

    async fn get_client(&self) -> Result<Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get connection from pool: {}", e)))
    }

    /// Driver message with the SQLSTATE when the server reported one
    fn describe_error(e: &tokio_postgres::Error) -> String {
        match e.as_db_error() {
            Some(db_error) => format!("{} (SQLSTATE {})", db_error.message(), db_error.code().code()),
            None => e.to_string(),
        }
    }

    /// Map one text-protocol cell using the column type reported at prepare time.
    /// Values without a lossless JSON form keep the server's text rendering.
    fn text_cell_to_json(text: Option<&str>, column_type: &Type) -> Value {
        let text = match text {
            Some(text) => text,
            None => return Value::Null,
        };
        match *column_type {
            Type::BOOL => match text {
                "t" => Value::Bool(true),
                "f" => Value::Bool(false),
                other => Value::String(other.to_string()),
            },
            Type::INT2 | Type::INT4 | Type::INT8 | Type::OID | Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => {
                numeric_text_to_json(text.to_string())
            }
            Type::JSON | Type::JSONB => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
            }
            _ => Value::String(text.to_string()),
        }
    }

    fn row_to_json(row: &SimpleQueryRow, columns: &[(String, Type)]) -> Map<String, Value> {
        let mut row_obj = Map::new();
        for (idx, (name, column_type)) in columns.iter().enumerate() {
            row_obj.insert(name.clone(), Self::text_cell_to_json(row.get(idx), column_type));
        }
        row_obj
    }
}

#[async_trait::async_trait]
impl PooledResource for PostgreSQLPool {
    fn engine(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    async fn ping(&self) -> Result<(), AppError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionTestFailed(e.to_string()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| AppError::ConnectionTestFailed(Self::describe_error(&e)))?;
        Ok(())
    }

    async fn prepare(&self, sql: &str) -> Result<(), AppError> {
        let client = self.get_client().await?;
        client
            .prepare(sql)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Database(Self::describe_error(&e)))
    }

    async fn execute(&self, sql: &str) -> Result<StatementOutcome, AppError> {
        let client = self.get_client().await?;

        // The prepared statement tells whether the server will send rows
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| AppError::Database(Self::describe_error(&e)))?;

        if statement.columns().is_empty() {
            let affected = client
                .execute(&statement, &[])
                .await
                .map_err(|e| AppError::Database(Self::describe_error(&e)))?;
            return Ok(StatementOutcome::Affected(affected));
        }

        let columns: Vec<(String, Type)> = statement
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.type_().clone()))
            .collect();

        // Rows come back in text form so every type keeps its server rendering
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| AppError::Database(Self::describe_error(&e)))?;
        let rows = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(Self::row_to_json(row, &columns)),
                _ => None,
            })
            .collect();

        Ok(StatementOutcome::Rows {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }

    async fn tables(&self) -> Result<Vec<Table>, AppError> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    table_schema::text,
                    table_name::text
                FROM information_schema.tables
                WHERE table_type = 'BASE TABLE'
                  AND table_catalog::text = current_database()
                  AND table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
                ORDER BY table_schema, table_name
                "#,
                &[],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tables: {}", Self::describe_error(&e))))?;

        Ok(rows
            .iter()
            .map(|row| Table {
                schema: Some(row.get::<_, String>(0)),
                name: row.get::<_, String>(1),
            })
            .collect())
    }

    async fn columns(&self, table: &Table) -> Result<Vec<Column>, AppError> {
        let client = self.get_client().await?;
        let schema = table.schema.clone().unwrap_or_else(|| "public".to_string());
        let rows = client
            .query(
                r#"
                SELECT
                    column_name::text,
                    udt_name::text
                FROM information_schema.columns
                WHERE table_schema::text = $1::text AND table_name::text = $2::text
                ORDER BY ordinal_position
                "#,
                &[&schema, &table.name],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get columns: {}", Self::describe_error(&e))))?;

        Ok(rows
            .iter()
            .map(|row| Column {
                name: row.get(0),
                data_type: row.get(1),
            })
            .collect())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close();
        tracing::info!("Closed PostgreSQL pool for: {}", self.connection_uri);
    }
}
