// MySQL pool backed by mysql_async
use crate::api::middleware::AppError;
use crate::config::PoolSettings;
use crate::models::{Column, ConnectionConfig, EngineKind, Table};
use crate::services::database::adapter::{bytes_to_hex, numeric_text_to_json, PooledResource, StatementOutcome};
use mysql_async::consts::ColumnType;
use mysql_async::{prelude::*, Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row, Value as MySqlValue};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

pub struct MySQLPool {
    pool: Pool,
    connection_uri: String,
    checkout_timeout: Duration,
    closed: AtomicBool,
}

impl MySQLPool {
    /// Builds the pool without connecting. TLS stays off: no ssl options are set.
    pub fn new(config: &ConnectionConfig, settings: &PoolSettings) -> Result<Self, AppError> {
        let connection_uri = config.connection_uri();

        // Validate MySQL URL format
        let url = Url::parse(&connection_uri)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;
        if url.scheme() != "mysql" {
            return Err(AppError::Validation("URL must use mysql:// scheme".to_string()));
        }

        let opts = Opts::from_url(&connection_uri)
            .map_err(|e| AppError::Validation(format!("Invalid MySQL URL: {}", e)))?;
        let constraints = PoolConstraints::new(1, settings.max_size.max(1)).unwrap_or_default();

        let builder = OptsBuilder::from_opts(opts)
            .user(Some(config.username.clone()))
            .pass(Some(config.password.clone()))
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        Ok(Self {
            pool: Pool::new(builder),
            connection_uri,
            checkout_timeout: settings.checkout_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<Conn, AppError> {
        match tokio::time::timeout(self.checkout_timeout, self.pool.get_conn()).await {
            Ok(conn) => {
                conn.map_err(|e| AppError::Connection(format!("Failed to get MySQL connection from pool: {}", e)))
            }
            Err(_) => Err(AppError::Connection(format!(
                "No MySQL connection available from {} within {} seconds",
                self.connection_uri,
                self.checkout_timeout.as_secs()
            ))),
        }
    }

    /// Text protocol values arrive as bytes; numeric columns become JSON numbers
    fn mysql_value_to_json(mysql_val: MySqlValue, column_type: ColumnType) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(text) if Self::is_numeric(column_type) => numeric_text_to_json(text),
                Ok(text) => Value::String(text),
                Err(e) => Value::String(bytes_to_hex(e.as_bytes())),
            },
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }

    fn is_numeric(column_type: ColumnType) -> bool {
        matches!(
            column_type,
            ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_YEAR
                | ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL
        )
    }

    fn row_to_json(row: &Row) -> Map<String, Value> {
        let mut row_obj = Map::new();
        for (idx, column) in row.columns_ref().iter().enumerate() {
            let value = match row.as_ref(idx) {
                Some(mysql_val) => Self::mysql_value_to_json(mysql_val.clone(), column.column_type()),
                None => Value::Null,
            };
            row_obj.insert(column.name_str().to_string(), value);
        }
        row_obj
    }
}

#[async_trait::async_trait]
impl PooledResource for MySQLPool {
    fn engine(&self) -> EngineKind {
        EngineKind::MySql
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| AppError::ConnectionTestFailed(e.to_string()))?;
        conn.ping()
            .await
            .map_err(|e| AppError::ConnectionTestFailed(e.to_string()))
    }

    async fn prepare(&self, sql: &str) -> Result<(), AppError> {
        let mut conn = self.get_conn().await?;
        let statement = conn
            .prep(sql)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        conn.close(statement)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn execute(&self, sql: &str) -> Result<StatementOutcome, AppError> {
        let mut conn = self.get_conn().await?;

        let mut result = conn
            .query_iter(sql)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let columns: Vec<String> = result
            .columns_ref()
            .iter()
            .map(|c| c.name_str().to_string())
            .collect();

        if columns.is_empty() {
            let affected = result.affected_rows();
            result
                .drop_result()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(StatementOutcome::Affected(affected));
        }

        let rows: Vec<Row> = result
            .collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        result
            .drop_result()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(StatementOutcome::Rows {
            columns,
            rows: rows.iter().map(Self::row_to_json).collect(),
        })
    }

    async fn tables(&self) -> Result<Vec<Table>, AppError> {
        let mut conn = self.get_conn().await?;
        let names: Vec<String> = conn
            .query(
                r#"
                SELECT TABLE_NAME
                FROM information_schema.TABLES
                WHERE TABLE_SCHEMA = DATABASE()
                  AND TABLE_TYPE = 'BASE TABLE'
                ORDER BY TABLE_NAME
                "#,
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tables: {}", e)))?;

        // MySQL reports the database as catalog, not schema
        Ok(names
            .into_iter()
            .map(|name| Table { name, schema: None })
            .collect())
    }

    async fn columns(&self, table: &Table) -> Result<Vec<Column>, AppError> {
        let mut conn = self.get_conn().await?;
        let rows: Vec<(String, String)> = conn
            .exec(
                r#"
                SELECT COLUMN_NAME, DATA_TYPE
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION
                "#,
                (table.schema.clone(), table.name.clone()),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get columns: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type)| Column {
                name,
                data_type: data_type.to_uppercase(),
            })
            .collect())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.pool.clone().disconnect().await {
            Ok(()) => tracing::info!("Closed MySQL pool for: {}", self.connection_uri),
            Err(e) => tracing::warn!("Failed to close MySQL pool for {}: {}", self.connection_uri, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionRequest, TenantId};
    use serde_json::json;
    use std::time::Instant;

    #[test]
    fn test_text_values_by_column_type() {
        let bytes = |s: &str| MySqlValue::Bytes(s.as_bytes().to_vec());
        assert_eq!(
            MySQLPool::mysql_value_to_json(bytes("42"), ColumnType::MYSQL_TYPE_LONG),
            json!(42)
        );
        assert_eq!(
            MySQLPool::mysql_value_to_json(bytes("1234567890.123456789012"), ColumnType::MYSQL_TYPE_NEWDECIMAL),
            json!("1234567890.123456789012")
        );
        assert_eq!(
            MySQLPool::mysql_value_to_json(bytes("42"), ColumnType::MYSQL_TYPE_VAR_STRING),
            json!("42")
        );
        assert_eq!(
            MySQLPool::mysql_value_to_json(MySqlValue::NULL, ColumnType::MYSQL_TYPE_LONG),
            Value::Null
        );
    }

    #[test]
    fn test_binary_cells_are_hex_encoded() {
        let value = MySqlValue::Bytes(vec![0xff, 0x00, 0x10]);
        assert_eq!(
            MySQLPool::mysql_value_to_json(value, ColumnType::MYSQL_TYPE_BLOB),
            json!("\\xff0010")
        );
    }

    #[tokio::test]
    async fn test_silent_server_hits_checkout_timeout() {
        // Accepts connections but never sends the handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = ConnectionConfig::from_request(
            TenantId::new("alice"),
            &ConnectionRequest {
                name: "silent".to_string(),
                db_type: "mysql".to_string(),
                host: "127.0.0.1".to_string(),
                port,
                database: "shop".to_string(),
                username: "app".to_string(),
                password: "pw".to_string(),
            },
        )
        .unwrap();
        let pool = MySQLPool::new(
            &config,
            &PoolSettings {
                max_size: 2,
                connect_timeout_secs: 1,
                checkout_timeout_secs: 1,
            },
        )
        .unwrap();

        let started = Instant::now();
        let result = pool.tables().await;
        assert!(matches!(result, Err(AppError::Connection(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
