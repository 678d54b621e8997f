// Database abstraction layer for multi-database support
pub mod adapter;
pub mod mysql;
pub mod postgresql;

pub use adapter::{bytes_to_hex, exact_number, numeric_text_to_json, PooledResource, StatementOutcome};
pub use mysql::MySQLPool;
pub use postgresql::PostgreSQLPool;

use crate::api::middleware::AppError;
use crate::config::PoolSettings;
use crate::models::{ConnectionConfig, EngineKind};
use std::sync::Arc;

/// Factory function to create the pool matching the config's engine.
/// No connection is opened here; the caller pings the pool afterwards.
pub fn create_pool(
    config: &ConnectionConfig,
    settings: &PoolSettings,
) -> Result<Arc<dyn PooledResource>, AppError> {
    match config.engine {
        EngineKind::PostgreSql => Ok(Arc::new(PostgreSQLPool::new(config, settings)?)),
        EngineKind::MySql => Ok(Arc::new(MySQLPool::new(config, settings)?)),
    }
}
