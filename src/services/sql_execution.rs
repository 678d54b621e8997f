use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::api::middleware::AppError;
use crate::models::{ExecutionErrorKind, ExecutionResult, QueryHistory, QueryType, TenantId};
use crate::services::active_connections::ActiveConnection;
use crate::services::connection_manager::ConnectionManager;
use crate::services::database::StatementOutcome;
use crate::storage::HistorySink;

/// Aggregate markers in priority order, with the label shown for each
const AGGREGATES: [(&str, &str, &str); 6] = [
    ("COUNT(", "COUNT", "Total Count"),
    ("SUM(", "SUM", "Sum"),
    ("AVG(", "AVG", "Average"),
    ("MAX(", "MAX", "Maximum"),
    ("MIN(", "MIN", "Minimum"),
    ("GROUP BY", "AGGREGATE", "Result"),
];

/// Runs free-form SQL against a tenant's active connection and shapes the outcome
pub struct SqlExecutionService {
    manager: Arc<ConnectionManager>,
    history: Arc<dyn HistorySink>,
}

impl SqlExecutionService {
    pub fn new(manager: Arc<ConnectionManager>, history: Arc<dyn HistorySink>) -> Self {
        Self { manager, history }
    }

    /// Execute one statement.
    ///
    /// Statement failures are reported inside the returned [`ExecutionResult`];
    /// only a missing active connection is an `Err`. Every successful
    /// execution is recorded in the history exactly once.
    pub async fn execute(&self, tenant: &TenantId, raw_sql: &str) -> Result<ExecutionResult, AppError> {
        let sql = raw_sql.trim();
        if sql.is_empty() {
            return Ok(ExecutionResult::error(
                ExecutionErrorKind::EmptyQuery,
                "SQL query cannot be empty",
            ));
        }

        let active = self.manager.get_active_connection(tenant).await?;
        let resource = &active.resource;
        let start_time = Instant::now();

        if let Err(e) = resource.prepare(sql).await {
            tracing::debug!("Statement rejected while preparing: {}", e);
            return Ok(ExecutionResult::error(
                ExecutionErrorKind::Syntax,
                format!("SQL syntax error: {}", driver_message(e)),
            ));
        }

        let query_type = QueryType::detect(sql);
        let result = match resource.execute(sql).await {
            Ok(StatementOutcome::Rows { columns, rows }) => shape_rows(sql, columns, rows),
            Ok(StatementOutcome::Affected(affected_rows)) => ExecutionResult::Mutation {
                affected_rows,
                query_type,
            },
            Err(e) => {
                tracing::warn!("Execution failed on connection {}: {}", active.config.id, e);
                return Ok(ExecutionResult::error(
                    ExecutionErrorKind::Execution,
                    format!("Execution error: {}", driver_message(e)),
                ));
            }
        };

        tracing::info!(
            "Executed {} on connection {} in {}ms",
            query_type.as_str(),
            active.config.id,
            start_time.elapsed().as_millis()
        );

        self.record(tenant, &active, raw_sql, query_type).await;
        Ok(result)
    }

    async fn record(&self, tenant: &TenantId, active: &ActiveConnection, sql: &str, query_type: QueryType) {
        let entry = QueryHistory::new(tenant.clone(), active.config.id.clone(), sql.to_string(), query_type);
        if let Err(e) = self.history.record(&entry).await {
            tracing::error!("Failed to record query history for tenant {}: {}", tenant, e);
        }
    }

    /// History of the tenant's active connection, newest first
    pub async fn history(&self, tenant: &TenantId) -> Result<Vec<QueryHistory>, AppError> {
        let active = self.manager.get_active(tenant).await?;
        self.history.history_for(tenant, &active.id).await
    }
}

/// Pick between an aggregate and a row set for a statement that produced rows
fn shape_rows(sql: &str, columns: Vec<String>, mut rows: Vec<Map<String, Value>>) -> ExecutionResult {
    if rows.len() == 1 && columns.len() == 1 {
        let upper = sql.to_uppercase();
        if let Some((_, function, label)) = AGGREGATES.iter().find(|(marker, _, _)| upper.contains(marker)) {
            let value = rows
                .pop()
                .and_then(|row| row.into_iter().next())
                .map(|(_, v)| v)
                .unwrap_or(Value::Null);
            return ExecutionResult::Aggregate {
                function: function.to_string(),
                value,
                display_name: label.to_string(),
            };
        }
    }

    let row_count = rows.len();
    ExecutionResult::RowSet {
        columns,
        rows,
        row_count,
    }
}

/// Strip our own error prefix so the driver's wording reaches the caller
fn driver_message(err: AppError) -> String {
    match err {
        AppError::Database(message) => message,
        other => other.to_string(),
    }
}
