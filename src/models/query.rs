use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::connection::TenantId;

/// Statement kind derived from the leading keyword of a SQL string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Merge,
    Call,
    Explain,
    Other,
}

impl QueryType {
    pub fn detect(sql: &str) -> Self {
        let first_word = sql.split_whitespace().next().unwrap_or_default();
        Self::from_keyword(first_word)
    }

    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_uppercase().as_str() {
            "SELECT" => QueryType::Select,
            "INSERT" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            "CREATE" => QueryType::Create,
            "ALTER" => QueryType::Alter,
            "DROP" => QueryType::Drop,
            "TRUNCATE" => QueryType::Truncate,
            "MERGE" => QueryType::Merge,
            "CALL" => QueryType::Call,
            "EXPLAIN" => QueryType::Explain,
            _ => QueryType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Create => "CREATE",
            QueryType::Alter => "ALTER",
            QueryType::Drop => "DROP",
            QueryType::Truncate => "TRUNCATE",
            QueryType::Merge => "MERGE",
            QueryType::Call => "CALL",
            QueryType::Explain => "EXPLAIN",
            QueryType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    EmptyQuery,
    Syntax,
    Execution,
}

/// Shaped outcome of a single SQL execution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    RowSet {
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
        row_count: usize,
    },
    Aggregate {
        function: String,
        value: Value,
        display_name: String,
    },
    Mutation {
        affected_rows: u64,
        query_type: QueryType,
    },
    Error {
        #[serde(rename = "error_kind")]
        kind: ExecutionErrorKind,
        message: String,
    },
}

impl ExecutionResult {
    pub fn error(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        ExecutionResult::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ExecutionResult::Error { .. })
    }

    /// Human readable summary, matching what the UI shows next to the result
    pub fn message(&self) -> String {
        match self {
            ExecutionResult::RowSet { row_count, .. } => format!("{} row(s) returned", row_count),
            ExecutionResult::Aggregate { function, value, .. } => format!("{} result: {}", function, value),
            ExecutionResult::Mutation { affected_rows, query_type } => format!(
                "{} operation completed successfully. Affected rows: {}",
                query_type.as_str(),
                affected_rows
            ),
            ExecutionResult::Error { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
}

/// One successfully executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistory {
    pub id: String,
    pub tenant_id: TenantId,
    pub connection_id: String,
    pub query_text: String,
    pub query_type: QueryType,
    pub executed_at: DateTime<Utc>,
}

impl QueryHistory {
    pub fn new(tenant_id: TenantId, connection_id: String, query_text: String, query_type: QueryType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            connection_id,
            query_text,
            query_type,
            executed_at: Utc::now(),
        }
    }
}
