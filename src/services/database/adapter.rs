// Pooled resource trait for multi-database support
use crate::api::middleware::AppError;
use crate::models::{Column, EngineKind, Table};
use serde_json::{Map, Number, Value};

/// Outcome of running one statement through the driver
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// The driver produced a result set
    Rows {
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    },
    /// No result set; the driver reported an affected-row count
    Affected(u64),
}

/// A health-checked connection pool to one external database.
///
/// Every call checks out one physical connection for its duration and
/// returns it to the pool afterwards, so a resource can serve concurrent
/// requests from the owning tenant.
#[async_trait::async_trait]
pub trait PooledResource: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Open one connection and confirm it answers
    async fn ping(&self) -> Result<(), AppError>;

    /// Prepare the statement without executing it.
    /// The error carries the driver message on a syntax failure.
    async fn prepare(&self, sql: &str) -> Result<(), AppError>;

    /// Execute the statement and materialize its result
    async fn execute(&self, sql: &str) -> Result<StatementOutcome, AppError>;

    /// Base tables visible to the connection, excluding views and system schemas
    async fn tables(&self) -> Result<Vec<Table>, AppError>;

    /// Columns of a table in ordinal order
    async fn columns(&self, table: &Table) -> Result<Vec<Column>, AppError>;

    /// Shut the pool down. Idempotent; failures are logged, never returned.
    async fn close(&self);
}

/// JSON number for `text` only when it prints back unchanged, so large or
/// high-precision values are never rounded.
pub fn exact_number(text: &str) -> Option<Number> {
    let number = text.parse::<Number>().ok()?;
    (number.to_string() == text).then_some(number)
}

/// Numeric cell text as a number when exact, otherwise the driver's text
pub fn numeric_text_to_json(text: String) -> Value {
    match exact_number(&text) {
        Some(number) => Value::Number(number),
        None => Value::String(text),
    }
}

/// Non-UTF-8 bytes rendered as a `\x` hex literal, the form PostgreSQL prints for bytea
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(2 + bytes.len() * 2);
    hex.push_str("\\x");
    for byte in bytes {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
