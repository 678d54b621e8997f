use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::api::middleware::AppError;

/// Opaque identifier of an authenticated tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
}

impl FromStr for EngineKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(EngineKind::PostgreSql),
            "mysql" => Ok(EngineKind::MySql),
            _ => Err(AppError::UnsupportedEngine(s.to_string())),
        }
    }
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::PostgreSql => "postgresql",
            EngineKind::MySql => "mysql",
        }
    }
}

/// A tenant-owned database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub tenant_id: TenantId,
    pub name: String,
    pub engine: EngineKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl ConnectionConfig {
    /// Build a new config from request parameters, rejecting unsupported engines
    pub fn from_request(tenant_id: TenantId, request: &ConnectionRequest) -> Result<Self, AppError> {
        let engine = request.engine()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            name: request.name.clone(),
            engine,
            host: request.host.clone(),
            port: request.port,
            database: request.database.clone(),
            username: request.username.clone(),
            password: request.password.clone(),
            created_at: Utc::now(),
        })
    }

    /// Overwrite the connection parameters, keeping id, owner and creation time
    pub fn apply(&mut self, request: &ConnectionRequest) -> Result<(), AppError> {
        self.engine = request.engine()?;
        self.name = request.name.clone();
        self.host = request.host.clone();
        self.port = request.port;
        self.database = request.database.clone();
        self.username = request.username.clone();
        self.password = request.password.clone();
        Ok(())
    }

    /// Connection URI derived from engine, host, port and database.
    /// Credentials are passed to the driver separately and never appear here.
    pub fn connection_uri(&self) -> String {
        connection_uri(self.engine, &self.host, self.port, &self.database)
    }
}

pub fn connection_uri(engine: EngineKind, host: &str, port: u16, database: &str) -> String {
    match engine {
        EngineKind::PostgreSql => format!("postgresql://{}:{}/{}", host, port, database),
        EngineKind::MySql => format!("mysql://{}:{}/{}", host, port, database),
    }
}

/// Parameters for creating, updating or testing a connection
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dbType", alias = "db_type")]
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectionRequest {
    pub fn engine(&self) -> Result<EngineKind, AppError> {
        self.db_type.parse()
    }

    /// Transient config used for pre-flight checks; never persisted
    pub fn to_transient_config(&self) -> Result<ConnectionConfig, AppError> {
        ConnectionConfig::from_request(TenantId::new(""), self)
    }
}

/// Outward view of a config, without the password
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "dbType")]
    pub db_type: EngineKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ConnectionConfig> for ConnectionResponse {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            db_type: config.engine,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            username: config.username.clone(),
            created_at: config.created_at,
        }
    }
}
