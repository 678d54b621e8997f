pub mod active_connections;
pub mod connection_manager;
pub mod database; // PostgreSQL and MySQL pooled drivers
pub mod pool_factory;
pub mod schema_service;
pub mod sql_execution;

#[cfg(test)]
pub(crate) mod testing;

pub use active_connections::*;
pub use connection_manager::*;
pub use pool_factory::*;
pub use schema_service::*;
pub use sql_execution::*;
