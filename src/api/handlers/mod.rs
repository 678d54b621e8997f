pub mod connection;
pub mod sql;

pub use connection::*;
pub use sql::*;
