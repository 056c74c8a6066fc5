//! Shared data models.

pub mod connection;
pub mod query;
pub mod row;

// Re-export commonly used types
pub use connection::{ConnectRequest, ConnectionConfig, ConnectionItem, DbType};
pub use query::{QueryRequest, QueryResult};
pub use row::{Row, RowSet};
