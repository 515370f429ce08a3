// Execution layer for generated SQL
pub mod adapter;
pub mod postgresql;

pub use adapter::{count_query, QueryExecutor, QueryResult};
pub use postgresql::PostgreSQLExecutor;
