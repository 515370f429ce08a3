// Execution collaborator: runs a finished SQL statement and returns rows
use crate::api::middleware::AppError;
use crate::models::Row;

/// Query execution result
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>, execution_time_ms: u64) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}

/// Wrap a statement in a row-count query, dropping trailing terminators
pub fn count_query(sql: &str) -> String {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT COUNT(*) FROM ({}) AS subquery", statement)
}

/// Query executor trait - the pipeline's only view of the relational store
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a single statement, returning rows in order
    async fn execute_query(&self, sql: &str, timeout_secs: u64) -> Result<QueryResult, AppError>;

    /// Total rows the statement would return without pagination
    async fn count_rows(&self, sql: &str, timeout_secs: u64) -> Result<u64, AppError>;

    /// Get database type
    fn database_type(&self) -> &str;

    /// Test connection
    async fn test_connection(&self) -> Result<(), AppError>;
}
