use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{HistoryStats, QueryHistory};

/// SQLite storage for the query history
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            path_str.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// In-memory storage, used when no history file is wanted
    pub async fn in_memory() -> SqliteResult<Self> {
        let storage = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS query_history (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                prompt TEXT NOT NULL,
                sql_text TEXT NOT NULL,
                success INTEGER NOT NULL,
                execution_time_ms INTEGER NOT NULL,
                row_count INTEGER NOT NULL,
                model TEXT NOT NULL,
                error_message TEXT,
                is_ai_generated INTEGER NOT NULL DEFAULT 0,
                tables_accessed TEXT NOT NULL DEFAULT '[]',
                executed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_query_history_executed ON query_history(executed_at DESC)",
            [],
        )?;

        Ok(())
    }

    // ============================================================================
    // Query History Operations
    // ============================================================================

    /// Add a query execution to history
    pub async fn add_query_history(&self, history: &QueryHistory) -> SqliteResult<()> {
        let tables_json = serde_json::to_string(&history.tables_accessed)
            .unwrap_or_else(|_| "[]".to_string());

        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO query_history
            (id, request_id, prompt, sql_text, success, execution_time_ms, row_count, model, error_message, is_ai_generated, tables_accessed, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            rusqlite::params![
                history.id,
                history.request_id,
                history.prompt,
                history.sql,
                history.success,
                history.execution_time_ms as i64,
                history.row_count as i64,
                history.model,
                history.error_message,
                history.is_ai_generated,
                tables_json,
                history.executed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List the most recent history entries (with limit)
    pub async fn list_query_history(&self, limit: usize) -> SqliteResult<Vec<QueryHistory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, request_id, prompt, sql_text, success, execution_time_ms, row_count, model, error_message, is_ai_generated, tables_accessed, executed_at
            FROM query_history
            ORDER BY executed_at DESC
            LIMIT ?1
            "#,
        )?;

        let histories = stmt.query_map(rusqlite::params![limit as i64], |row| {
            let tables_json: String = row.get(10)?;
            let executed_at: String = row.get(11)?;

            Ok(QueryHistory {
                id: row.get(0)?,
                request_id: row.get(1)?,
                prompt: row.get(2)?,
                sql: row.get(3)?,
                success: row.get(4)?,
                execution_time_ms: row.get::<_, i64>(5)? as u64,
                row_count: row.get::<_, i64>(6)? as usize,
                model: row.get(7)?,
                error_message: row.get(8)?,
                is_ai_generated: row.get(9)?,
                tables_accessed: serde_json::from_str(&tables_json).unwrap_or_default(),
                executed_at: chrono::DateTime::parse_from_rfc3339(&executed_at)
                    .map(|d| d.with_timezone(&chrono::Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
                    })?,
            })
        })?;

        histories.collect()
    }

    /// Aggregate success/failure counts and mean execution time
    pub async fn query_stats(&self) -> SqliteResult<HistoryStats> {
        let conn = self.conn.lock().await;
        conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0),
                   COALESCE(AVG(execution_time_ms), 0.0)
            FROM query_history
            "#,
            [],
            |row| {
                let total = row.get::<_, i64>(0)? as u64;
                let successful = row.get::<_, i64>(1)? as u64;
                Ok(HistoryStats {
                    total_queries: total,
                    successful_queries: successful,
                    failed_queries: total - successful,
                    avg_execution_time_ms: row.get(2)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn history(prompt: &str, success: bool, execution_time_ms: u64) -> QueryHistory {
        let mut entry = QueryHistory::new(&Uuid::new_v4(), prompt, "SELECT * FROM customers");
        entry.execution_time_ms = execution_time_ms;
        entry.tables_accessed = vec!["customers".to_string()];
        if success {
            entry
        } else {
            entry.mark_failed("Query execution failed")
        }
    }

    #[test]
    fn test_sqlite_storage_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        let storage = tokio_test::block_on(SqliteStorage::new(&db_path));
        assert!(storage.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_sqlite_url_prefix_is_stripped() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("prefixed.db");
        let url = format!("sqlite://{}", db_path.display());
        let storage = tokio_test::block_on(SqliteStorage::new(&url));
        assert!(storage.is_ok());
    }

    #[tokio::test]
    async fn test_add_and_list_history() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let mut first = history("top 5 customers", true, 40);
        first.executed_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        storage.add_query_history(&first).await.unwrap();
        storage
            .add_query_history(&history("broken prompt", false, 0))
            .await
            .unwrap();

        let entries = storage.list_query_history(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first
        assert_eq!(entries[0].prompt, "broken prompt");
        assert!(!entries[0].success);
        assert_eq!(entries[1].prompt, "top 5 customers");
        assert_eq!(entries[1].tables_accessed, vec!["customers".to_string()]);

        let limited = storage.list_query_history(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_query_stats() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let empty = storage.query_stats().await.unwrap();
        assert_eq!(empty, HistoryStats::default());

        storage.add_query_history(&history("a", true, 30)).await.unwrap();
        storage.add_query_history(&history("b", true, 10)).await.unwrap();
        storage.add_query_history(&history("c", false, 20)).await.unwrap();

        let stats = storage.query_stats().await.unwrap();
        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.successful_queries, 2);
        assert_eq!(stats.failed_queries, 1);
        assert!((stats.avg_execution_time_ms - 20.0).abs() < f64::EPSILON);
    }
}
