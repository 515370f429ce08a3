// PostgreSQL executor using connection pooling for optimal resource management
use crate::api::middleware::AppError;
use crate::models::Row;
use crate::services::database::adapter::{count_query, QueryExecutor, QueryResult};
use deadpool_postgres::Pool;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_postgres::types::Type;

pub struct PostgreSQLExecutor {
    pool: Pool,
}

impl PostgreSQLExecutor {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get connection from pool: {}", e)))
    }

    fn describe_error(e: &tokio_postgres::Error) -> String {
        match e.as_db_error() {
            Some(db_error) => format!(
                "Code: {}, Message: {}, Detail: {}, Hint: {}",
                db_error.code().code(),
                db_error.message(),
                db_error.detail().unwrap_or(""),
                db_error.hint().unwrap_or("")
            ),
            None => e.to_string(),
        }
    }

    /// Convert a PostgreSQL row to a column-name → JSON map
    fn row_to_json(row: &tokio_postgres::Row) -> Row {
        let mut row_obj = Row::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value: Value = match *column.type_() {
                Type::INT2 => row.try_get::<_, Option<i16>>(idx).ok().flatten().map(|v| json!(v)),
                Type::INT4 => row.try_get::<_, Option<i32>>(idx).ok().flatten().map(|v| json!(v)),
                Type::INT8 => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(|v| json!(v)),
                Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).ok().flatten().map(|v| json!(v)),
                Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).ok().flatten().map(|v| json!(v)),
                Type::BOOL => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(|v| json!(v)),
                Type::DATE => row
                    .try_get::<_, Option<chrono::NaiveDate>>(idx)
                    .ok()
                    .flatten()
                    .map(|v| json!(v.to_string())),
                Type::TIMESTAMP => row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                    .ok()
                    .flatten()
                    .map(|v| json!(v.to_string())),
                Type::TIMESTAMPTZ => row
                    .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
                    .ok()
                    .flatten()
                    .map(|v| json!(v.to_rfc3339())),
                Type::NUMERIC => row
                    .try_get::<_, Option<Decimal>>(idx)
                    .ok()
                    .flatten()
                    .map(decimal_to_json),
                Type::UUID => row
                    .try_get::<_, Option<uuid::Uuid>>(idx)
                    .ok()
                    .flatten()
                    .map(|v| json!(v.to_string())),
                Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx).ok().flatten(),
                _ => match row.try_get::<_, Option<String>>(idx) {
                    Ok(v) => v.map(Value::String),
                    // Types without a text mapping show their type name as placeholder
                    Err(_) => Some(json!(format!("<{}>", column.type_().name()))),
                },
            }
            .unwrap_or(Value::Null);

            row_obj.insert(column.name().to_string(), value);
        }
        row_obj
    }
}

/// Significant digits an f64 round-trips without loss
const F64_SAFE_MANTISSA: u128 = 1_000_000_000_000_000;

/// NUMERIC as a JSON number when f64 keeps every digit, otherwise as its decimal text
fn decimal_to_json(value: Decimal) -> Value {
    let value = value.normalize();
    Some(value)
        .filter(|v| v.mantissa().unsigned_abs() < F64_SAFE_MANTISSA)
        .and_then(|v| v.to_string().parse::<f64>().ok())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

#[async_trait::async_trait]
impl QueryExecutor for PostgreSQLExecutor {
    async fn execute_query(&self, sql: &str, timeout_secs: u64) -> Result<QueryResult, AppError> {
        let client = self.client().await?;
        let start_time = Instant::now();

        let rows = tokio::time::timeout(Duration::from_secs(timeout_secs), client.query(sql, &[]))
            .await
            .map_err(|_| AppError::Database(format!("Query timeout after {} seconds", timeout_secs)))?
            .map_err(|e| AppError::Database(format!("Query execution failed: {}", Self::describe_error(&e))))?;

        let json_rows = rows.iter().map(Self::row_to_json).collect();
        Ok(QueryResult::new(json_rows, start_time.elapsed().as_millis() as u64))
    }

    async fn count_rows(&self, sql: &str, timeout_secs: u64) -> Result<u64, AppError> {
        let client = self.client().await?;
        let count_sql = count_query(sql);

        let row = tokio::time::timeout(Duration::from_secs(timeout_secs), client.query_one(&count_sql, &[]))
            .await
            .map_err(|_| AppError::Database(format!("Count query timeout after {} seconds", timeout_secs)))?
            .map_err(|e| AppError::Database(format!("Count query failed: {}", Self::describe_error(&e))))?;

        let count: i64 = row
            .try_get(0)
            .map_err(|e| AppError::Database(format!("Unexpected count result: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    fn database_type(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<(), AppError> {
        let client = self.client().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| AppError::Connection(format!("Connection test failed: {}", e)))?;
        Ok(())
    }
}
