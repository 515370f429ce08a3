use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::api::middleware::AppError;

/// Build the PostgreSQL connection pool used for query execution
///
/// Connections are opened lazily, so this succeeds even if the database is
/// not reachable yet.
pub fn create_pool(connection_url: &str, max_pool_size: usize) -> Result<Pool, AppError> {
    tracing::info!(
        "Creating connection pool for: {} (max_size: {})",
        mask_credentials(connection_url),
        max_pool_size
    );

    let mut cfg = PoolConfig::new();
    cfg.url = Some(connection_url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            AppError::Connection(format!("Failed to create connection pool: {}", e))
        })?;

    pool.resize(max_pool_size);
    Ok(pool)
}

/// Mask credentials in connection URL for safe logging
pub fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}
