// Query History Recorder
//
// Fire-and-forget audit trail. The request path only enqueues a record;
// a background task drains the queue into the configured sink. Write
// failures and a full queue are logged and otherwise ignored.

use crate::api::middleware::AppError;
use crate::models::QueryHistory;
use crate::storage::SqliteStorage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-record write deadline for the background task
const WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// Destination for history records
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn write(&self, entry: &QueryHistory) -> Result<(), AppError>;
}

#[async_trait]
impl HistorySink for SqliteStorage {
    async fn write(&self, entry: &QueryHistory) -> Result<(), AppError> {
        self.add_query_history(entry).await?;
        Ok(())
    }
}

/// Non-blocking handle used by the query pipeline to record history
#[derive(Clone)]
pub struct HistoryRecorder {
    sender: Option<mpsc::Sender<QueryHistory>>,
}

impl HistoryRecorder {
    /// Start the background writer; must be called inside a tokio runtime
    pub fn spawn(sink: Arc<dyn HistorySink>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<QueryHistory>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                match tokio::time::timeout(WRITE_TIMEOUT, sink.write(&entry)).await {
                    Ok(Ok(())) => {
                        tracing::debug!("[{}] Recorded query history", entry.request_id);
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("[{}] Failed to record query history: {}", entry.request_id, e);
                    }
                    Err(_) => {
                        tracing::warn!("[{}] Timed out recording query history", entry.request_id);
                    }
                }
            }
            tracing::debug!("History recorder stopped");
        });

        Self {
            sender: Some(sender),
        }
    }

    /// Recorder that drops every record
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Enqueue a record without waiting
    pub fn record(&self, entry: QueryHistory) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(entry) {
            let (reason, entry) = match e {
                mpsc::error::TrySendError::Full(entry) => ("queue full", entry),
                mpsc::error::TrySendError::Closed(entry) => ("recorder stopped", entry),
            };
            tracing::warn!("[{}] Dropped query history record: {}", entry.request_id, reason);
        }
    }
}
