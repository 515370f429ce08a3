use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row returned by the execution collaborator (column name -> value)
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Natural-language query request as posted by the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Missing prompts deserialize as empty and fail validation like blank ones
    #[serde(default)]
    pub prompt: String,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Skip the prompt cache and always ask the AI service
    #[serde(default)]
    pub disable_cache: bool,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

fn default_language() -> String {
    "en".to_string()
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            page: default_page(),
            page_size: default_page_size(),
            disable_cache: false,
            language: default_language(),
        }
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }
}

/// Pagination metadata attached to successful responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub total_rows: u64,
    pub total_pages: u64,
}

impl PaginationInfo {
    pub fn new(page: u32, page_size: u32, total_rows: u64) -> Self {
        let page_size_rows = u64::from(page_size.max(1));
        Self {
            page,
            page_size,
            has_more: u64::from(page) * page_size_rows < total_rows,
            total_rows,
            total_pages: total_rows.div_ceil(page_size_rows),
        }
    }
}

/// Uniform success/failure envelope returned for every query request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Explanation from the AI service when a prompt could not be converted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub request_id: String,
    pub prompt: String,
    /// Statement shown to the user (before pagination)
    pub sql: String,
    /// Statement that was actually executed
    pub paginated_sql: String,
    pub data: Vec<Row>,
    pub row_count: usize,
    pub timestamp: DateTime<Utc>,
    pub ai_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
}

impl QueryResponse {
    pub fn failure(
        request_id: &Uuid,
        prompt: &str,
        error_code: &str,
        message: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: Some(error_code.to_string()),
            reason,
            request_id: request_id.to_string(),
            prompt: prompt.to_string(),
            sql: String::new(),
            paginated_sql: String::new(),
            data: Vec::new(),
            row_count: 0,
            timestamp: Utc::now(),
            ai_suggestions: Vec::new(),
            pagination: None,
        }
    }

    pub fn is_validation_failure(&self) -> bool {
        self.error_code.as_deref() == Some(crate::services::query_service::VALIDATION_ERROR)
    }
}

// ============================================================================
// Query History Models
// ============================================================================

/// QueryHistory - audit record written after every pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistory {
    pub id: String,
    pub request_id: String,
    pub prompt: String,
    pub sql: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub row_count: usize,
    pub model: String,
    pub error_message: Option<String>,
    pub is_ai_generated: bool,
    pub tables_accessed: Vec<String>,
    pub executed_at: DateTime<Utc>,
}

impl QueryHistory {
    pub fn new(request_id: &Uuid, prompt: &str, sql: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            prompt: prompt.to_string(),
            sql: sql.to_string(),
            success: true,
            execution_time_ms: 0,
            row_count: 0,
            model: "unknown".to_string(),
            error_message: None,
            is_ai_generated: false,
            tables_accessed: Vec::new(),
            executed_at: Utc::now(),
        }
    }

    pub fn mark_failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }
}

/// Aggregate counters over the stored history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub avg_execution_time_ms: f64,
}
