// Query Service
//
// Drives one prompt through the pipeline:
// validate -> resolve SQL (cache or AI) -> autofix -> paginate -> execute -> respond.
// Every outcome is returned as a `QueryResponse` envelope and recorded in history.

use crate::config::Config;
use crate::models::{
    GenerationResult, Language, Message, PaginationInfo, QueryHistory, QueryRequest, QueryResponse,
};
use crate::services::database::QueryExecutor;
use crate::services::history::HistoryRecorder;
use crate::services::llm_service::SqlGenerationClient;
use crate::services::pagination::{PageRequest, PaginationDecision, PaginationEngine};
use crate::services::prompt_cache::{normalize_prompt, CachedGeneration, PromptCache};
use crate::services::sql_fixer::SqlFixer;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const AI_SERVICE_UNAVAILABLE: &str = "AI_SERVICE_UNAVAILABLE";
pub const CANNOT_GENERATE_SQL: &str = "CANNOT_GENERATE_SQL";
pub const QUERY_EXECUTION_FAILED: &str = "QUERY_EXECUTION_FAILED";

/// Largest page size a request may ask for
pub const MAX_PAGE_SIZE: u32 = 1000;

const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Request fields rejected before any external call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("page must be at least 1, got {0}")]
    InvalidPageNumber(u32),

    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidPageSize(u32),
}

impl ValidationError {
    fn message(self) -> Message {
        match self {
            ValidationError::EmptyPrompt => Message::EmptyPrompt,
            ValidationError::InvalidPageNumber(_) => Message::InvalidPageNumber,
            ValidationError::InvalidPageSize(_) => Message::InvalidPageSize,
        }
    }
}

/// Ways a pipeline run can end without data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryFailure {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("AI service unavailable: {detail}")]
    AiUnavailable { detail: String },

    #[error("prompt cannot be converted to SQL")]
    CannotConvert { reason: Option<String> },

    /// `detail` is the driver diagnostic; it is logged, never returned to the caller
    #[error("query execution failed: {detail}")]
    Execution { detail: String },
}

impl QueryFailure {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryFailure::Validation(_) => VALIDATION_ERROR,
            QueryFailure::AiUnavailable { .. } => AI_SERVICE_UNAVAILABLE,
            QueryFailure::CannotConvert { .. } => CANNOT_GENERATE_SQL,
            QueryFailure::Execution { .. } => QUERY_EXECUTION_FAILED,
        }
    }

    /// User-facing message in the requested language
    pub fn message(&self, language: Language) -> &'static str {
        let message = match self {
            QueryFailure::Validation(e) => e.message(),
            QueryFailure::AiUnavailable { .. } => Message::ServiceUnavailable,
            QueryFailure::CannotConvert { .. } => Message::CannotGenerateSql,
            QueryFailure::Execution { .. } => Message::QueryExecutionFailed,
        };
        message.text(language)
    }

    fn reason(&self) -> Option<String> {
        match self {
            QueryFailure::CannotConvert { reason } => reason.clone(),
            _ => None,
        }
    }
}

fn validate(request: &QueryRequest) -> Result<(), ValidationError> {
    if request.prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if request.page < 1 {
        return Err(ValidationError::InvalidPageNumber(request.page));
    }
    if request.page_size < 1 || request.page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidPageSize(request.page_size));
    }
    Ok(())
}

/// Row total used when the count query fails
fn estimate_total_rows(page: u32, page_size: u32, fetched: usize) -> u64 {
    let page = u64::from(page);
    let page_size = u64::from(page_size);
    let fetched = fetched as u64;

    if fetched == page_size {
        page * page_size + 1
    } else {
        (page - 1) * page_size + fetched
    }
}

pub struct QueryService {
    llm: Arc<dyn SqlGenerationClient>,
    executor: Arc<dyn QueryExecutor>,
    cache: Arc<PromptCache>,
    fixer: SqlFixer,
    paginator: PaginationEngine,
    history: HistoryRecorder,
    ai_timeout: Duration,
    query_timeout_secs: u64,
}

impl QueryService {
    pub fn new(
        llm: Arc<dyn SqlGenerationClient>,
        executor: Arc<dyn QueryExecutor>,
        cache: Arc<PromptCache>,
        history: HistoryRecorder,
    ) -> Self {
        Self {
            llm,
            executor,
            cache,
            fixer: SqlFixer::new(),
            paginator: PaginationEngine::default(),
            history,
            ai_timeout: DEFAULT_AI_TIMEOUT,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    /// Apply timeouts and the large-dataset threshold from configuration
    pub fn with_config(self, config: &Config) -> Self {
        self.with_ai_timeout(config.ai_timeout())
            .with_query_timeout_secs(config.database.query_timeout_secs)
            .with_pagination(PaginationEngine::new(config.pagination.large_dataset_threshold))
    }

    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    pub fn with_query_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.query_timeout_secs = timeout_secs;
        self
    }

    pub fn with_pagination(mut self, paginator: PaginationEngine) -> Self {
        self.paginator = paginator;
        self
    }

    /// Run the full pipeline for one request
    pub async fn execute(&self, request: QueryRequest) -> QueryResponse {
        let request_id = Uuid::new_v4();
        let language = Language::from_code(&request.language);
        let start_time = Instant::now();

        tracing::info!(
            "[{}] Query request - prompt: {}, page: {}, page_size: {}, disable_cache: {}",
            request_id,
            request.prompt,
            request.page,
            request.page_size,
            request.disable_cache
        );

        let mut history = QueryHistory::new(&request_id, &request.prompt, "");
        let outcome = self.run(&request_id, &request, language, &mut history).await;
        history.execution_time_ms = start_time.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => {
                history.row_count = response.row_count;
                tracing::info!(
                    "[{}] Query completed - rows: {}, duration: {}ms",
                    request_id,
                    response.row_count,
                    history.execution_time_ms
                );
                response
            }
            Err(failure) => {
                tracing::info!("[{}] Query failed ({}): {}", request_id, failure.error_code(), failure);
                let message = failure.message(language);
                history = history.mark_failed(message);
                QueryResponse::failure(
                    &request_id,
                    &request.prompt,
                    failure.error_code(),
                    message,
                    failure.reason(),
                )
            }
        };

        self.history.record(history);
        response
    }

    async fn run(
        &self,
        request_id: &Uuid,
        request: &QueryRequest,
        language: Language,
        history: &mut QueryHistory,
    ) -> Result<QueryResponse, QueryFailure> {
        validate(request)?;

        let generation = self.resolve_sql(request_id, request).await?;
        history.is_ai_generated = generation.is_ai_generated;
        history.tables_accessed = generation.tables_accessed.clone();
        if let Some(model) = &generation.model {
            history.model = model.clone();
        }

        let fixed_sql = self.fixer.fix(&generation.sql);
        history.sql = fixed_sql.clone();

        let decision = self.paginator.paginate(
            &fixed_sql,
            PageRequest::new(request.page, request.page_size).with_row_estimate(generation.row_estimate),
        );
        tracing::info!(
            "[{}] Pagination - applied: {}, upstream_limit: {:?}, estimate: {:?}, sql: {}",
            request_id,
            decision.paginated,
            decision.upstream_limit,
            generation.row_estimate,
            decision.executable_sql
        );

        let result = self
            .executor
            .execute_query(&decision.executable_sql, self.query_timeout_secs)
            .await
            .map_err(|e| {
                tracing::error!(
                    "[{}] Query execution failed for SQL [{}]: {}",
                    request_id,
                    decision.executable_sql,
                    e
                );
                QueryFailure::Execution { detail: e.to_string() }
            })?;

        let total_rows = self.total_rows(request_id, request, &decision, result.row_count).await;

        Ok(QueryResponse {
            success: true,
            message: Message::QuerySuccess.text(language).to_string(),
            error_code: None,
            reason: None,
            request_id: request_id.to_string(),
            prompt: request.prompt.clone(),
            sql: decision.original_sql,
            paginated_sql: decision.executable_sql,
            row_count: result.row_count,
            data: result.rows,
            timestamp: Utc::now(),
            ai_suggestions: generation.suggestions,
            pagination: Some(PaginationInfo::new(request.page, request.page_size, total_rows)),
        })
    }

    /// Cache lookup, then a single bounded AI call on a miss
    async fn resolve_sql(
        &self,
        request_id: &Uuid,
        request: &QueryRequest,
    ) -> Result<GenerationResult, QueryFailure> {
        let cache_key = normalize_prompt(&request.prompt);

        if !request.disable_cache {
            if let Some(cached) = self.cache.get(&cache_key) {
                tracing::info!("[{}] Cache hit for prompt: {}", request_id, cache_key);
                return Ok(GenerationResult::from_cache(cached.sql, cached.is_ai_generated));
            }
            tracing::info!("[{}] Cache miss for prompt: {}", request_id, cache_key);
        }

        let response = match tokio::time::timeout(
            self.ai_timeout,
            self.llm.generate_sql(&request.prompt, &request.language),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("[{}] AI service call failed: {}", request_id, e);
                return Err(QueryFailure::AiUnavailable { detail: e.to_string() });
            }
            Err(_) => {
                tracing::warn!(
                    "[{}] AI service call timed out after {}s",
                    request_id,
                    self.ai_timeout.as_secs()
                );
                return Err(QueryFailure::AiUnavailable {
                    detail: "request timed out".to_string(),
                });
            }
        };

        let generation = GenerationResult::from(response);

        if generation.is_usable() {
            let inserted = self.cache.put(
                cache_key,
                CachedGeneration::new(generation.sql.clone(), generation.is_ai_generated),
            );
            tracing::debug!("[{}] Cached generated SQL: {}", request_id, inserted);
            return Ok(generation);
        }

        if !generation.success {
            return Err(QueryFailure::AiUnavailable {
                detail: generation
                    .error_reason
                    .unwrap_or_else(|| "AI service reported failure".to_string()),
            });
        }

        Err(QueryFailure::CannotConvert {
            reason: generation.error_reason,
        })
    }

    async fn total_rows(
        &self,
        request_id: &Uuid,
        request: &QueryRequest,
        decision: &PaginationDecision,
        fetched: usize,
    ) -> u64 {
        match self
            .executor
            .count_rows(&decision.original_sql, self.query_timeout_secs)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                let estimate = estimate_total_rows(request.page, request.page_size, fetched);
                tracing::warn!(
                    "[{}] Row count failed, estimating {} rows: {}",
                    request_id,
                    estimate,
                    e
                );
                estimate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::AppError;
    use crate::models::{AiGenerateSqlResponse, Row};
    use crate::services::database::QueryResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum AiBehavior {
        Respond(AiGenerateSqlResponse),
        Fail,
        Hang,
    }

    struct FakeAi {
        behavior: AiBehavior,
        calls: AtomicUsize,
    }

    impl FakeAi {
        fn new(behavior: AiBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn sql(sql: &str, total_rows: Option<u64>) -> Arc<Self> {
            Self::new(AiBehavior::Respond(AiGenerateSqlResponse {
                success: true,
                can_convert: true,
                sql: sql.to_string(),
                model: "gpt-4o-mini".to_string(),
                total_rows,
                ai_suggestions: vec!["Show top 10 customers".to_string()],
                tables_accessed: vec!["customers".to_string()],
                ..Default::default()
            }))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SqlGenerationClient for FakeAi {
        async fn generate_sql(&self, _prompt: &str, _language: &str) -> Result<AiGenerateSqlResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                AiBehavior::Respond(response) => Ok(response.clone()),
                AiBehavior::Fail => Err(AppError::LlmService("connection refused".to_string())),
                AiBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(AiGenerateSqlResponse::default())
                }
            }
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    /// Executor returning `rows` rows per statement, honoring a trailing `LIMIT n`
    struct FakeExecutor {
        rows: usize,
        fail_execute: bool,
        fail_count: bool,
        executed: Mutex<Vec<String>>,
        counted: Mutex<Vec<String>>,
    }

    impl FakeExecutor {
        fn with_rows(rows: usize) -> Arc<Self> {
            Arc::new(Self {
                rows,
                fail_execute: false,
                fail_count: false,
                executed: Mutex::new(Vec::new()),
                counted: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail_execute: true,
                ..Self::base(0)
            })
        }

        fn failing_count(rows: usize) -> Arc<Self> {
            Arc::new(Self {
                fail_count: true,
                ..Self::base(rows)
            })
        }

        fn base(rows: usize) -> Self {
            Self {
                rows,
                fail_execute: false,
                fail_count: false,
                executed: Mutex::new(Vec::new()),
                counted: Mutex::new(Vec::new()),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeExecutor {
        async fn execute_query(&self, sql: &str, _timeout_secs: u64) -> Result<QueryResult, AppError> {
            self.executed.lock().unwrap().push(sql.to_string());
            if self.fail_execute {
                return Err(AppError::Database("relation \"custmers\" does not exist".to_string()));
            }

            let upper = sql.to_uppercase();
            let limit = upper
                .rfind("LIMIT ")
                .and_then(|pos| upper[pos + 6..].split_whitespace().next())
                .and_then(|n| n.trim_end_matches(';').parse::<usize>().ok())
                .unwrap_or(self.rows);

            let rows = (0..self.rows.min(limit))
                .map(|i| {
                    let mut row = Row::new();
                    row.insert("id".to_string(), serde_json::json!(i + 1));
                    row
                })
                .collect();
            Ok(QueryResult::new(rows, 3))
        }

        async fn count_rows(&self, sql: &str, _timeout_secs: u64) -> Result<u64, AppError> {
            self.counted.lock().unwrap().push(sql.to_string());
            if self.fail_count {
                return Err(AppError::Database("count failed".to_string()));
            }
            Ok(self.rows as u64)
        }

        fn database_type(&self) -> &str {
            "fake"
        }

        async fn test_connection(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn service(ai: Arc<FakeAi>, executor: Arc<FakeExecutor>) -> (QueryService, Arc<PromptCache>) {
        let cache = Arc::new(PromptCache::default());
        let service = QueryService::new(ai, executor, cache.clone(), HistoryRecorder::disabled());
        (service, cache)
    }

    #[tokio::test]
    async fn test_top_five_customers_end_to_end() {
        let ai = FakeAi::sql("SELECT * FROM customers ORDER BY total DESC LIMIT 5", Some(5));
        let executor = FakeExecutor::with_rows(5);
        let (service, cache) = service(ai.clone(), executor.clone());

        let response = service.execute(QueryRequest::new("Top 5 customers")).await;

        assert!(response.success);
        assert_eq!(response.error_code, None);
        assert_eq!(response.row_count, 5);
        assert_eq!(response.sql, "SELECT * FROM customers ORDER BY total DESC LIMIT 5");
        assert_eq!(response.paginated_sql, response.sql);
        assert_eq!(response.ai_suggestions, vec!["Show top 10 customers".to_string()]);

        let pagination = response.pagination.unwrap();
        assert!(!pagination.has_more);
        assert_eq!(pagination.total_rows, 5);
        assert_eq!(pagination.total_pages, 1);

        assert_eq!(ai.calls(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("top 5 customers").is_some());
    }

    #[tokio::test]
    async fn test_oversized_page_rejected_without_ai_call() {
        let ai = FakeAi::sql("SELECT 1", None);
        let (service, cache) = service(ai.clone(), FakeExecutor::with_rows(1));

        let response = service
            .execute(QueryRequest::new("all orders").with_page(1, 2000))
            .await;

        assert!(!response.success);
        assert!(response.is_validation_failure());
        assert_eq!(response.message, "Page size must be between 1 and 1000");
        assert_eq!(ai.calls(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_validation_rules() {
        let ai = FakeAi::sql("SELECT 1", None);
        let (service, _) = service(ai.clone(), FakeExecutor::with_rows(1));

        let blank = service.execute(QueryRequest::new("   ")).await;
        assert!(blank.is_validation_failure());

        let page_zero = service.execute(QueryRequest::new("orders").with_page(0, 10)).await;
        assert!(page_zero.is_validation_failure());

        let size_zero = service.execute(QueryRequest::new("orders").with_page(1, 0)).await;
        assert!(size_zero.is_validation_failure());

        let max_size = service.execute(QueryRequest::new("orders").with_page(1, 1000)).await;
        assert!(max_size.success);

        assert_eq!(ai.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_ai() {
        let ai = FakeAi::sql("SELECT * FROM customers LIMIT 5", Some(5));
        let (service, _) = service(ai.clone(), FakeExecutor::with_rows(5));

        let first = service.execute(QueryRequest::new("top 5 customers")).await;
        let second = service.execute(QueryRequest::new("  TOP 5 Customers ")).await;

        assert!(first.success && second.success);
        assert_eq!(ai.calls(), 1);
        assert_eq!(second.sql, first.sql);
        assert!(second.ai_suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_disable_cache_always_calls_ai() {
        let ai = FakeAi::sql("SELECT * FROM customers LIMIT 5", Some(5));
        let (service, _) = service(ai.clone(), FakeExecutor::with_rows(5));

        service.execute(QueryRequest::new("top 5 customers")).await;
        service
            .execute(QueryRequest::new("top 5 customers").without_cache())
            .await;

        assert_eq!(ai.calls(), 2);
    }

    #[tokio::test]
    async fn test_large_result_is_paginated() {
        let ai = FakeAi::sql("SELECT * FROM orders LIMIT 50", Some(50));
        let executor = FakeExecutor::with_rows(50);
        let (service, _) = service(ai, executor.clone());

        let response = service
            .execute(QueryRequest::new("recent orders").with_page(2, 10))
            .await;

        assert!(response.success);
        assert_eq!(response.sql, "SELECT * FROM orders LIMIT 50");
        assert_eq!(response.paginated_sql, "SELECT * FROM orders LIMIT 10 OFFSET 10;");
        assert_eq!(response.row_count, 10);

        let pagination = response.pagination.unwrap();
        assert!(pagination.has_more);
        assert_eq!(pagination.total_rows, 50);
        assert_eq!(pagination.total_pages, 5);

        assert_eq!(executor.executed(), vec!["SELECT * FROM orders LIMIT 10 OFFSET 10;".to_string()]);
        assert_eq!(
            executor.counted.lock().unwrap().clone(),
            vec!["SELECT * FROM orders LIMIT 50".to_string()]
        );
    }

    #[tokio::test]
    async fn test_generated_sql_is_autofixed() {
        let ai = FakeAi::sql("SELECT * FROM orders WHERE created_at > 'YYYY-MM-DD' LIMIT 5", Some(5));
        let executor = FakeExecutor::with_rows(5);
        let (service, _) = service(ai, executor.clone());

        let response = service.execute(QueryRequest::new("orders since date")).await;

        assert!(response.success);
        assert_eq!(
            response.sql,
            "SELECT * FROM orders WHERE created_at > '2024-01-01' LIMIT 5"
        );
        assert_eq!(executor.executed()[0], response.sql);
    }

    #[tokio::test]
    async fn test_ai_transport_error() {
        let ai = FakeAi::new(AiBehavior::Fail);
        let (service, cache) = service(ai, FakeExecutor::with_rows(1));

        let response = service.execute(QueryRequest::new("top 5 customers")).await;

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some(AI_SERVICE_UNAVAILABLE));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_ai_timeout_is_unavailable_and_not_cached() {
        let ai = FakeAi::new(AiBehavior::Hang);
        let (service, cache) = service(ai, FakeExecutor::with_rows(1));
        let service = service.with_ai_timeout(Duration::from_millis(20));

        let response = service.execute(QueryRequest::new("top 5 customers")).await;

        assert_eq!(response.error_code.as_deref(), Some(AI_SERVICE_UNAVAILABLE));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_ai_reported_failure() {
        let ai = FakeAi::new(AiBehavior::Respond(AiGenerateSqlResponse {
            success: false,
            error: "upstream model overloaded".to_string(),
            ..Default::default()
        }));
        let (service, cache) = service(ai, FakeExecutor::with_rows(1));

        let response = service.execute(QueryRequest::new("top 5 customers")).await;

        assert_eq!(response.error_code.as_deref(), Some(AI_SERVICE_UNAVAILABLE));
        assert_eq!(response.reason, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_response_with_sql_is_not_cached_or_executed() {
        let ai = FakeAi::new(AiBehavior::Respond(AiGenerateSqlResponse {
            success: false,
            can_convert: true,
            sql: "SELECT 1".to_string(),
            error: "model error".to_string(),
            ..Default::default()
        }));
        let executor = FakeExecutor::with_rows(1);
        let (service, cache) = service(ai, executor.clone());

        let response = service.execute(QueryRequest::new("q")).await;

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some(AI_SERVICE_UNAVAILABLE));
        assert!(cache.is_empty());
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_convert_carries_reason() {
        let ai = FakeAi::new(AiBehavior::Respond(AiGenerateSqlResponse {
            success: true,
            can_convert: false,
            reason: "This is not a data question".to_string(),
            ..Default::default()
        }));
        let executor = FakeExecutor::with_rows(1);
        let (service, cache) = service(ai, executor.clone());

        let mut request = QueryRequest::new("tell me a joke");
        request.language = "tr".to_string();
        let response = service.execute(request).await;

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some(CANNOT_GENERATE_SQL));
        assert_eq!(response.reason.as_deref(), Some("This is not a data question"));
        assert_eq!(response.message, Message::CannotGenerateSql.text(Language::Turkish));
        assert!(cache.is_empty());
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_empty_sql_cannot_convert() {
        let ai = FakeAi::new(AiBehavior::Respond(AiGenerateSqlResponse {
            success: true,
            can_convert: true,
            sql: "  ".to_string(),
            ..Default::default()
        }));
        let (service, cache) = service(ai, FakeExecutor::with_rows(1));

        let response = service.execute(QueryRequest::new("top 5 customers")).await;

        assert_eq!(response.error_code.as_deref(), Some(CANNOT_GENERATE_SQL));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_hides_driver_error() {
        let ai = FakeAi::sql("SELECT * FROM custmers LIMIT 5", Some(5));
        let (service, _) = service(ai, FakeExecutor::failing());

        let response = service.execute(QueryRequest::new("top 5 customers")).await;

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some(QUERY_EXECUTION_FAILED));
        assert_eq!(response.message, "Query execution failed");
        assert!(!response.message.contains("custmers"));
    }

    #[tokio::test]
    async fn test_count_failure_uses_estimate() {
        let ai = FakeAi::sql("SELECT * FROM orders LIMIT 50", Some(50));
        let (service, _) = service(ai, FakeExecutor::failing_count(50));

        let response = service
            .execute(QueryRequest::new("recent orders").with_page(2, 10))
            .await;

        let pagination = response.pagination.unwrap();
        assert_eq!(pagination.total_rows, 21);
        assert!(pagination.has_more);
    }

    #[test]
    fn test_estimate_total_rows() {
        assert_eq!(estimate_total_rows(2, 10, 10), 21);
        assert_eq!(estimate_total_rows(3, 10, 4), 24);
        assert_eq!(estimate_total_rows(1, 10, 0), 0);
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(
            QueryFailure::from(ValidationError::EmptyPrompt).error_code(),
            VALIDATION_ERROR
        );
        assert_eq!(
            QueryFailure::Execution { detail: String::new() }.message(Language::English),
            "Query execution failed"
        );
    }
}
