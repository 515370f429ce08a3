use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{AiGenerateSqlResponse, GenerateSqlRequest};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::{Duration, Instant};

/// External service that turns a natural-language prompt into SQL
#[async_trait]
pub trait SqlGenerationClient: Send + Sync {
    /// Single attempt; network, decode and timeout failures come back as `AppError::LlmService`
    async fn generate_sql(&self, prompt: &str, language: &str) -> Result<AiGenerateSqlResponse, AppError>;

    /// Whether the service answers its health endpoint
    async fn check_health(&self) -> bool;
}

/// HTTP client for the AI generation service
pub struct LlmService {
    gateway_url: String,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl LlmService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_gateway(
            &config.llm.gateway_url,
            config.llm.api_key.clone(),
            config.ai_timeout(),
        )
    }

    pub fn with_gateway(
        gateway_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::LlmService(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            api_key,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.gateway_url, path)
    }
}

#[async_trait]
impl SqlGenerationClient for LlmService {
    async fn generate_sql(&self, prompt: &str, language: &str) -> Result<AiGenerateSqlResponse, AppError> {
        if self.gateway_url.is_empty() {
            return Err(AppError::LlmService("AI service is not configured".to_string()));
        }

        tracing::info!("AI service request - prompt: {}, language: {}", prompt, language);
        let start_time = Instant::now();

        let mut request = self
            .http_client
            .post(self.endpoint("/api/generate-sql"))
            .json(&GenerateSqlRequest { prompt, language });

        // Add API key if available
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::LlmService("AI service request timed out".to_string())
            } else {
                AppError::LlmService(format!("Failed to call AI service: {}", e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to read AI service response: {}", e)))?;

        tracing::info!(
            "AI service response - status: {}, duration: {}ms",
            status,
            start_time.elapsed().as_millis()
        );

        // Error statuses without a body are hard failures; with a body the
        // service is still describing why it refused, so keep processing
        if !status.is_success() && body.trim().is_empty() {
            return Err(AppError::LlmService(format!(
                "AI service returned error {} with no content",
                status
            )));
        }

        if !status.is_success() {
            tracing::info!("AI service error status {}: {}", status, body);
        }

        tracing::debug!("AI service raw response: {}", body);

        let parsed: AiGenerateSqlResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::LlmService(format!("Failed to parse AI service response: {}", e)))?;

        if parsed.success && parsed.can_convert {
            tracing::info!("AI generated SQL (model: {}): {}", parsed.model, parsed.sql);
        } else if parsed.success {
            tracing::info!("AI service could not convert prompt: {}", parsed.reason);
        } else {
            tracing::warn!(
                "AI service failed - error: {}, message: {}",
                parsed.error,
                parsed.message
            );
        }

        Ok(parsed)
    }

    async fn check_health(&self) -> bool {
        match self.http_client.get(self.endpoint("/api/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::error!("Error checking AI service health: {}", e);
                false
            }
        }
    }
}
