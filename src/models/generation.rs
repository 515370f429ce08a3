// SQL generation models
//
// Wire format of the external AI generation service and the normalized
// result the query pipeline works with.

use serde::{Deserialize, Serialize};

/// Request body sent to the AI generation service
#[derive(Debug, Clone, Serialize)]
pub struct GenerateSqlRequest<'a> {
    pub prompt: &'a str,
    pub language: &'a str,
}

/// Response body of the AI generation service
///
/// Every field is optional on the wire; missing fields take their defaults.
/// Both snake_case and camelCase keys are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiGenerateSqlResponse {
    pub success: bool,
    #[serde(alias = "canConvert")]
    pub can_convert: bool,
    pub prompt: String,
    pub sql: String,
    pub message: String,
    pub error: String,
    pub reason: String,
    pub method: String,
    #[serde(alias = "aiGenerated")]
    pub ai_generated: bool,
    #[serde(alias = "tablesAccessed")]
    pub tables_accessed: Vec<String>,
    pub model: String,
    /// Row-count estimate for the generated statement
    #[serde(alias = "totalRows")]
    pub total_rows: Option<u64>,
    #[serde(alias = "aiSuggestions")]
    pub ai_suggestions: Vec<String>,
    #[serde(alias = "isLargeDataset")]
    pub is_large_dataset: bool,
}

/// Outcome of resolving a prompt to SQL, either from the AI service or the cache
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub success: bool,
    pub can_convert: bool,
    pub sql: String,
    pub row_estimate: Option<u64>,
    pub suggestions: Vec<String>,
    pub error_reason: Option<String>,
    pub is_ai_generated: bool,
    pub model: Option<String>,
    pub tables_accessed: Vec<String>,
}

impl GenerationResult {
    /// Result rebuilt from a cached statement; estimates and suggestions are not cached
    pub fn from_cache(sql: String, is_ai_generated: bool) -> Self {
        Self {
            success: true,
            can_convert: true,
            sql,
            row_estimate: None,
            suggestions: Vec::new(),
            error_reason: None,
            is_ai_generated,
            model: None,
            tables_accessed: Vec::new(),
        }
    }

    /// Whether this result carries a statement worth executing (and caching)
    ///
    /// A response that reports failure is never usable, whatever else it carries.
    pub fn is_usable(&self) -> bool {
        self.success && self.can_convert && !self.sql.trim().is_empty()
    }
}

impl From<AiGenerateSqlResponse> for GenerationResult {
    fn from(response: AiGenerateSqlResponse) -> Self {
        let error_reason = [response.reason, response.message, response.error]
            .into_iter()
            .find(|text| !text.trim().is_empty());

        Self {
            success: response.success,
            can_convert: response.can_convert,
            sql: response.sql,
            row_estimate: response.total_rows,
            suggestions: response.ai_suggestions,
            error_reason,
            is_ai_generated: true,
            model: Some(response.model).filter(|m| !m.is_empty()),
            tables_accessed: response.tables_accessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_accepts_snake_case() {
        let response: AiGenerateSqlResponse = serde_json::from_str(
            r#"{
                "success": true,
                "can_convert": true,
                "sql": "SELECT * FROM customers LIMIT 5",
                "model": "gpt-4o-mini",
                "total_rows": 5,
                "ai_suggestions": ["Show top 10 customers"],
                "tables_accessed": ["customers"]
            }"#,
        )
        .unwrap();

        assert!(response.can_convert);
        assert_eq!(response.total_rows, Some(5));
        assert_eq!(response.ai_suggestions.len(), 1);
        assert!(!response.is_large_dataset);
    }

    #[test]
    fn test_response_accepts_camel_case() {
        let response: AiGenerateSqlResponse = serde_json::from_str(
            r#"{"success": true, "canConvert": false, "reason": "Not a data question", "isLargeDataset": true}"#,
        )
        .unwrap();

        assert!(!response.can_convert);
        assert!(response.is_large_dataset);
        assert_eq!(response.reason, "Not a data question");
        assert!(response.sql.is_empty());
    }

    #[test]
    fn test_generation_result_from_response() {
        let response = AiGenerateSqlResponse {
            success: true,
            can_convert: false,
            message: "Cannot convert".to_string(),
            ..Default::default()
        };

        let result = GenerationResult::from(response);
        assert!(!result.is_usable());
        assert_eq!(result.error_reason.as_deref(), Some("Cannot convert"));
        assert!(result.model.is_none());
    }

    #[test]
    fn test_failed_response_is_not_usable() {
        let result = GenerationResult::from(AiGenerateSqlResponse {
            success: false,
            can_convert: true,
            sql: "SELECT 1".to_string(),
            error: "model error".to_string(),
            ..Default::default()
        });

        assert!(!result.is_usable());
        assert_eq!(result.error_reason.as_deref(), Some("model error"));
    }

    #[test]
    fn test_blank_sql_is_not_usable() {
        let mut result = GenerationResult::from_cache("   ".to_string(), true);
        assert!(!result.is_usable());

        result.sql = "SELECT 1".to_string();
        assert!(result.is_usable());
        assert!(result.suggestions.is_empty());
    }
}
