// Localized user-facing messages for the query envelope

/// Languages the envelope messages are available in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Turkish,
}

impl Language {
    /// Unknown language codes fall back to English
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "tr" | "tr-tr" => Language::Turkish,
            _ => Language::English,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    QuerySuccess,
    EmptyPrompt,
    InvalidPageNumber,
    InvalidPageSize,
    ServiceUnavailable,
    CannotGenerateSql,
    QueryExecutionFailed,
}

impl Message {
    pub fn text(self, language: Language) -> &'static str {
        match (self, language) {
            (Message::QuerySuccess, Language::English) => "Query executed successfully",
            (Message::QuerySuccess, Language::Turkish) => "Sorgu başarıyla çalıştırıldı",
            (Message::EmptyPrompt, Language::English) => "Prompt cannot be empty",
            (Message::EmptyPrompt, Language::Turkish) => "Prompt boş olamaz",
            (Message::InvalidPageNumber, Language::English) => "Page number must be greater than 0",
            (Message::InvalidPageNumber, Language::Turkish) => "Sayfa numarası 0'dan büyük olmalıdır",
            (Message::InvalidPageSize, Language::English) => "Page size must be between 1 and 1000",
            (Message::InvalidPageSize, Language::Turkish) => "Sayfa boyutu 1 ile 1000 arasında olmalıdır",
            (Message::ServiceUnavailable, Language::English) => "AI service unavailable - cannot generate SQL",
            (Message::ServiceUnavailable, Language::Turkish) => "AI servisi kullanılamıyor - SQL oluşturulamıyor",
            (Message::CannotGenerateSql, Language::English) => {
                "AI could not generate a valid SQL query for this prompt"
            }
            (Message::CannotGenerateSql, Language::Turkish) => {
                "AI bu istek için geçerli bir SQL sorgusu oluşturamadı"
            }
            (Message::QueryExecutionFailed, Language::English) => "Query execution failed",
            (Message::QueryExecutionFailed, Language::Turkish) => "Sorgu çalıştırma başarısız oldu",
        }
    }
}
