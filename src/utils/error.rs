use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Failed to fetch '{name}': {message}")]
    FetchError { name: String, message: String },

    #[error("Text extraction failed for '{name}': {message}")]
    ExtractionError { name: String, message: String },

    #[error("OCR provider {provider} failed: {message}")]
    OcrError { provider: String, message: String },

    #[error("OCR provider {provider} did not finish after {attempts} polls")]
    OcrTimeout { provider: String, attempts: u32 },

    #[error("LLM request failed{}: {message}", status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    LlmError { status: Option<u16>, message: String },

    #[error("Could not parse model output: {message}")]
    ParseError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Extraction,
    ExternalService,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 退出碼：任何錯誤都不回 0
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 4,
            ErrorSeverity::Medium => 2, // 可重試
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ExtractorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExtractorError::ConfigError { .. }
            | ExtractorError::MissingConfigError { .. }
            | ExtractorError::InvalidConfigValueError { .. }
            | ExtractorError::TomlError(_) => ErrorCategory::Configuration,
            ExtractorError::ValidationError { .. } => ErrorCategory::Input,
            ExtractorError::HttpError(_) | ExtractorError::FetchError { .. } => {
                ErrorCategory::Network
            }
            ExtractorError::ZipError(_) | ExtractorError::ExtractionError { .. } => {
                ErrorCategory::Extraction
            }
            ExtractorError::OcrError { .. }
            | ExtractorError::OcrTimeout { .. }
            | ExtractorError::LlmError { .. } => ErrorCategory::ExternalService,
            ExtractorError::CsvError(_)
            | ExtractorError::SerializationError(_)
            | ExtractorError::ParseError { .. } => ErrorCategory::Data,
            ExtractorError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::ExternalService => ErrorSeverity::Medium,
            ErrorCategory::Extraction | ErrorCategory::Data => ErrorSeverity::Low,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// HTTP 狀態碼對應，給 handler 使用
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Input => 400,
            ErrorCategory::Network | ErrorCategory::ExternalService => 502,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ExtractorError::MissingConfigError { .. } => {
                "Set the missing environment variable or add it to the TOML config file"
            }
            ExtractorError::InvalidConfigValueError { .. } | ExtractorError::ConfigError { .. } => {
                "Check the configuration values against the documented ranges"
            }
            ExtractorError::TomlError(_) => "Fix the TOML syntax in the config file",
            ExtractorError::ValidationError { .. } => {
                "Send a POST body with a non-empty 'files' array of {name, url} objects"
            }
            ExtractorError::HttpError(_) | ExtractorError::FetchError { .. } => {
                "Verify the document URL is reachable and not expired"
            }
            ExtractorError::OcrError { .. } | ExtractorError::OcrTimeout { .. } => {
                "Check the OCR provider keys or retry with a smaller document"
            }
            ExtractorError::LlmError { .. } => {
                "Check ANTHROPIC_API_KEY and the model name, then retry"
            }
            ExtractorError::ExtractionError { .. } | ExtractorError::ZipError(_) => {
                "Upload the document as PDF, DOCX or plain text"
            }
            ExtractorError::ParseError { .. } | ExtractorError::SerializationError(_) => {
                "Retry the request; the model returned malformed JSON"
            }
            ExtractorError::CsvError(_) | ExtractorError::IoError(_) => {
                "Check the output path is writable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Invalid request: {}", self),
            ErrorCategory::Network => format!("Could not download a document: {}", self),
            ErrorCategory::Extraction => format!("Could not read a document: {}", self),
            ErrorCategory::ExternalService => format!("An external service failed: {}", self),
            ErrorCategory::Data => format!("Unexpected data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let invalid = ExtractorError::ValidationError {
            message: "files must not be empty".to_string(),
        };
        assert_eq!(invalid.status_code(), 400);
        assert_eq!(invalid.severity(), ErrorSeverity::High);

        let missing = ExtractorError::MissingConfigError {
            field: "ANTHROPIC_API_KEY".to_string(),
        };
        assert_eq!(missing.status_code(), 500);
        assert_eq!(missing.severity(), ErrorSeverity::Critical);

        let llm = ExtractorError::LlmError {
            status: Some(529),
            message: "overloaded".to_string(),
        };
        assert_eq!(llm.status_code(), 502);
        assert_eq!(llm.category(), ErrorCategory::ExternalService);
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let parse = ExtractorError::ParseError {
            message: "CSV output is not UTF-8".to_string(),
        };
        assert_eq!(parse.severity(), ErrorSeverity::Low);
        assert_ne!(parse.severity().exit_code(), 0);

        for severity in [
            ErrorSeverity::Low,
            ErrorSeverity::Medium,
            ErrorSeverity::High,
            ErrorSeverity::Critical,
        ] {
            assert_ne!(severity.exit_code(), 0, "{severity:?}");
        }
    }

    #[test]
    fn test_llm_error_display_includes_status() {
        let with_status = ExtractorError::LlmError {
            status: Some(401),
            message: "invalid x-api-key".to_string(),
        };
        assert_eq!(
            with_status.to_string(),
            "LLM request failed (status 401): invalid x-api-key"
        );

        let without_status = ExtractorError::LlmError {
            status: None,
            message: "empty content".to_string(),
        };
        assert_eq!(without_status.to_string(), "LLM request failed: empty content");
    }
}
