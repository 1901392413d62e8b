#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;
pub mod toml_config;

use crate::utils::error::{ExtractorError, Result};
use crate::utils::validation::{self, Validate};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_OCR_SPACE_ENDPOINT: &str = "https://api.ocr.space/parse/image";

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub azure_endpoint: Option<String>,
    pub azure_key: Option<String>,
    pub ocr_space_api_key: Option<String>,
    pub ocr_space_endpoint: String,
    pub language: String,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    /// 少於這個非空白字元數時，PDF 視為掃描檔，改走 OCR
    pub min_text_chars: usize,
    pub chunk_chars: usize,
    pub max_chunks: usize,
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
}

/// 整個服務的執行設定。來源優先順序：預設值 → TOML → 環境變數 → CLI 參數
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub llm: LlmSettings,
    pub ocr: OcrSettings,
    pub extraction: ExtractionSettings,
    pub http: HttpSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings {
                api_key: None,
                model: DEFAULT_ANTHROPIC_MODEL.to_string(),
                base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
                max_tokens: 4096,
                retry_attempts: 3,
                retry_delay_ms: 2000,
            },
            ocr: OcrSettings {
                azure_endpoint: None,
                azure_key: None,
                ocr_space_api_key: None,
                ocr_space_endpoint: DEFAULT_OCR_SPACE_ENDPOINT.to_string(),
                language: "eng".to_string(),
                poll_interval_ms: 1000,
                poll_max_attempts: 30,
            },
            extraction: ExtractionSettings {
                min_text_chars: 100,
                chunk_chars: 12_000,
                max_chunks: 20,
                max_file_bytes: 25 * 1024 * 1024,
            },
            http: HttpSettings {
                timeout_seconds: 60,
            },
        }
    }
}

impl ServiceConfig {
    /// 預設值 + 環境變數
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 預設值 + 選用的 TOML 檔 + 環境變數
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = toml_path {
            let file_config = toml_config::FileConfig::from_file(path)?;
            file_config.apply_to(&mut config);
            tracing::debug!("Loaded config file: {}", path.display());
        }
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_string("ANTHROPIC_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = env_string("ANTHROPIC_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = env_string("ANTHROPIC_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(max_tokens) = env_parse("ANTHROPIC_MAX_TOKENS")? {
            self.llm.max_tokens = max_tokens;
        }
        if let Some(attempts) = env_parse("LLM_RETRY_ATTEMPTS")? {
            self.llm.retry_attempts = attempts;
        }
        if let Some(delay) = env_parse("LLM_RETRY_DELAY_MS")? {
            self.llm.retry_delay_ms = delay;
        }

        if let Some(endpoint) = env_string("AZURE_VISION_ENDPOINT") {
            self.ocr.azure_endpoint = Some(endpoint);
        }
        if let Some(key) = env_string("AZURE_VISION_KEY") {
            self.ocr.azure_key = Some(key);
        }
        if let Some(key) = env_string("OCR_SPACE_API_KEY") {
            self.ocr.ocr_space_api_key = Some(key);
        }
        if let Some(endpoint) = env_string("OCR_SPACE_ENDPOINT") {
            self.ocr.ocr_space_endpoint = endpoint;
        }
        if let Some(language) = env_string("OCR_LANGUAGE") {
            self.ocr.language = language;
        }
        if let Some(interval) = env_parse("OCR_POLL_INTERVAL_MS")? {
            self.ocr.poll_interval_ms = interval;
        }
        if let Some(attempts) = env_parse("OCR_POLL_MAX_ATTEMPTS")? {
            self.ocr.poll_max_attempts = attempts;
        }

        if let Some(min_chars) = env_parse("MIN_TEXT_CHARS")? {
            self.extraction.min_text_chars = min_chars;
        }
        if let Some(chunk_chars) = env_parse("CHUNK_CHARS")? {
            self.extraction.chunk_chars = chunk_chars;
        }
        if let Some(max_chunks) = env_parse("MAX_CHUNKS")? {
            self.extraction.max_chunks = max_chunks;
        }
        if let Some(max_bytes) = env_parse("MAX_FILE_BYTES")? {
            self.extraction.max_file_bytes = max_bytes;
        }
        if let Some(timeout) = env_parse("HTTP_TIMEOUT_SECONDS")? {
            self.http.timeout_seconds = timeout;
        }

        Ok(())
    }

    /// 沒有 API key 就不能處理請求
    pub fn require_api_key(&self) -> Result<&str> {
        self.llm
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ExtractorError::MissingConfigError {
                field: "ANTHROPIC_API_KEY".to_string(),
            })
    }

    pub fn azure_enabled(&self) -> bool {
        self.ocr.azure_endpoint.is_some() && self.ocr.azure_key.is_some()
    }

    pub fn ocr_space_enabled(&self) -> bool {
        self.ocr.ocr_space_api_key.is_some()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.ocr.poll_interval_ms)
    }

    pub fn llm_retry_delay(&self) -> Duration {
        Duration::from_millis(self.llm.retry_delay_ms)
    }

    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.http_timeout())
            .user_agent(concat!("reqsift/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(client)
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("llm.base_url", &self.llm.base_url)?;
        validation::validate_non_empty_string("llm.model", &self.llm.model)?;
        validation::validate_range("llm.max_tokens", self.llm.max_tokens, 256, 64_000)?;
        validation::validate_range("llm.retry_attempts", self.llm.retry_attempts, 1, 10)?;

        if let Some(endpoint) = &self.ocr.azure_endpoint {
            validation::validate_url("ocr.azure.endpoint", endpoint)?;
        }
        if self.ocr.azure_endpoint.is_some() != self.ocr.azure_key.is_some() {
            return Err(ExtractorError::ConfigError {
                message: "Azure OCR needs both AZURE_VISION_ENDPOINT and AZURE_VISION_KEY"
                    .to_string(),
            });
        }
        validation::validate_url("ocr.ocr_space.endpoint", &self.ocr.ocr_space_endpoint)?;
        validation::validate_non_empty_string("ocr.language", &self.ocr.language)?;
        validation::validate_range("ocr.poll_max_attempts", self.ocr.poll_max_attempts, 1, 120)?;
        validation::validate_range("ocr.poll_interval_ms", self.ocr.poll_interval_ms, 1, 60_000)?;

        validation::validate_range(
            "extraction.chunk_chars",
            self.extraction.chunk_chars,
            1_000,
            200_000,
        )?;
        validation::validate_range("extraction.max_chunks", self.extraction.max_chunks, 1, 200)?;
        validation::validate_range(
            "extraction.max_file_bytes",
            self.extraction.max_file_bytes,
            1,
            500 * 1024 * 1024,
        )?;
        validation::validate_range("http.timeout_seconds", self.http.timeout_seconds, 1, 900)?;

        tracing::debug!("✅ Service configuration validation passed");
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ExtractorError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}
