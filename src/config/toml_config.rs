use crate::config::ServiceConfig;
use crate::utils::error::{ExtractorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `reqsift.toml` 的結構，所有欄位皆為選填，未填的沿用預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub llm: Option<LlmSection>,
    pub ocr: Option<OcrSection>,
    pub extraction: Option<ExtractionSection>,
    pub http: Option<HttpSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSection {
    pub language: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub poll_max_attempts: Option<u32>,
    pub azure: Option<AzureSection>,
    pub ocr_space: Option<OcrSpaceSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureSection {
    pub endpoint: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSpaceSection {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub min_text_chars: Option<usize>,
    pub chunk_chars: Option<usize>,
    pub max_chunks: Option<usize>,
    pub max_file_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSection {
    pub timeout_seconds: Option<u64>,
}

impl FileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        let config = toml::from_str(&processed_content)?;
        Ok(config)
    }

    /// 替換環境變數 (例如 ${ANTHROPIC_API_KEY})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            ExtractorError::ConfigError {
                message: format!("Invalid substitution pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 把檔案中有設定的欄位覆蓋到 ServiceConfig
    pub fn apply_to(&self, config: &mut ServiceConfig) {
        if let Some(llm) = &self.llm {
            if let Some(api_key) = llm.api_key.as_ref().filter(|k| !is_unresolved(k)) {
                config.llm.api_key = Some(api_key.clone());
            }
            if let Some(model) = &llm.model {
                config.llm.model = model.clone();
            }
            if let Some(base_url) = &llm.base_url {
                config.llm.base_url = base_url.clone();
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(attempts) = llm.retry_attempts {
                config.llm.retry_attempts = attempts;
            }
            if let Some(delay) = llm.retry_delay_ms {
                config.llm.retry_delay_ms = delay;
            }
        }

        if let Some(ocr) = &self.ocr {
            if let Some(language) = &ocr.language {
                config.ocr.language = language.clone();
            }
            if let Some(interval) = ocr.poll_interval_ms {
                config.ocr.poll_interval_ms = interval;
            }
            if let Some(attempts) = ocr.poll_max_attempts {
                config.ocr.poll_max_attempts = attempts;
            }
            if let Some(azure) = &ocr.azure {
                if let Some(endpoint) = &azure.endpoint {
                    config.ocr.azure_endpoint = Some(endpoint.clone());
                }
                if let Some(key) = azure.key.as_ref().filter(|k| !is_unresolved(k)) {
                    config.ocr.azure_key = Some(key.clone());
                }
            }
            if let Some(ocr_space) = &ocr.ocr_space {
                if let Some(key) = ocr_space.api_key.as_ref().filter(|k| !is_unresolved(k)) {
                    config.ocr.ocr_space_api_key = Some(key.clone());
                }
                if let Some(endpoint) = &ocr_space.endpoint {
                    config.ocr.ocr_space_endpoint = endpoint.clone();
                }
            }
        }

        if let Some(extraction) = &self.extraction {
            if let Some(min_chars) = extraction.min_text_chars {
                config.extraction.min_text_chars = min_chars;
            }
            if let Some(chunk_chars) = extraction.chunk_chars {
                config.extraction.chunk_chars = chunk_chars;
            }
            if let Some(max_chunks) = extraction.max_chunks {
                config.extraction.max_chunks = max_chunks;
            }
            if let Some(max_bytes) = extraction.max_file_bytes {
                config.extraction.max_file_bytes = max_bytes;
            }
        }

        if let Some(http) = &self.http {
            if let Some(timeout) = http.timeout_seconds {
                config.http.timeout_seconds = timeout;
            }
        }
    }
}

// ${VAR} 沒被替換代表環境變數不存在，不要把字面值當成金鑰
fn is_unresolved(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}
