//! OCR 供應商：Azure Computer Vision Read API 與 OCR.space。
//!
//! Azure 的 Read API 是非同步的：先 POST 影像，再輪詢 `Operation-Location`
//! 直到狀態變成 succeeded/failed，輪詢間隔與次數上限都是固定的。

use crate::config::ServiceConfig;
use crate::domain::model::ExtractionMethod;
use crate::domain::ports::OcrProvider;
use crate::utils::error::{ExtractorError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const AZURE_READ_PATH: &str = "/vision/v3.2/read/analyze";
const AZURE_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// 依設定組出 OCR 後援鏈，順序為 Azure → OCR.space，未設定的略過
pub fn build_ocr_chain(config: &ServiceConfig, client: &Client) -> Vec<Box<dyn OcrProvider>> {
    let mut chain: Vec<Box<dyn OcrProvider>> = Vec::new();

    if config.azure_enabled() {
        chain.push(Box::new(AzureReadOcr::new(
            client.clone(),
            config.ocr.azure_endpoint.clone().unwrap_or_default(),
            config.ocr.azure_key.clone().unwrap_or_default(),
            config.poll_interval(),
            config.ocr.poll_max_attempts,
        )));
    }

    if config.ocr_space_enabled() {
        chain.push(Box::new(OcrSpaceOcr::new(
            client.clone(),
            config.ocr.ocr_space_endpoint.clone(),
            config.ocr.ocr_space_api_key.clone().unwrap_or_default(),
            config.ocr.language.clone(),
        )));
    }

    if chain.is_empty() {
        tracing::debug!("No OCR provider configured; scanned documents will get placeholder text");
    }
    chain
}

pub struct AzureReadOcr {
    client: Client,
    endpoint: String,
    key: String,
    poll_interval: Duration,
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadPage>,
}

#[derive(Debug, Deserialize)]
struct ReadPage {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

impl AzureReadOcr {
    pub fn new(
        client: Client,
        endpoint: String,
        key: String,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            endpoint,
            key,
            poll_interval,
            max_attempts,
        }
    }

    fn error(&self, message: impl Into<String>) -> ExtractorError {
        ExtractorError::OcrError {
            provider: self.name().to_string(),
            message: message.into(),
        }
    }

    async fn submit(&self, bytes: &[u8]) -> Result<String> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), AZURE_READ_PATH);
        let response = self
            .client
            .post(&url)
            .header(AZURE_KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.error(format!("analyze returned {}: {}", status, truncate(&body, 300))));
        }

        response
            .headers()
            .get("Operation-Location")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| self.error("analyze response has no Operation-Location header"))
    }

    async fn poll(&self, operation_url: &str) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let operation: ReadOperation = self
                .client
                .get(operation_url)
                .header(AZURE_KEY_HEADER, &self.key)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match operation.status.to_ascii_lowercase().as_str() {
                "succeeded" => {
                    let pages = operation
                        .analyze_result
                        .map(|result| result.read_results)
                        .unwrap_or_default();
                    return Ok(join_read_pages(&pages));
                }
                "failed" => return Err(self.error("read operation reported status 'failed'")),
                other => {
                    tracing::debug!(
                        "Azure OCR poll {}/{}: status '{}'",
                        attempt,
                        self.max_attempts,
                        other
                    );
                }
            }
        }

        Err(ExtractorError::OcrTimeout {
            provider: self.name().to_string(),
            attempts: self.max_attempts,
        })
    }
}

fn join_read_pages(pages: &[ReadPage]) -> String {
    pages
        .iter()
        .map(|page| {
            page.lines
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl OcrProvider for AzureReadOcr {
    fn name(&self) -> &'static str {
        "Azure Computer Vision"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::AzureOcr
    }

    async fn recognize(&self, bytes: &[u8], _mime_type: &str) -> Result<String> {
        let operation_url = self.submit(bytes).await?;
        tracing::debug!("Azure OCR operation accepted: {}", operation_url);
        self.poll(&operation_url).await
    }
}

pub struct OcrSpaceOcr {
    client: Client,
    endpoint: String,
    api_key: String,
    language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

impl OcrSpaceOcr {
    pub fn new(client: Client, endpoint: String, api_key: String, language: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            language,
        }
    }

    fn error(&self, message: impl Into<String>) -> ExtractorError {
        ExtractorError::OcrError {
            provider: self.name().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl OcrProvider for OcrSpaceOcr {
    fn name(&self) -> &'static str {
        "OCR.space"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::OcrSpace
    }

    async fn recognize(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data_uri = format!("data:{};base64,{}", mime_type, encoded);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("base64Image", data_uri.as_str()),
            ("language", self.language.as_str()),
            ("isOverlayRequired", "false"),
            ("OCREngine", "2"),
            ("scale", "true"),
            ("filetype", ocr_space_filetype(mime_type)),
        ];

        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.error(format!("returned {}: {}", status, truncate(&body, 300))));
        }

        let parsed: OcrSpaceResponse = response.json().await?;
        if parsed.is_errored_on_processing {
            let message = parsed
                .error_message
                .as_ref()
                .map(render_error_message)
                .unwrap_or_else(|| "processing error".to_string());
            return Err(self.error(message));
        }

        let text = parsed
            .parsed_results
            .unwrap_or_default()
            .into_iter()
            .map(|result| result.parsed_text)
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(text)
    }
}

fn ocr_space_filetype(mime_type: &str) -> &'static str {
    match mime_type {
        "application/pdf" => "PDF",
        "image/png" => "PNG",
        "image/jpeg" => "JPG",
        "image/gif" => "GIF",
        "image/tiff" => "TIF",
        "image/bmp" => "BMP",
        _ => "Auto",
    }
}

// ErrorMessage 有時是字串，有時是字串陣列
fn render_error_message(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(message) => message.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
