use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 呼叫端傳入的文件參照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOptions {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub discipline: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub force_ocr: bool,
    #[serde(default)]
    pub max_chunks: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    #[serde(default)]
    pub files: Vec<DocumentRef>,
    #[serde(default)]
    pub options: ExtractionOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Image,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    NativePdf,
    Docx,
    PlainText,
    AzureOcr,
    OcrSpace,
    Placeholder,
}

/// 單一文件抽取後的文字與過程紀錄
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub method: ExtractionMethod,
    pub text: String,
    pub notes: Vec<String>,
}

impl ExtractedDocument {
    pub fn is_placeholder(&self) -> bool {
        self.method == ExtractionMethod::Placeholder
    }
}

/// 送給 LLM 的一段文字
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub source: String,
    pub index: usize,
    pub total: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// 模型回傳的嚴重度字串很不一致，這裡統一映射
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "blocker" | "safety" | "safety-critical" => Severity::Critical,
            "high" | "must" | "mandatory" | "shall" | "required" | "major" => Severity::High,
            "low" | "may" | "optional" | "info" | "informational" | "minor" | "nice-to-have" => {
                Severity::Low
            }
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub id: String,
    pub severity: Severity,
    pub category: String,
    pub requirement: String,
    pub rationale: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub requirements: Vec<RequirementRecord>,
    pub diagnostics: Vec<String>,
    pub files_extracted: usize,
    pub chunks_processed: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    pub files_received: usize,
    pub files_extracted: usize,
    pub chunks_processed: usize,
    pub requirements_found: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub requirements: Vec<RequirementRecord>,
    pub diagnostics: Vec<String>,
    pub stats: ExtractionStats,
    pub generated_at: DateTime<Utc>,
}
