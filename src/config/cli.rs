use crate::config::ServiceConfig;
use crate::domain::model::{DocumentRef, ExtractionOptions, ExtractionRequest};
use crate::domain::ports::Storage;
use crate::utils::error::{ExtractorError, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "reqsift")]
#[command(about = "Extract engineering requirements from documents with an LLM")]
pub struct CliConfig {
    /// Document to process, as `name=url` or a bare path/URL (repeatable)
    #[arg(long = "file", short = 'f', required = true)]
    pub files: Vec<String>,

    #[arg(long)]
    pub project_name: Option<String>,

    #[arg(long)]
    pub discipline: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub focus: Vec<String>,

    #[arg(long, help = "Skip native PDF parsing and go straight to OCR")]
    pub force_ocr: bool,

    #[arg(long)]
    pub max_chunks: Option<usize>,

    #[arg(long, help = "Override the Anthropic model name")]
    pub model: Option<String>,

    #[arg(long, help = "TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = ".", help = "Base directory for relative file paths")]
    pub base_dir: String,

    #[arg(long, short = 'o', help = "Write the result here instead of stdout")]
    pub output: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

impl CliConfig {
    /// 組出服務設定：TOML → 環境變數 → CLI 參數
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::load(self.config.as_deref())?;
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        Ok(config)
    }

    pub fn to_request(&self) -> ExtractionRequest {
        let files = self.files.iter().map(|spec| parse_file_spec(spec)).collect();

        ExtractionRequest {
            files,
            options: ExtractionOptions {
                project_name: self.project_name.clone(),
                discipline: self.discipline.clone(),
                focus_areas: self.focus.clone(),
                force_ocr: self.force_ocr,
                max_chunks: self.max_chunks,
            },
        }
    }
}

/// `name=url` 或單純的路徑；沒有 name 時取最後一段
pub fn parse_file_spec(spec: &str) -> DocumentRef {
    let (name, url) = match spec.split_once('=') {
        // URL query string 也可能帶 '='，只有在左邊不像 URL 時才拆
        Some((name, url)) if !name.contains("://") && !name.contains('?') => {
            (name.trim().to_string(), url.trim().to_string())
        }
        _ => {
            let trimmed = spec.trim();
            let without_query = trimmed.split('?').next().unwrap_or(trimmed);
            let name = without_query
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(without_query)
                .to_string();
            (name, trimmed.to_string())
        }
    };

    DocumentRef {
        name,
        url,
        mime_type: None,
    }
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = path.strip_prefix("file://").unwrap_or(path);
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        fs::read(&full_path).map_err(|e| ExtractorError::FetchError {
            name: full_path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_file_spec() {
        let named = parse_file_spec("Spec=https://files.test/a.pdf");
        assert_eq!(named.name, "Spec");
        assert_eq!(named.url, "https://files.test/a.pdf");

        let bare = parse_file_spec("docs/structural/loads.pdf");
        assert_eq!(bare.name, "loads.pdf");
        assert_eq!(bare.url, "docs/structural/loads.pdf");

        let signed = parse_file_spec("https://files.test/b.pdf?token=abc");
        assert_eq!(signed.name, "b.pdf");
        assert_eq!(signed.url, "https://files.test/b.pdf?token=abc");
    }

    #[test]
    fn test_cli_to_request() {
        let cli = CliConfig::parse_from([
            "reqsift",
            "--file",
            "notes.txt",
            "--focus",
            "safety,fire",
            "--force-ocr",
            "--project-name",
            "Bridge 12",
        ]);
        let request = cli.to_request();

        assert_eq!(request.files.len(), 1);
        assert_eq!(request.options.focus_areas, vec!["safety", "fire"]);
        assert!(request.options.force_ocr);
        assert_eq!(request.options.project_name.as_deref(), Some("Bridge 12"));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        storage
            .write_file("out/result.json", b"{\"ok\":true}")
            .await
            .unwrap();
        let data = storage.read_file("out/result.json").await.unwrap();
        assert_eq!(data, b"{\"ok\":true}");

        let missing = storage.read_file("nope.pdf").await.unwrap_err();
        assert!(matches!(missing, ExtractorError::FetchError { .. }));
    }
}
