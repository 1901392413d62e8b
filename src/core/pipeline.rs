use crate::config::ServiceConfig;
use crate::core::chunking::plan_chunks;
use crate::core::extract::{detect_kind, placeholder_text, TextExtractor};
use crate::core::fetch::DocumentFetcher;
use crate::core::llm::AnthropicClient;
use crate::core::ocr::build_ocr_chain;
use crate::core::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::core::records::{dedupe_requirements, parse_model_output, renumber};
use crate::core::{LlmClient, Pipeline, Storage};
use crate::domain::model::{
    ExtractedDocument, ExtractionMethod, ExtractionRequest, ExtractionResponse, ExtractionStats,
    TransformResult,
};
use crate::utils::error::Result;
use reqwest::Client;

/// 單一請求的需求抽取流程：抓檔 → 抽文字 → 分段送 LLM → 解析去重 → 組回應
pub struct RequirementPipeline<S: Storage, L: LlmClient> {
    fetcher: DocumentFetcher<S>,
    extractor: TextExtractor,
    llm: L,
    config: ServiceConfig,
    request: ExtractionRequest,
    archive_path: Option<String>,
}

impl<S: Storage> RequirementPipeline<S, AnthropicClient> {
    pub fn new(storage: S, config: ServiceConfig, request: ExtractionRequest) -> Result<Self> {
        let client = config.build_http_client()?;
        let llm = AnthropicClient::from_config(&config, client.clone())?;
        Ok(Self::assemble(storage, config, request, llm, client))
    }
}

impl<S: Storage, L: LlmClient> RequirementPipeline<S, L> {
    pub fn with_llm(
        storage: S,
        config: ServiceConfig,
        request: ExtractionRequest,
        llm: L,
    ) -> Result<Self> {
        let client = config.build_http_client()?;
        Ok(Self::assemble(storage, config, request, llm, client))
    }

    /// 抓檔、OCR 與 LLM 共用同一個 reqwest client
    fn assemble(
        storage: S,
        config: ServiceConfig,
        request: ExtractionRequest,
        llm: L,
        client: Client,
    ) -> Self {
        let extractor = TextExtractor::new(
            build_ocr_chain(&config, &client),
            config.extraction.min_text_chars,
        );
        let fetcher = DocumentFetcher::new(client, storage, config.extraction.max_file_bytes);

        Self {
            fetcher,
            extractor,
            llm,
            config,
            request,
            archive_path: None,
        }
    }

    /// 回應完成後另存一份 JSON 到 storage
    pub fn with_archive_path(mut self, path: impl Into<String>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    fn chunk_cap(&self) -> usize {
        let configured = self.config.extraction.max_chunks;
        match self.request.options.max_chunks {
            Some(requested) if requested > 0 => requested.min(configured),
            _ => configured,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, L: LlmClient> Pipeline for RequirementPipeline<S, L> {
    async fn extract(&self) -> Result<Vec<ExtractedDocument>> {
        let mut documents = Vec::with_capacity(self.request.files.len());

        // 依序處理，不做並發
        for file in &self.request.files {
            let declared_mime = file.mime_type.as_deref();

            let document = match self.fetcher.fetch(file).await {
                Ok(fetched) => {
                    let mime = declared_mime.or(fetched.content_type.as_deref());
                    self.extractor
                        .extract(&file.name, &fetched.bytes, mime, self.request.options.force_ocr)
                        .await
                }
                Err(e) => {
                    tracing::warn!("❌ Could not fetch {}: {}", file.name, e);
                    ExtractedDocument {
                        name: file.name.clone(),
                        kind: detect_kind(&[], declared_mime, &file.name),
                        method: ExtractionMethod::Placeholder,
                        text: placeholder_text(&file.name),
                        notes: vec![format!("[{}] {}", file.name, e)],
                    }
                }
            };
            documents.push(document);
        }

        Ok(documents)
    }

    async fn transform(&self, documents: Vec<ExtractedDocument>) -> Result<TransformResult> {
        let mut diagnostics: Vec<String> = documents
            .iter()
            .flat_map(|document| document.notes.iter().cloned())
            .collect();
        let files_extracted = documents.iter().filter(|d| !d.is_placeholder()).count();

        for document in documents.iter().filter(|d| d.is_placeholder()) {
            diagnostics.push(format!(
                "[{}] skipped {} document: no extractable text was sent to the model",
                document.name,
                format!("{:?}", document.kind).to_lowercase()
            ));
        }

        let plan = plan_chunks(&documents, self.config.extraction.chunk_chars, self.chunk_cap());
        if plan.dropped > 0 {
            diagnostics.push(format!(
                "Chunk limit of {} reached; {} chunk(s) were not analysed",
                self.chunk_cap(),
                plan.dropped
            ));
        }
        if plan.chunks.is_empty() {
            diagnostics.push("No extractable text; nothing was sent to the model".to_string());
        }

        let mut requirements = Vec::new();
        let mut chunks_processed = 0usize;

        for chunk in &plan.chunks {
            let label = format!("{} (part {}/{})", chunk.source, chunk.index, chunk.total);
            tracing::info!("🤖 Analysing {}", label);

            let prompt = build_user_prompt(chunk, &self.request.options);
            let reply = match self.llm.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("LLM call failed for {}: {}", label, e);
                    diagnostics.push(format!("[{}] {}", label, e));
                    continue;
                }
            };
            chunks_processed += 1;

            match parse_model_output(&reply, &chunk.source) {
                Ok(records) => {
                    tracing::debug!("{} yielded {} requirement(s)", label, records.len());
                    requirements.extend(records);
                }
                Err(e) => {
                    tracing::warn!("Unparseable model output for {}: {}", label, e);
                    diagnostics.push(format!("[{}] {}", label, e));
                }
            }
        }

        let (mut requirements, duplicates_removed) = dedupe_requirements(requirements);
        renumber(&mut requirements);
        if duplicates_removed > 0 {
            diagnostics.push(format!("Removed {} duplicate requirement(s)", duplicates_removed));
        }

        Ok(TransformResult {
            requirements,
            diagnostics,
            files_extracted,
            chunks_processed,
            duplicates_removed,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<ExtractionResponse> {
        let mut response = ExtractionResponse {
            stats: ExtractionStats {
                files_received: self.request.files.len(),
                files_extracted: result.files_extracted,
                chunks_processed: result.chunks_processed,
                requirements_found: result.requirements.len(),
                duplicates_removed: result.duplicates_removed,
            },
            requirements: result.requirements,
            diagnostics: result.diagnostics,
            generated_at: chrono::Utc::now(),
        };

        if let Some(path) = &self.archive_path {
            let payload = serde_json::to_vec_pretty(&response)?;
            if let Err(e) = self.fetcher.storage().write_file(path, &payload).await {
                tracing::warn!("Could not archive response to {}: {}", path, e);
                response
                    .diagnostics
                    .push(format!("Result was not archived: {}", e));
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DocumentKind, DocumentRef, ExtractionOptions, Severity};
    use crate::utils::error::ExtractorError;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn with_file(self, path: &str, data: &[u8]) -> Self {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            self
        }

        fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.get_file(path).ok_or_else(|| {
                ExtractorError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    /// 依 prompt 內容回覆的假 LLM
    struct ScriptedLlm {
        replies: Vec<(&'static str, std::result::Result<&'static str, u16>)>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<(&'static str, std::result::Result<&'static str, u16>)>) -> Self {
            Self {
                replies,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            let (_, reply) = self
                .replies
                .iter()
                .find(|(needle, _)| user.contains(needle))
                .expect("no scripted reply for prompt");
            reply
                .map(str::to_string)
                .map_err(|status| ExtractorError::LlmError {
                    status: Some(status),
                    message: "scripted failure".to_string(),
                })
        }
    }

    fn request(files: &[(&str, &str)], options: ExtractionOptions) -> ExtractionRequest {
        ExtractionRequest {
            files: files
                .iter()
                .map(|(name, url)| DocumentRef {
                    name: name.to_string(),
                    url: url.to_string(),
                    mime_type: None,
                })
                .collect(),
            options,
        }
    }

    fn pipeline(
        storage: MockStorage,
        request: ExtractionRequest,
        llm: ScriptedLlm,
    ) -> RequirementPipeline<MockStorage, ScriptedLlm> {
        RequirementPipeline::with_llm(storage, ServiceConfig::default(), request, llm).unwrap()
    }

    #[tokio::test]
    async fn test_extract_mixes_storage_http_and_failures() {
        let server = MockServer::start_async().await;
        let file_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/electrical.txt");
                then.status(200)
                    .header("Content-Type", "text/plain")
                    .body("Cables shall be LSZH.");
            })
            .await;

        let storage = MockStorage::default().with_file("uploads/civil.txt", b"Kerbs shall be 150 mm.");
        let request = request(
            &[
                ("civil.txt", "uploads/civil.txt"),
                ("electrical.txt", &server.url("/docs/electrical.txt")),
                ("missing.pdf", "uploads/missing.pdf"),
            ],
            ExtractionOptions::default(),
        );
        let documents = pipeline(storage, request, ScriptedLlm::new(vec![]))
            .extract()
            .await
            .unwrap();

        file_mock.assert_async().await;
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].text, "Kerbs shall be 150 mm.");
        assert_eq!(documents[1].method, ExtractionMethod::PlainText);
        assert!(documents[2].is_placeholder());
        assert!(documents[2].notes[0].contains("missing.pdf"));
    }

    #[tokio::test]
    async fn test_transform_dedupes_across_chunks_and_reports_failures() {
        let storage = MockStorage::default()
            .with_file("a.txt", b"Deck load 5 kPa. Handrails 1100 mm.")
            .with_file("b.txt", b"Handrails shall be 1100 mm high.")
            .with_file("c.txt", b"Bearings replaceable.");
        let llm = ScriptedLlm::new(vec![
            (
                "Source document: a.txt",
                Ok(r#"[{"severity":"high","category":"Structural","requirement":"Deck shall carry 5 kPa"},
                       {"severity":"medium","category":"Safety","requirement":"Handrails 1100 mm high"}]"#),
            ),
            (
                "Source document: b.txt",
                Ok("```json\n[{\"severity\":\"must\",\"requirement\":\"handrails: 1100 MM high\"}]\n```"),
            ),
            ("Source document: c.txt", Err(529)),
        ]);
        let request = request(
            &[("a.txt", "a.txt"), ("b.txt", "b.txt"), ("c.txt", "c.txt")],
            ExtractionOptions {
                project_name: Some("Footbridge".to_string()),
                ..Default::default()
            },
        );
        let pipeline = pipeline(storage, request, llm);

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();

        assert_eq!(result.files_extracted, 3);
        assert_eq!(result.chunks_processed, 2);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.requirements.len(), 2);
        assert_eq!(result.requirements[0].id, "REQ-001");
        assert_eq!(result.requirements[1].category, "Safety");
        assert_eq!(result.requirements[1].source, "a.txt");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.contains("c.txt") && d.contains("529")));

        let prompts = pipeline.llm.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.contains("Project: Footbridge")));
    }

    #[tokio::test]
    async fn test_transform_reports_skipped_placeholder_kind() {
        let llm = ScriptedLlm::new(vec![(
            "Source document: site.txt",
            Ok(r#"[{"requirement": "Fence the site"}]"#),
        )]);
        let pipeline = pipeline(
            MockStorage::default(),
            request(&[("scan.pdf", "scan.pdf"), ("site.txt", "site.txt")], ExtractionOptions::default()),
            llm,
        );
        let documents = vec![
            ExtractedDocument {
                name: "scan.pdf".to_string(),
                kind: DocumentKind::Pdf,
                method: ExtractionMethod::Placeholder,
                text: placeholder_text("scan.pdf"),
                notes: Vec::new(),
            },
            ExtractedDocument {
                name: "site.txt".to_string(),
                kind: DocumentKind::Text,
                method: ExtractionMethod::PlainText,
                text: "The site shall be fenced.".to_string(),
                notes: Vec::new(),
            },
        ];

        let result = pipeline.transform(documents).await.unwrap();

        assert_eq!(result.files_extracted, 1);
        assert_eq!(result.chunks_processed, 1);
        assert!(result
            .diagnostics
            .contains(&"[scan.pdf] skipped pdf document: no extractable text was sent to the model".to_string()));
        let prompts = pipeline.llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
    }

    #[test]
    fn test_new_requires_api_key() {
        let request = request(&[("a.txt", "a.txt")], ExtractionOptions::default());
        let missing = RequirementPipeline::new(
            MockStorage::default(),
            ServiceConfig::default(),
            request.clone(),
        );
        assert!(matches!(missing, Err(ExtractorError::MissingConfigError { .. })));

        let mut config = ServiceConfig::default();
        config.llm.api_key = Some("sk-ant-test".to_string());
        assert!(RequirementPipeline::new(MockStorage::default(), config, request).is_ok());
    }

    #[tokio::test]
    async fn test_transform_respects_requested_chunk_cap() {
        let storage = MockStorage::default()
            .with_file("a.txt", b"first document")
            .with_file("b.txt", b"second document");
        let llm = ScriptedLlm::new(vec![("Source document", Ok("[]"))]);
        let request = request(
            &[("a.txt", "a.txt"), ("b.txt", "b.txt")],
            ExtractionOptions {
                max_chunks: Some(1),
                ..Default::default()
            },
        );
        let pipeline = pipeline(storage, request, llm);

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();

        assert_eq!(result.chunks_processed, 1);
        assert!(result.requirements.is_empty());
        assert!(result.diagnostics.iter().any(|d| d.contains("Chunk limit of 1")));
    }

    #[tokio::test]
    async fn test_load_builds_stats_and_archives() {
        let storage = MockStorage::default();
        let request = request(&[("a.txt", "a.txt")], ExtractionOptions::default());
        let pipeline = pipeline(storage.clone(), request, ScriptedLlm::new(vec![]))
            .with_archive_path("results/run-1.json");

        let result = TransformResult {
            requirements: vec![crate::domain::model::RequirementRecord {
                id: "REQ-001".to_string(),
                severity: Severity::Low,
                category: "Documentation".to_string(),
                requirement: "Provide as-built drawings".to_string(),
                rationale: String::new(),
                source: "a.txt".to_string(),
            }],
            diagnostics: vec!["note".to_string()],
            files_extracted: 1,
            chunks_processed: 1,
            duplicates_removed: 0,
        };
        let response = pipeline.load(result).await.unwrap();

        assert_eq!(response.stats.files_received, 1);
        assert_eq!(response.stats.requirements_found, 1);

        let archived = storage.get_file("results/run-1.json").expect("archived result");
        let json: serde_json::Value = serde_json::from_slice(&archived).unwrap();
        assert_eq!(json["requirements"][0]["severity"], "low");
        assert_eq!(json["stats"]["filesReceived"], 1);
    }
}
