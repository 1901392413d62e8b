use crate::domain::model::{
    ExtractedDocument, ExtractionMethod, ExtractionResponse, TransformResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 非 HTTP 的文件來源 (本機檔案或 S3)
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn method(&self) -> ExtractionMethod;
    async fn recognize(&self, bytes: &[u8], mime_type: &str) -> Result<String>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<ExtractedDocument>>;
    async fn transform(&self, documents: Vec<ExtractedDocument>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<ExtractionResponse>;
}
