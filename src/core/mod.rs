pub mod chunking;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod prompt;
pub mod records;

pub use crate::domain::model::{ExtractedDocument, ExtractionResponse, TransformResult};
pub use crate::domain::ports::{LlmClient, OcrProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
