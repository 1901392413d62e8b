pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, LocalStorage};

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use app::{handle_request, HttpRequest, HttpResponse};
pub use config::ServiceConfig;
pub use core::{engine::ExtractionEngine, pipeline::RequirementPipeline};
pub use utils::error::{ExtractorError, Result};
