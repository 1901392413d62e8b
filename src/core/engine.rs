use crate::core::Pipeline;
use crate::domain::model::ExtractionResponse;
use crate::utils::error::Result;
use crate::utils::monitor::ProcessMonitor;

pub struct ExtractionEngine<P: Pipeline> {
    pipeline: P,
    monitor: ProcessMonitor,
}

impl<P: Pipeline> ExtractionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: ProcessMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<ExtractionResponse> {
        tracing::info!("Starting requirement extraction...");
        self.monitor.log_phase("Start");

        // Extract
        let documents = self.pipeline.extract().await?;
        let readable = documents.iter().filter(|d| !d.is_placeholder()).count();
        tracing::info!(
            "Extracted text from {}/{} document(s)",
            readable,
            documents.len()
        );
        self.monitor.log_phase("Extract");

        // Transform
        let result = self.pipeline.transform(documents).await?;
        tracing::info!(
            "Found {} requirement(s) in {} chunk(s)",
            result.requirements.len(),
            result.chunks_processed
        );
        self.monitor.log_phase("Transform");

        // Load
        let response = self.pipeline.load(result).await?;
        if !response.diagnostics.is_empty() {
            tracing::info!("{} diagnostic message(s) attached", response.diagnostics.len());
        }
        self.monitor.log_phase("Load");
        self.monitor.log_summary();

        Ok(response)
    }
}
