use clap::Parser;
use reqsift::app::report::{render_csv, render_json};
use reqsift::config::cli::OutputFormat;
use reqsift::utils::error::ExtractorError;
use reqsift::utils::{logger, validation::validate_document_refs, validation::Validate};
use reqsift::{CliConfig, ExtractionEngine, LocalStorage, RequirementPipeline};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌 (stderr，stdout 留給結果)
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting reqsift CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Requirement extraction failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        std::process::exit(e.severity().exit_code());
    }
}

async fn run(cli: &CliConfig) -> Result<(), ExtractorError> {
    let config = cli.service_config()?;
    config.validate()?;
    config.require_api_key()?;

    let request = cli.to_request();
    validate_document_refs(&request.files)?;

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(cli.base_dir.clone());
    let pipeline = RequirementPipeline::new(storage, config, request)?;
    let engine = ExtractionEngine::new_with_monitoring(pipeline, cli.monitor);

    let response = engine.run().await?;

    let rendered = match cli.format {
        OutputFormat::Json => render_json(&response)?,
        OutputFormat::Csv => render_csv(&response.requirements)?,
    };

    for diagnostic in &response.diagnostics {
        tracing::warn!("⚠️ {}", diagnostic);
    }

    match &cli.output {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, rendered)?;
            tracing::info!("📁 Output saved to: {}", path);
            eprintln!(
                "✅ {} requirement(s) written to {}",
                response.requirements.len(),
                path
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
