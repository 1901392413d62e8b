use crate::domain::model::{ExtractionResponse, RequirementRecord};
use crate::utils::error::{ExtractorError, Result};

/// CLI `--format csv`：每筆需求一列
pub fn render_csv(records: &[RequirementRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExtractorError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExtractorError::ParseError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

pub fn render_json(response: &ExtractionResponse) -> Result<String> {
    Ok(serde_json::to_string_pretty(response)?)
}
