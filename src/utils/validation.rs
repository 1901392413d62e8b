use crate::domain::model::DocumentRef;
use crate::utils::error::{ExtractorError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ExtractorError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 請求層級的檢查：至少一個檔案，每個檔案都要有 name 與 url
pub fn validate_document_refs(files: &[DocumentRef]) -> Result<()> {
    if files.is_empty() {
        return Err(ExtractorError::ValidationError {
            message: "'files' must contain at least one document".to_string(),
        });
    }

    for (index, file) in files.iter().enumerate() {
        if file.name.trim().is_empty() {
            return Err(ExtractorError::ValidationError {
                message: format!("files[{}] is missing 'name'", index),
            });
        }
        if file.url.trim().is_empty() {
            return Err(ExtractorError::ValidationError {
                message: format!("files[{}] ('{}') is missing 'url'", index, file.name),
            });
        }
    }

    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.url.trim()) {
            tracing::warn!("Duplicate document reference in request: {}", file.url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, url: &str) -> DocumentRef {
        DocumentRef {
            name: name.to_string(),
            url: url.to_string(),
            mime_type: None,
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("anthropic.base_url", "https://example.com").is_ok());
        assert!(validate_url("anthropic.base_url", "http://example.com").is_ok());
        assert!(validate_url("anthropic.base_url", "").is_err());
        assert!(validate_url("anthropic.base_url", "invalid-url").is_err());
        assert!(validate_url("anthropic.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("chunk_chars", 12_000usize, 1_000, 200_000).is_ok());
        assert!(validate_range("chunk_chars", 10usize, 1_000, 200_000).is_err());
        assert!(validate_range("poll_max_attempts", 121u32, 1, 120).is_err());
    }

    #[test]
    fn test_validate_document_refs() {
        assert!(validate_document_refs(&[doc("spec.pdf", "https://files.test/spec.pdf")]).is_ok());

        let empty = validate_document_refs(&[]).unwrap_err();
        assert!(matches!(empty, ExtractorError::ValidationError { .. }));

        assert!(validate_document_refs(&[doc("  ", "https://files.test/a.pdf")]).is_err());
        assert!(validate_document_refs(&[doc("a.pdf", "")]).is_err());
    }
}
