#[cfg(feature = "lambda")]
use crate::config::ServiceConfig;
#[cfg(feature = "lambda")]
use crate::domain::ports::Storage;
#[cfg(feature = "lambda")]
use crate::utils::error::{ExtractorError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub service: ServiceConfig,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    /// 有設定時，每次回應都會另存一份 JSON 到 S3
    pub results_prefix: Option<String>,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            service: ServiceConfig::from_env()?,
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION").unwrap_or_else(|| "ap-southeast-2".to_string()),
            results_prefix: non_empty("RESULTS_PREFIX"),
        })
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        self.service.validate()?;

        if let Some(bucket) = &self.s3_bucket {
            validate_s3_bucket_name("s3_bucket", bucket)?;
        }
        validate_aws_region("s3_region", &self.s3_region)?;

        if self.results_prefix.is_some() && self.s3_bucket.is_none() {
            return Err(ExtractorError::MissingConfigError {
                field: "S3_BUCKET (required by RESULTS_PREFIX)".to_string(),
            });
        }

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| ExtractorError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// 以 S3 作為文件來源：接受 `s3://bucket/key` 或使用預設 bucket 的 key
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    default_bucket: Option<String>,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, default_bucket: Option<String>) -> Self {
        Self {
            client,
            default_bucket,
        }
    }

    fn locate<'a>(&'a self, path: &'a str) -> Result<(&'a str, &'a str)> {
        if let Some(rest) = path.strip_prefix("s3://") {
            return rest
                .split_once('/')
                .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
                .ok_or_else(|| ExtractorError::FetchError {
                    name: path.to_string(),
                    message: "S3 reference must look like s3://bucket/key".to_string(),
                });
        }

        let bucket = self
            .default_bucket
            .as_deref()
            .ok_or_else(|| ExtractorError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?;
        Ok((bucket, path.trim_start_matches('/')))
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let (bucket, key) = self.locate(path)?;
        tracing::debug!("Reading s3://{}/{}", bucket, key);

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ExtractorError::FetchError {
                name: path.to_string(),
                message: format!("S3 GetObject failed: {}", e.into_service_error()),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ExtractorError::FetchError {
                name: path.to_string(),
                message: format!("Failed to collect S3 body: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let (bucket, key) = self.locate(path)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| ExtractorError::FetchError {
                name: path.to_string(),
                message: format!("S3 PutObject failed: {}", e.into_service_error()),
            })?;

        tracing::info!("Stored result at s3://{}/{}", bucket, key);
        Ok(())
    }
}
