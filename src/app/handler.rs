//! 與平台無關的 HTTP 處理：驗證請求 → 執行抽取流程 → JSON 回應。
//! Lambda 與其他 serverless 平台只需把各自的事件轉成 [`HttpRequest`]。

use crate::config::ServiceConfig;
use crate::core::engine::ExtractionEngine;
use crate::core::pipeline::RequirementPipeline;
use crate::domain::model::ExtractionRequest;
use crate::domain::ports::Storage;
use crate::utils::error::ExtractorError;
use crate::utils::validation::validate_document_refs;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body,
            },
            Err(e) => Self::error(500, &format!("Could not serialize response: {}", e), None),
        }
    }

    pub fn error(status: u16, message: &str, suggestion: Option<&str>) -> Self {
        let payload = ErrorBody {
            error: message.to_string(),
            suggestion,
        };
        let body = serde_json::to_string(&payload)
            .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string());
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    fn from_error(error: &ExtractorError) -> Self {
        Self::error(
            error.status_code(),
            &error.to_string(),
            Some(error.recovery_suggestion()),
        )
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// 檢查 method 與 body，回傳解析後的請求或對應的錯誤回應
pub fn parse_request(request: &HttpRequest) -> Result<ExtractionRequest, HttpResponse> {
    if !request.method.eq_ignore_ascii_case("POST") {
        let mut response = HttpResponse::error(
            405,
            &format!("Method {} not allowed; use POST", request.method),
            None,
        );
        response
            .headers
            .push(("Allow".to_string(), "POST".to_string()));
        return Err(response);
    }

    let body = request
        .body
        .as_deref()
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .ok_or_else(|| HttpResponse::error(400, "Request body is required", None))?;

    let parsed: ExtractionRequest = serde_json::from_str(body)
        .map_err(|e| HttpResponse::error(400, &format!("Invalid JSON body: {}", e), None))?;

    validate_document_refs(&parsed.files).map_err(|e| HttpResponse::from_error(&e))?;
    Ok(parsed)
}

pub async fn handle_request<S: Storage>(
    request: HttpRequest,
    config: &ServiceConfig,
    storage: S,
    archive_path: Option<String>,
) -> HttpResponse {
    let extraction_request = match parse_request(&request) {
        Ok(parsed) => parsed,
        Err(response) => {
            tracing::warn!("Rejected request with status {}", response.status);
            return response;
        }
    };

    // 設定缺漏直接回錯誤，不去抓任何檔案
    if let Err(e) = config.require_api_key() {
        tracing::error!("❌ {}", e);
        return HttpResponse::from_error(&e);
    }

    tracing::info!(
        "Processing {} document(s)",
        extraction_request.files.len()
    );

    let pipeline = match RequirementPipeline::new(storage, config.clone(), extraction_request) {
        Ok(pipeline) => match archive_path {
            Some(path) => pipeline.with_archive_path(path),
            None => pipeline,
        },
        Err(e) => {
            tracing::error!("❌ Could not build pipeline: {}", e);
            return HttpResponse::from_error(&e);
        }
    };

    match ExtractionEngine::new(pipeline).run().await {
        Ok(response) => HttpResponse::json(200, &response),
        Err(e) => {
            tracing::error!(
                "❌ Extraction failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            HttpResponse::from_error(&e)
        }
    }
}
