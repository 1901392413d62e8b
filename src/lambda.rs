#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use base64::Engine as _;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use reqsift::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use reqsift::{handle_request, HttpRequest, HttpResponse, LambdaConfig, S3Storage};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use std::collections::HashMap;
#[cfg(feature = "lambda")]
use std::sync::Arc;

/// API Gateway proxy 事件 (REST v1 與 HTTP API v2 都只取需要的欄位)
#[cfg(feature = "lambda")]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub http_method: Option<String>,
    pub request_context: Option<RequestContext>,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    pub http: Option<HttpContext>,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Default, Deserialize)]
pub struct HttpContext {
    pub method: Option<String>,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[cfg(feature = "lambda")]
impl From<HttpResponse> for ProxyResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status_code: response.status,
            headers: response.headers.into_iter().collect(),
            body: response.body,
            is_base64_encoded: false,
        }
    }
}

#[cfg(feature = "lambda")]
impl ProxyRequest {
    fn into_http_request(self) -> Result<HttpRequest, HttpResponse> {
        let method = self
            .http_method
            .or_else(|| self.request_context.and_then(|ctx| ctx.http).and_then(|http| http.method))
            .unwrap_or_else(|| "POST".to_string());

        let body = match self.body {
            Some(raw) if self.is_base64_encoded => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(raw.trim())
                    .map_err(|e| {
                        HttpResponse::error(400, &format!("Body is not valid base64: {}", e), None)
                    })?;
                Some(String::from_utf8(bytes).map_err(|_| {
                    HttpResponse::error(400, "Body is not valid UTF-8", None)
                })?)
            }
            other => other,
        };

        Ok(HttpRequest { method, body })
    }
}

#[cfg(feature = "lambda")]
struct AppState {
    config: LambdaConfig,
    s3_client: S3Client,
}

#[cfg(feature = "lambda")]
async fn function_handler(
    state: Arc<Result<AppState, reqsift::ExtractorError>>,
    event: LambdaEvent<ProxyRequest>,
) -> Result<ProxyResponse, Error> {
    let request_id = event.context.request_id.clone();
    tracing::info!(request_id = %request_id, "Starting requirement extraction request");

    let request = match event.payload.into_http_request() {
        Ok(request) => request,
        Err(response) => return Ok(response.into()),
    };

    // 冷啟動時設定讀取失敗：method/body 錯誤仍優先回報
    let state = match state.as_ref() {
        Ok(state) => state,
        Err(e) => {
            if let Err(response) = reqsift::app::handler::parse_request(&request) {
                return Ok(response.into());
            }
            tracing::error!("❌ Configuration error: {}", e);
            return Ok(HttpResponse::error(
                e.status_code(),
                &e.to_string(),
                Some(e.recovery_suggestion()),
            )
            .into());
        }
    };

    let storage = S3Storage::new(state.s3_client.clone(), state.config.s3_bucket.clone());
    let archive_path = state
        .config
        .results_prefix
        .as_deref()
        .map(|prefix| format!("{}/{}.json", prefix.trim_end_matches('/'), request_id));

    let response = handle_request(request, &state.config.service, storage, archive_path).await;
    tracing::info!(request_id = %request_id, status = response.status, "Request finished");
    Ok(response.into())
}

#[cfg(feature = "lambda")]
async fn load_state() -> Result<AppState, reqsift::ExtractorError> {
    let config = LambdaConfig::from_env()?;
    config.validate()?;

    // 創建AWS配置和S3客戶端
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .region(Region::new(config.s3_region.clone()))
        .build();

    Ok(AppState {
        config,
        s3_client: S3Client::from_conf(s3_config),
    })
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let state = Arc::new(load_state().await);
    if let Err(e) = state.as_ref() {
        tracing::error!("❌ Lambda configuration failed: {}", e);
    }

    run(service_fn(move |event| function_handler(state.clone(), event))).await
}


#[cfg(all(test, feature = "lambda"))]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> ProxyRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rest_api_event() {
        let request = event(json!({
            "httpMethod": "POST",
            "body": "{\"files\": []}",
            "isBase64Encoded": false
        }))
        .into_http_request()
        .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.body.as_deref(), Some("{\"files\": []}"));
    }

    #[test]
    fn test_http_api_event_with_base64_body() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(r#"{"files": []}"#);
        let request = event(json!({
            "requestContext": {"http": {"method": "GET"}},
            "body": encoded,
            "isBase64Encoded": true
        }))
        .into_http_request()
        .unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.body.as_deref(), Some(r#"{"files": []}"#));
    }

    #[test]
    fn test_invalid_base64_body_is_400() {
        let response = event(json!({
            "httpMethod": "POST",
            "body": "not base64 !!",
            "isBase64Encoded": true
        }))
        .into_http_request()
        .unwrap_err();

        assert_eq!(response.status, 400);
        assert!(response.body.contains("base64"));
    }

    #[test]
    fn test_proxy_response_shape() {
        let proxy: ProxyResponse = HttpResponse::error(405, "use POST", None).into();
        let value = serde_json::to_value(&proxy).unwrap();

        assert_eq!(value["statusCode"], 405);
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(value["isBase64Encoded"], false);
    }
}
