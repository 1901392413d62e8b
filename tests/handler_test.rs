use anyhow::Result;
use httpmock::prelude::*;
use reqsift::{handle_request, HttpRequest, LocalStorage, ServiceConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

fn post(body: Value) -> HttpRequest {
    HttpRequest {
        method: "POST".to_string(),
        body: Some(body.to_string()),
    }
}

fn config_for(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.llm.api_key = Some("sk-ant-test".to_string());
    config.llm.base_url = server.base_url();
    config.llm.retry_delay_ms = 5;
    config
}

fn storage(dir: &TempDir) -> LocalStorage {
    LocalStorage::new(dir.path().to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_get_is_rejected_before_anything_else() {
    let dir = TempDir::new().unwrap();
    let response = handle_request(
        HttpRequest {
            method: "GET".to_string(),
            body: None,
        },
        &ServiceConfig::default(),
        storage(&dir),
        None,
    )
    .await;

    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("POST"));
}

#[tokio::test]
async fn test_bad_input_is_400_even_without_api_key() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig::default();

    let empty = handle_request(post(json!({"files": []})), &config, storage(&dir), None).await;
    assert_eq!(empty.status, 400);

    let blank_name = handle_request(
        post(json!({"files": [{"name": " ", "url": "a.txt"}]})),
        &config,
        storage(&dir),
        None,
    )
    .await;
    assert_eq!(blank_name.status, 400);
    let body: Value = serde_json::from_str(&blank_name.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_missing_api_key_is_500() {
    let dir = TempDir::new().unwrap();
    let response = handle_request(
        post(json!({"files": [{"name": "a.txt", "url": "a.txt"}]})),
        &ServiceConfig::default(),
        storage(&dir),
        None,
    )
    .await;

    assert_eq!(response.status, 500);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
    assert!(body["suggestion"].is_string());
}

#[tokio::test]
async fn test_end_to_end_extraction_with_duplicates_and_missing_file() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(
        dir.path().join("civil.txt"),
        "Kerbs shall be 150 mm high. Drainage shall follow the 1% AEP event.",
    )?;

    let server = MockServer::start_async().await;
    let file_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/files/drainage.txt");
            then.status(200)
                .header("Content-Type", "text/plain")
                .body("Drainage shall follow the 1% AEP event.");
        })
        .await;
    let llm_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({
                "content": [{
                    "type": "text",
                    "text": "```json\n[{\"severity\": \"must\", \"category\": \"Civil\", \"requirement\": \"Kerbs shall be 150 mm high.\"},\n {\"severity\": \"High\", \"category\": \"Civil\", \"requirement\": \"Drainage shall follow the 1% AEP event.\", \"rationale\": \"Flood immunity\"}]\n```"
                }],
                "stop_reason": "end_turn"
            }));
        })
        .await;

    let body = json!({
        "files": [
            {"name": "civil.txt", "url": "civil.txt"},
            {"name": "drainage.txt", "url": server.url("/files/drainage.txt")},
            {"name": "missing.pdf", "url": "missing.pdf"}
        ],
        "options": {"projectName": "Northern Link", "discipline": "Civil"}
    });

    let response = handle_request(post(body), &config_for(&server), storage(&dir), None).await;

    assert_eq!(response.status, 200, "body: {}", response.body);
    assert_eq!(response.header("content-type"), Some("application/json"));
    file_mock.assert_async().await;
    llm_mock.assert_hits_async(2).await;

    let parsed: Value = serde_json::from_str(&response.body)?;
    let requirements = parsed["requirements"].as_array().unwrap();
    assert_eq!(requirements.len(), 2);
    assert_eq!(requirements[0]["id"], "REQ-001");
    assert_eq!(requirements[0]["severity"], "high");
    assert_eq!(requirements[0]["source"], "civil.txt");
    assert_eq!(requirements[1]["id"], "REQ-002");
    assert_eq!(requirements[1]["rationale"], "Flood immunity");

    let stats = &parsed["stats"];
    assert_eq!(stats["filesReceived"], 3);
    assert_eq!(stats["filesExtracted"], 2);
    assert_eq!(stats["chunksProcessed"], 2);
    assert_eq!(stats["requirementsFound"], 2);
    assert_eq!(stats["duplicatesRemoved"], 2);
    assert!(parsed["generatedAt"].is_string());

    let diagnostics: Vec<&str> = parsed["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(diagnostics.iter().any(|d| d.starts_with("[missing.pdf]")));
    assert!(diagnostics.contains(&"Removed 2 duplicate requirement(s)"));
    Ok(())
}

#[tokio::test]
async fn test_llm_failure_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "Paint shall be two coats.").unwrap();

    let server = MockServer::start_async().await;
    let llm_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(400).json_body(json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "prompt is too long"}
            }));
        })
        .await;

    let response = handle_request(
        post(json!({"files": [{"name": "notes.txt", "url": "notes.txt"}]})),
        &config_for(&server),
        storage(&dir),
        None,
    )
    .await;

    assert_eq!(response.status, 200);
    llm_mock.assert_hits_async(1).await;

    let parsed: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(parsed["requirements"], json!([]));
    assert_eq!(parsed["stats"]["chunksProcessed"], 0);
    assert!(parsed["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d.as_str().unwrap().contains("prompt is too long")));
}

#[tokio::test]
async fn test_result_is_archived_to_storage() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("spec.txt"), "Lighting shall be 300 lux.")?;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).json_body(json!({
                "content": [{"type": "text", "text": "[{\"requirement\": \"Lighting shall be 300 lux.\"}]"}]
            }));
        })
        .await;

    let response = handle_request(
        post(json!({"files": [{"name": "spec.txt", "url": "spec.txt"}]})),
        &config_for(&server),
        storage(&dir),
        Some("results/run-1.json".to_string()),
    )
    .await;
    assert_eq!(response.status, 200);

    let archived = std::fs::read_to_string(dir.path().join("results/run-1.json"))?;
    let archived: Value = serde_json::from_str(&archived)?;
    assert_eq!(archived["requirements"][0]["requirement"], "Lighting shall be 300 lux.");
    assert_eq!(archived["requirements"][0]["severity"], "medium");
    Ok(())
}
