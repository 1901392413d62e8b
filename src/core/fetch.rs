use crate::domain::model::DocumentRef;
use crate::domain::ports::Storage;
use crate::utils::error::{ExtractorError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// http(s) 直接下載，其餘交給 Storage (本機或 S3)
pub struct DocumentFetcher<S: Storage> {
    client: Client,
    storage: S,
    max_file_bytes: usize,
}

impl<S: Storage> DocumentFetcher<S> {
    pub fn new(client: Client, storage: S, max_file_bytes: usize) -> Self {
        Self {
            client,
            storage,
            max_file_bytes,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn fetch(&self, document: &DocumentRef) -> Result<FetchedDocument> {
        let url = document.url.trim();

        let fetched = if is_http_url(url) {
            self.fetch_http(document, url).await?
        } else {
            tracing::debug!("Reading {} from storage: {}", document.name, url);
            FetchedDocument {
                bytes: self.storage.read_file(url).await?,
                content_type: None,
            }
        };

        if fetched.bytes.is_empty() {
            return Err(ExtractorError::FetchError {
                name: document.name.clone(),
                message: "document is empty".to_string(),
            });
        }
        self.check_size(document, fetched.bytes.len())?;

        Ok(fetched)
    }

    async fn fetch_http(&self, document: &DocumentRef, url: &str) -> Result<FetchedDocument> {
        tracing::debug!("Downloading {} from {}", document.name, url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ExtractorError::FetchError {
                name: document.name.clone(),
                message: format!("HTTP {}", status),
            });
        }

        if let Some(length) = response.content_length() {
            self.check_size(document, length as usize)?;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_lowercase());

        let bytes = response.bytes().await?.to_vec();
        tracing::debug!("Downloaded {} ({} bytes)", document.name, bytes.len());

        Ok(FetchedDocument {
            bytes,
            content_type,
        })
    }

    fn check_size(&self, document: &DocumentRef, size: usize) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(ExtractorError::FetchError {
                name: document.name.clone(),
                message: format!(
                    "document is {} bytes, limit is {} bytes",
                    size, self.max_file_bytes
                ),
            });
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::collections::HashMap;

    struct MapStorage {
        files: HashMap<String, Vec<u8>>,
    }

    impl Storage for MapStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| ExtractorError::FetchError {
                    name: path.to_string(),
                    message: "not found".to_string(),
                })
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn fetcher(max_file_bytes: usize) -> DocumentFetcher<MapStorage> {
        let mut files = HashMap::new();
        files.insert("local/notes.txt".to_string(), b"shall be galvanised".to_vec());
        DocumentFetcher::new(Client::new(), MapStorage { files }, max_file_bytes)
    }

    fn doc(name: &str, url: &str) -> DocumentRef {
        DocumentRef {
            name: name.to_string(),
            url: url.to_string(),
            mime_type: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_http_document() {
        let server = MockServer::start_async().await;
        let file_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/files/spec.txt");
                then.status(200)
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body("All bolts shall be M16 grade 8.8");
            })
            .await;

        let fetched = fetcher(1024)
            .fetch(&doc("spec.txt", &server.url("/files/spec.txt")))
            .await
            .unwrap();

        file_mock.assert_async().await;
        assert_eq!(fetched.bytes, b"All bolts shall be M16 grade 8.8");
        assert_eq!(fetched.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/expired.pdf");
                then.status(403);
            })
            .await;

        let err = fetcher(1024)
            .fetch(&doc("expired.pdf", &server.url("/expired.pdf")))
            .await
            .unwrap_err();

        match err {
            ExtractorError::FetchError { name, message } => {
                assert_eq!(name, "expired.pdf");
                assert!(message.contains("403"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_from_storage_and_size_limit() {
        let fetched = fetcher(1024)
            .fetch(&doc("notes.txt", "local/notes.txt"))
            .await
            .unwrap();
        assert!(fetched.content_type.is_none());
        assert_eq!(fetched.bytes, b"shall be galvanised");

        let too_big = fetcher(4)
            .fetch(&doc("notes.txt", "local/notes.txt"))
            .await;
        assert!(matches!(too_big, Err(ExtractorError::FetchError { .. })));
    }
}
