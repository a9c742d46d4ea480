use std::{io, path::Path, sync::Arc};

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;
use tracing::trace;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported upload method: {0}")]
    UnsupportedMethod(String),
    #[error("concurrency limiter is closed")]
    ConcurrencyClosed,
}

/// Streams local files to pre-signed upload links. At most
/// `upload_concurrency` bodies are in flight at once.
#[derive(Clone)]
pub struct TransferClient {
    http: Client,
    upload_limit: Arc<Semaphore>,
}

impl TransferClient {
    pub fn new(upload_concurrency: usize) -> Self {
        Self::with_http(Client::new(), upload_concurrency)
    }

    pub fn with_http(http: Client, upload_concurrency: usize) -> Self {
        Self {
            http,
            upload_limit: Arc::new(Semaphore::new(upload_concurrency.max(1))),
        }
    }

    /// Sends `source` as the request body and returns the number of bytes sent.
    pub async fn upload_from_path(
        &self,
        method: &str,
        href: &Url,
        source: &Path,
        content_type: &str,
    ) -> Result<u64, TransferError> {
        let method = upload_method(method)?;
        let _permit = self
            .upload_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransferError::ConcurrencyClosed)?;

        let file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();
        trace!(url = %href, length, "streaming upload body");
        self.http
            .request(method, href.clone())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?
            .error_for_status()?;
        Ok(length)
    }
}

fn upload_method(raw: &str) -> Result<Method, TransferError> {
    match raw.to_ascii_uppercase().as_str() {
        "PUT" => Ok(Method::PUT),
        "POST" => Ok(Method::POST),
        _ => Err(TransferError::UnsupportedMethod(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upload_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/upload", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn uploads_file_contents_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(header("content-type", "audio/wav"))
            .and(body_bytes(b"payload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("mix.wav");
        std::fs::write(&source, b"payload").unwrap();

        let sent = TransferClient::new(2)
            .upload_from_path("put", &upload_url(&server), &source, "audio/wav")
            .await
            .unwrap();
        assert_eq!(sent, 7);
    }

    #[tokio::test]
    async fn honours_post_links() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("mix.mp3");
        std::fs::write(&source, b"mp3").unwrap();

        TransferClient::new(1)
            .upload_from_path("POST", &upload_url(&server), &source, "audio/mpeg")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("mix.wav");
        std::fs::write(&source, b"payload").unwrap();

        let err = TransferClient::new(1)
            .upload_from_path("PUT", &upload_url(&server), &source, "audio/wav")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Request(_)));
    }

    #[tokio::test]
    async fn missing_source_is_io_error() {
        let dir = tempdir().unwrap();
        let href = Url::parse("http://127.0.0.1:9/upload").unwrap();
        let err = TransferClient::new(1)
            .upload_from_path("PUT", &href, &dir.path().join("nope"), "audio/wav")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[test]
    fn read_only_methods_are_not_upload_methods() {
        assert!(matches!(
            upload_method("GET"),
            Err(TransferError::UnsupportedMethod(method)) if method == "GET"
        ));
    }
}
