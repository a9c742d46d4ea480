use std::path::Path;
use std::time::Duration;

use ablesync_core::{FileAccess, StorageClient};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::SyncError;
use crate::sync::transfer::TransferClient;

/// Where task handlers put files. Keys are `directory/name`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn store_file(
        &self,
        directory: &str,
        name: &str,
        content_type: &str,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError>;

    async fn get_access_uri(
        &self,
        directory: &str,
        name: &str,
        validity: Duration,
        access: FileAccess,
    ) -> Result<Url, SyncError>;
}

/// Storage gateway backed implementation: asks the gateway for a
/// short-lived write link, then streams the file to it.
pub struct BlobStorage {
    client: StorageClient,
    transfer: TransferClient,
    link_validity: Duration,
}

impl BlobStorage {
    pub fn new(client: StorageClient, transfer: TransferClient, link_validity: Duration) -> Self {
        Self {
            client,
            transfer,
            link_validity,
        }
    }
}

#[async_trait]
impl ObjectStorage for BlobStorage {
    async fn store_file(
        &self,
        directory: &str,
        name: &str,
        content_type: &str,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let link = self
            .client
            .get_access_link(directory, name, self.link_validity, FileAccess::Write)
            .await?;
        debug!(directory, name, source = %source.display(), "uploading object");
        tokio::select! {
            result = self.transfer.upload_from_path(&link.method, &link.href, source, content_type) => {
                let bytes = result?;
                debug!(directory, name, bytes, "object stored");
                Ok(())
            }
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
        }
    }

    async fn get_access_uri(
        &self,
        directory: &str,
        name: &str,
        validity: Duration,
        access: FileAccess,
    ) -> Result<Url, SyncError> {
        let link = self
            .client
            .get_access_link(directory, name, validity, access)
            .await?;
        Ok(link.href)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{body_bytes, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn storage(server: &MockServer) -> BlobStorage {
        BlobStorage::new(
            StorageClient::new(&server.uri(), None).unwrap(),
            TransferClient::new(1),
            Duration::from_secs(900),
        )
    }

    #[tokio::test]
    async fn store_file_requests_link_then_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/objects/access"))
            .and(body_partial_json(json!({
                "key": "projects/p/audiofiles/a",
                "access": "write"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/blob/a", server.uri()),
                "method": "PUT"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob/a"))
            .and(header("content-type", "audio/mpeg3"))
            .and(body_bytes(b"mp3 bytes"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("mix.mp3");
        std::fs::write(&source, b"mp3 bytes").unwrap();

        storage(&server)
            .store_file(
                "projects/p/audiofiles",
                "a",
                "audio/mpeg3",
                &source,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_upload_returns_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/objects/access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/blob/a", server.uri()),
                "method": "PUT"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob/a"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("mix.mp3");
        std::fs::write(&source, b"mp3 bytes").unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = storage(&server)
            .store_file("projects/p/audiofiles", "a", "audio/mpeg3", &source, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }

    #[tokio::test]
    async fn access_uri_returns_gateway_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/objects/access"))
            .and(body_partial_json(json!({ "access": "read", "expires_in": 60 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": "https://blobs.example/projects/p/audiofiles/a?sig=1",
                "method": "GET"
            })))
            .mount(&server)
            .await;

        let uri = storage(&server)
            .get_access_uri(
                "projects/p/audiofiles",
                "a",
                Duration::from_secs(60),
                FileAccess::Read,
            )
            .await
            .unwrap();
        assert_eq!(uri.as_str(), "https://blobs.example/projects/p/audiofiles/a?sig=1");
    }
}
