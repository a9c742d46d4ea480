use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::keys::object_key;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("gateway returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("base url cannot carry object paths: {0}")]
    UnsupportedBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAccess {
    Read,
    Write,
}

/// Pre-signed link handed out by the gateway for a single object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AccessRequest<'a> {
    key: &'a str,
    access: FileAccess,
    expires_in: u64,
}

#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl StorageClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, StorageError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token,
        })
    }

    pub async fn get_access_link(
        &self,
        directory: &str,
        name: &str,
        validity: Duration,
        access: FileAccess,
    ) -> Result<AccessLink, StorageError> {
        let key = object_key(directory, name);
        let url = self.endpoint("/v1/objects/access")?;
        let request = AccessRequest {
            key: &key,
            access,
            expires_in: validity.as_secs().max(1),
        };
        let response = self.authorized(self.http.post(url)).json(&request).send().await?;
        Self::handle_response(response).await
    }

    pub async fn file_exists(&self, directory: &str, name: &str) -> Result<bool, StorageError> {
        let url = self.object_url(&object_key(directory, name))?;
        let response = self.authorized(self.http.head(url)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::Api {
                status,
                body: String::new(),
            }),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        Ok(self.base_url.join(path)?)
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::UnsupportedBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "objects"])
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::Api { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_encodes_each_segment() {
        let client = StorageClient::new("http://gateway.local/", None).unwrap();
        let url = client
            .object_url("projects/abc/backups/1/My Song.als")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://gateway.local/v1/objects/projects/abc/backups/1/My%20Song.als"
        );
    }
}
