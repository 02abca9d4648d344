use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ContentId, ContentLoader, ContentNetwork};
use crate::{
    error::{VaultError, VaultResult},
    http_request::Request,
};

/// Largest payload [`IpfsClient`] adds.
///
/// The node is asked for 1 MiB chunks, so anything up to this size is stored
/// as a single raw leaf whose multihash is the keccak-256 of the payload.
/// Larger payloads would become a DAG node with a different identifier.
pub const MAX_CONTENT_SIZE: usize = 1 << 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

/// Client for the HTTP API of an IPFS node.
///
/// Content is added as `CIDv1` raw leaves hashed with keccak-256 so that the
/// returned identifiers line up with [`ContentId::for_content`]. Payloads are
/// limited to [`MAX_CONTENT_SIZE`].
#[derive(Debug, Clone)]
pub struct IpfsClient {
    base_url: String,
    request: Request,
}

impl IpfsClient {
    /// Creates a client for the API served at `base_url` (e.g. `http://127.0.0.1:5001`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request: Request::new(),
        }
    }

    /// Overrides the per-request timeout, e.g. for large uploads.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.with_timeout(timeout);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.base_url)
    }
}

#[async_trait]
impl ContentLoader for IpfsClient {
    async fn get(&self, id: &ContentId) -> VaultResult<Vec<u8>> {
        let url = self.endpoint("cat");
        let builder = self.request.post(&url)?.query(&[("arg", id.to_string())]);
        let response = self.request.handle(builder).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ContentNetwork for IpfsClient {
    async fn add(&self, content: Vec<u8>) -> VaultResult<ContentId> {
        if content.len() > MAX_CONTENT_SIZE {
            return Err(VaultError::InvalidInput {
                attribute: "content".to_string(),
                reason: format!(
                    "{} bytes exceed the single chunk limit of {MAX_CONTENT_SIZE}",
                    content.len()
                ),
            });
        }
        let url = self.endpoint("add");
        let form = Form::new().part("file", Part::bytes(content).file_name("payload"));
        let builder = self
            .request
            .post(&url)?
            .query(&[
                ("cid-version", "1"),
                ("hash", "keccak-256"),
                ("raw-leaves", "true"),
                ("chunker", "size-1048576"),
            ])
            .multipart(form);
        let response = self.request.handle(builder).await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(VaultError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: body,
            });
        }

        // the node streams one JSON object per added entry
        let line = body
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| VaultError::SerializationError {
                error: "empty add response".to_string(),
            })?;
        let added: AddResponse = serde_json::from_str(line)?;
        added.hash.parse()
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn test_add_uses_keccak_raw_leaves() {
        let mut server = mockito::Server::new_async().await;
        let expected = ContentId::for_content(b"payload").unwrap();

        let mock = server
            .mock("POST", "/api/v0/add")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cid-version".into(), "1".into()),
                Matcher::UrlEncoded("hash".into(), "keccak-256".into()),
                Matcher::UrlEncoded("raw-leaves".into(), "true".into()),
                Matcher::UrlEncoded("chunker".into(), "size-1048576".into()),
            ]))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "Name": "payload",
                    "Hash": expected.to_string(),
                    "Size": "7"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = IpfsClient::new(server.url());
        let id = client.add(b"payload".to_vec()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(id, expected);
    }

    #[tokio::test]
    async fn test_add_rejects_payload_above_one_chunk() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/add")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = IpfsClient::new(server.url());
        let err = client
            .add(vec![0u8; MAX_CONTENT_SIZE + 1])
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, VaultError::InvalidInput { attribute, .. } if attribute == "content"));
    }

    #[tokio::test]
    async fn test_cat_fetches_by_cid() {
        let mut server = mockito::Server::new_async().await;
        let id = ContentId::for_content(b"payload").unwrap();

        server
            .mock("POST", "/api/v0/cat")
            .match_query(Matcher::UrlEncoded("arg".into(), id.to_string()))
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let client = IpfsClient::new(format!("{}/", server.url()));
        assert_eq!(client.get(&id).await.unwrap(), b"payload".to_vec());
    }

    #[tokio::test]
    async fn test_cat_reports_missing_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v0/cat")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = IpfsClient::new(server.url());
        let err = client
            .get(&ContentId::for_content(b"missing").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NetworkError { status: Some(404), .. }));
    }
}
