//! REST client for the remote service
//!
//! One `RestClient` holds the HTTP connection pool and credentials; each
//! resource kind talks to it through a typed `RestEndpoint`.

use std::marker::PhantomData;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_core::{ClientError, ClientResult, RemoteClient};

use crate::config::ProviderConfig;
use crate::utils::normalize_path;

/// Maximum number of response body characters kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Authenticated HTTP client bound to one tenant
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(config: &ProviderConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tether-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Typed endpoint for the collection at `path` (e.g., "trust-providers")
    pub fn endpoint<D>(&self, path: &str) -> RestEndpoint<D> {
        RestEndpoint {
            client: self.clone(),
            path: normalize_path(path).to_string(),
            _dto: PhantomData,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }
}

/// `RemoteClient` for one resource collection
#[derive(Debug, Clone)]
pub struct RestEndpoint<D> {
    client: RestClient,
    path: String,
    _dto: PhantomData<fn() -> D>,
}

impl<D> RestEndpoint<D> {
    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.client.base_url, self.path)
    }

    pub fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    pub fn disable_url(&self, id: &str) -> String {
        format!("{}/disable", self.record_url(id))
    }
}

impl<D> RestEndpoint<D>
where
    D: Serialize + DeserializeOwned,
{
    async fn send(
        &self,
        method: Method,
        url: &str,
        id: Option<&str>,
        body: Option<&D>,
    ) -> ClientResult<reqwest::Response> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, id, &body))
    }

    async fn send_json(
        &self,
        method: Method,
        url: &str,
        id: Option<&str>,
        body: Option<&D>,
    ) -> ClientResult<D> {
        let response = self.send(method, url, id, body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("{}: {}", url, e)))?;
        serde_json::from_str(&text).map_err(|e| {
            ClientError::Serialization(format!("Failed to parse response from {}: {}", url, e))
        })
    }
}

/// Map a non-success HTTP status to a client error
fn status_error(status: StatusCode, id: Option<&str>, body: &str) -> ClientError {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => ClientError::not_found(id),
        _ => ClientError::Api {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        },
    }
}

#[async_trait]
impl<D> RemoteClient<D> for RestEndpoint<D>
where
    D: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn create(&self, dto: &D) -> ClientResult<D> {
        let url = self.collection_url();
        self.send_json(Method::POST, &url, None, Some(dto)).await
    }

    async fn get(&self, id: &str) -> ClientResult<D> {
        let url = self.record_url(id);
        self.send_json(Method::GET, &url, Some(id), None).await
    }

    async fn update(&self, dto: &D) -> ClientResult<D> {
        let url = self.collection_url();
        self.send_json(Method::PUT, &url, None, Some(dto)).await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        let url = self.record_url(id);
        self.send(Method::DELETE, &url, Some(id), None).await?;
        Ok(())
    }

    async fn disable(&self, id: &str) -> ClientResult<D> {
        let url = self.disable_url(id);
        self.send_json(Method::PATCH, &url, Some(id), None).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::kinds::role::RoleDto;

    fn client(base: &str) -> RestClient {
        RestClient::new(&ProviderConfig::new("acme", "secret-token").with_endpoint(base)).unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (base, handle)
    }

    #[test]
    fn endpoint_urls() {
        let endpoint = client("https://acme.api.tether.cloud/api/v1/").endpoint::<RoleDto>("/roles/");
        assert_eq!(endpoint.collection_url(), "https://acme.api.tether.cloud/api/v1/roles");
        assert_eq!(
            endpoint.record_url("role-1"),
            "https://acme.api.tether.cloud/api/v1/roles/role-1"
        );
        assert_eq!(
            endpoint.disable_url("role-1"),
            "https://acme.api.tether.cloud/api/v1/roles/role-1/disable"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, Some("tp-1"), ""),
            ClientError::not_found("tp-1")
        );
        // a 404 on the collection itself is not a missing record
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, None, "no route"),
            ClientError::Api { status: 404, .. }
        ));

        let long = "x".repeat(2 * MAX_ERROR_BODY);
        match status_error(StatusCode::BAD_REQUEST, None, &long) {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_parses_body() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"externalId":"role-1","name":"ops","permissions":[{"name":"Users","read":true,"write":false}]}"#,
        )
        .await;

        let dto = client(&base).endpoint::<RoleDto>("roles").get("role-1").await.unwrap();
        assert_eq!(dto.entity.external_id, "role-1");
        assert_eq!(dto.permissions.len(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/roles/role-1 HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (base, server) = serve_once("404 Not Found", "").await;
        let err = client(&base)
            .endpoint::<RoleDto>("roles")
            .get("role-9")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn disable_uses_patch() {
        let (base, server) = serve_once("200 OK", r#"{"name":"ops","isActive":false}"#).await;
        let dto = client(&base)
            .endpoint::<RoleDto>("roles")
            .disable("role-1")
            .await
            .unwrap();
        assert_eq!(dto.entity.is_active, Some(false));

        let request = server.await.unwrap();
        assert!(request.starts_with("PATCH /api/v1/roles/role-1/disable HTTP/1.1"));
    }

    #[tokio::test]
    async fn unparseable_response_is_serialization_error() {
        let (base, server) = serve_once("200 OK", "<html>").await;
        let err = client(&base)
            .endpoint::<RoleDto>("roles")
            .get("role-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Serialization(_)));
        server.await.unwrap();
    }
}
