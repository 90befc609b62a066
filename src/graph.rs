//! Authenticated Graph request dispatcher
//!
//! Issues exactly one JSON-over-HTTP call per [`GraphClient::request`] and
//! normalizes the outcome into a JSON value or a classified [`GraphError`].
//! No retries. Errors are returned to the caller untouched; logging them is
//! the tool layer's job.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::auth::TokenManager;
use crate::config::ServerConfig;
use crate::errors::{GraphError, GraphResult};

/// Methods the dispatcher knows how to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Only POST and PATCH send a JSON body
    fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }

    fn to_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(GraphError::UnsupportedMethod(s.to_owned())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OData query parameters, in the order they should appear on the URL
pub type QueryParams<'a> = [(&'a str, String)];

/// Graph API client sharing one token manager
#[derive(Debug, Clone)]
pub struct GraphClient {
    config: Arc<ServerConfig>,
    http_client: Client,
    tokens: Arc<TokenManager>,
}

impl GraphClient {
    pub fn new(config: Arc<ServerConfig>, http_client: Client, tokens: Arc<TokenManager>) -> Self {
        Self {
            config,
            http_client,
            tokens,
        }
    }

    /// Build the shared HTTP client, token manager and dispatcher
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the TLS backend cannot be initialized.
    pub fn from_config(config: Arc<ServerConfig>) -> GraphResult<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| GraphError::InvalidResponse(format!("failed to build HTTP client: {e}")))?;
        let tokens = Arc::new(TokenManager::new(Arc::clone(&config), http_client.clone()));
        Ok(Self::new(config, http_client, tokens))
    }

    /// Execute one authenticated request against `{base}{endpoint}`
    ///
    /// `body` is sent only for POST and PATCH. An empty successful body
    /// yields an empty JSON object.
    ///
    /// # Errors
    ///
    /// - `UnsupportedMethod` for anything but GET/POST/PATCH/DELETE, before
    ///   any network activity
    /// - `Configuration`/`Authentication` from the token manager, unchanged
    /// - `RemoteApi` for 4xx/5xx responses (raw body kept) and transport
    ///   failures (no status)
    /// - `InvalidResponse` for a non-JSON success body
    pub async fn request(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
        query: &QueryParams<'_>,
    ) -> GraphResult<Value> {
        let method: HttpMethod = method.parse()?;
        let token = self.tokens.access_token().await?;

        let url = format!("{}{}", self.config.graph_base_url, endpoint);
        let request_id = Uuid::new_v4();
        let mut builder = self
            .http_client
            .request(method.to_reqwest(), &url)
            .timeout(self.config.http_timeout())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .header("client-request-id", request_id.to_string());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if method.carries_body()
            && let Some(body) = body
        {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| GraphError::RemoteApi {
            status: None,
            body: e.to_string(),
        })?;
        let status = response.status();
        debug!(%method, endpoint, status = status.as_u16(), %request_id, "graph request completed");

        let text = response.text().await.map_err(|e| GraphError::RemoteApi {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if status.is_client_error() || status.is_server_error() {
            return Err(GraphError::RemoteApi {
                status: Some(status.as_u16()),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| GraphError::InvalidResponse(format!("Graph returned non-JSON body: {e}")))
    }

    pub async fn get(&self, endpoint: &str, query: &QueryParams<'_>) -> GraphResult<Value> {
        self.request(HttpMethod::Get.as_str(), endpoint, None, query)
            .await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> GraphResult<Value> {
        self.request(HttpMethod::Post.as_str(), endpoint, Some(body), &[])
            .await
    }

    pub async fn patch(&self, endpoint: &str, body: &Value) -> GraphResult<Value> {
        self.request(HttpMethod::Patch.as_str(), endpoint, Some(body), &[])
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> GraphResult<Value> {
        self.request(HttpMethod::Delete.as_str(), endpoint, None, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{GraphClient, HttpMethod};
    use crate::config::{GraphCredentials, ServerConfig};
    use crate::errors::GraphError;

    const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

    fn client_for(server: &MockServer) -> GraphClient {
        let mut config =
            ServerConfig::with_credentials(GraphCredentials::new("tenant-1", "client-1", "secret-1"));
        config.authority_url = server.uri();
        config.graph_base_url = format!("{}/v1.0", server.uri());
        GraphClient::from_config(Arc::new(config)).expect("client")
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-a",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn parses_supported_methods_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().expect("GET"), HttpMethod::Get);
        assert_eq!("Patch".parse::<HttpMethod>().expect("PATCH"), HttpMethod::Patch);
        assert!(matches!(
            "TRACE".parse::<HttpMethod>(),
            Err(GraphError::UnsupportedMethod(m)) if m == "TRACE"
        ));
    }

    #[tokio::test]
    async fn get_exchanges_token_then_returns_parsed_body() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        let payload = json!({ "value": [{ "id": "m1", "subject": "Hello" }] });
        Mock::given(method("GET"))
            .and(path("/v1.0/me/messages"))
            .and(header("authorization", "Bearer token-a"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.request("GET", "/me/messages", None, &[]).await.expect("ok");
        assert_eq!(result, payload);
    }

    #[tokio::test]
    async fn unsupported_method_makes_no_network_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .request("TRACE", "/me/messages", None, &[])
            .await
            .expect_err("must fail");
        assert!(matches!(err, GraphError::UnsupportedMethod(_)));
    }

    #[tokio::test]
    async fn error_status_keeps_raw_body_and_is_not_retried() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        let body = r#"{"error":{"message":"Access denied"}}"#;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/messages"))
            .respond_with(ResponseTemplate::new(403).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.get("/me/messages", &[]).await {
            Err(GraphError::RemoteApi { status, body: got }) => {
                assert_eq!(status, Some(403));
                assert_eq!(got, body);
            }
            other => panic!("expected remote API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_success_body_yields_empty_object() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/v1.0/me/messages/m1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.delete("/me/messages/m1").await.expect("ok");
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn odata_query_parameters_are_encoded() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/messages"))
            .and(query_param("$top", "5"))
            .and(query_param("$filter", "isRead eq false"))
            .and(query_param("$search", "\"quarterly report\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let query = [
            ("$top", "5".to_owned()),
            ("$filter", "isRead eq false".to_owned()),
            ("$search", "\"quarterly report\"".to_owned()),
        ];
        client.get("/me/messages", &query).await.expect("ok");
    }

    #[tokio::test]
    async fn patch_sends_json_body() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/me/messages/m1"))
            .and(body_json(json!({ "isRead": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .patch("/me/messages/m1", &json!({ "isRead": true }))
            .await
            .expect("ok");
        assert_eq!(result["id"], "m1");
    }

    #[tokio::test]
    async fn token_is_reused_across_requests() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/mailFolders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..3 {
            client.get("/me/mailFolders", &[]).await.expect("ok");
        }
    }

    #[tokio::test]
    async fn authentication_failure_propagates_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_scope"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get("/me/messages", &[]).await.expect_err("must fail");
        assert!(matches!(
            err,
            GraphError::Authentication { status: Some(400), ref body } if body == "invalid_scope"
        ));
    }

    #[tokio::test]
    async fn non_json_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get("/me/messages", &[]).await.expect_err("must fail");
        assert!(matches!(err, GraphError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn timed_out_request_is_remote_error_without_status() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": [] }))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config =
            ServerConfig::with_credentials(GraphCredentials::new("tenant-1", "client-1", "secret-1"));
        config.authority_url = server.uri();
        config.graph_base_url = format!("{}/v1.0", server.uri());
        config.http_timeout_ms = 100;
        let client = GraphClient::from_config(Arc::new(config)).expect("client");

        let err = client.get("/me/messages", &[]).await.expect_err("must time out");
        assert!(
            matches!(err, GraphError::RemoteApi { status: None, .. }),
            "unexpected error: {err:?}"
        );
    }
}
