//! Client-credentials token manager
//!
//! Holds the single bearer token used for every Graph call made by this
//! process and refreshes it through the OAuth2 client-credentials flow when
//! it is missing or expired. The cache lock is held across a refresh, so
//! callers that race on an expired token wait for one exchange instead of
//! each issuing their own.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{GRAPH_DEFAULT_SCOPE, ServerConfig};
use crate::errors::{GraphError, GraphResult};

/// Lifetime assumed when the token response omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
/// Subtracted from the advertised lifetime so a token never expires mid-request
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Bearer token plus the instant after which it must not be used
#[derive(Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// A token is usable only while `expires_at` is strictly in the future
    fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Owns the process-wide token cache
///
/// Construct once and share via `Arc`; there is no invalidation operation.
#[derive(Debug)]
pub struct TokenManager {
    config: Arc<ServerConfig>,
    http_client: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(config: Arc<ServerConfig>, http_client: Client) -> Self {
        Self {
            config,
            http_client,
            cache: Mutex::new(None),
        }
    }

    /// Return a bearer token that is valid at the moment of the call
    ///
    /// Returns the cached token without any network traffic while it is
    /// still valid; otherwise performs one client-credentials exchange and
    /// replaces the cache with the result.
    ///
    /// # Errors
    ///
    /// - `Configuration` if any credential is missing (checked on every call)
    /// - `Authentication` if the exchange fails, times out or is rejected
    /// - `InvalidResponse` if a successful response has no usable token
    pub async fn access_token(&self) -> GraphResult<String> {
        let credentials = self.config.credentials.require()?;

        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref()
            && token.is_usable_at(Utc::now())
        {
            return Ok(token.value.clone());
        }

        debug!("access token missing or expired; requesting a new one");
        let token_url = self.config.token_url(credentials.tenant_id);
        let form = [
            ("client_id", credentials.client_id),
            ("client_secret", credentials.client_secret),
            ("scope", GRAPH_DEFAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let exchanged_at = Utc::now();
        let response = self
            .http_client
            .post(&token_url)
            .timeout(self.config.http_timeout())
            .form(&form)
            .send()
            .await
            .map_err(|e| GraphError::Authentication {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GraphError::Authentication {
                status: Some(status.as_u16()),
                body: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(GraphError::Authentication {
                status: Some(status.as_u16()),
                body,
            });
        }

        let token = parse_token_response(&body, exchanged_at)?;
        info!(expires_at = %token.expires_at, "cached new Graph access token");
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }
}

/// Build a cache entry from a successful token endpoint body
fn parse_token_response(body: &str, exchanged_at: DateTime<Utc>) -> GraphResult<CachedToken> {
    let payload: TokenResponse = serde_json::from_str(body)
        .map_err(|e| GraphError::InvalidResponse(format!("token response is not JSON: {e}")))?;
    let value = payload
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GraphError::InvalidResponse("token response has no access_token".to_owned()))?;
    let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_at = expires_in
        .checked_sub(EXPIRY_MARGIN_SECS)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| exchanged_at.checked_add_signed(lifetime))
        .ok_or_else(|| GraphError::InvalidResponse("token expires_in out of range".to_owned()))?;
    Ok(CachedToken { value, expires_at })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{CachedToken, TokenManager, parse_token_response};
    use crate::config::{GraphCredentials, ServerConfig};
    use crate::errors::GraphError;

    const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

    fn manager_for(server: &MockServer, credentials: GraphCredentials) -> TokenManager {
        let mut config = ServerConfig::with_credentials(credentials);
        config.authority_url = server.uri();
        TokenManager::new(Arc::new(config), reqwest::Client::new())
    }

    fn valid_credentials() -> GraphCredentials {
        GraphCredentials::new("tenant-1", "client-1", "secret-1")
    }

    #[tokio::test]
    async fn first_call_exchanges_credentials_and_caches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=secret-1"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-a",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, valid_credentials());
        let before = Utc::now();
        let token = manager.access_token().await.expect("token");
        let after = Utc::now();

        assert_eq!(token, "token-a");
        let cached = manager.cache.lock().await.clone().expect("cached token");
        assert!(cached.expires_at >= before + Duration::seconds(3540));
        assert!(cached.expires_at <= after + Duration::seconds(3540));
    }

    #[tokio::test]
    async fn valid_cached_token_is_returned_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server, valid_credentials());
        *manager.cache.lock().await = Some(CachedToken {
            value: "cached".to_owned(),
            expires_at: Utc::now() + Duration::minutes(10),
        });

        assert_eq!(manager.access_token().await.expect("token"), "cached");
        assert_eq!(manager.access_token().await.expect("token"), "cached");
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "expires_in": 600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, valid_credentials());
        *manager.cache.lock().await = Some(CachedToken {
            value: "stale".to_owned(),
            expires_at: Utc::now() - Duration::seconds(1),
        });

        assert_eq!(manager.access_token().await.expect("token"), "fresh");
        assert_eq!(manager.access_token().await.expect("token"), "fresh");
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server, GraphCredentials::new("tenant-1", "client-1", ""));
        let err = manager.access_token().await.expect_err("must fail");
        assert!(matches!(
            err,
            GraphError::Configuration { ref missing } if missing == &vec!["CLIENT_SECRET"]
        ));
    }

    #[tokio::test]
    async fn rejected_exchange_reports_status_and_body_and_caches_nothing() {
        let server = MockServer::start().await;
        let body = r#"{"error":"invalid_client","error_description":"bad secret"}"#;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, valid_credentials());
        match manager.access_token().await {
            Err(GraphError::Authentication { status, body: got }) => {
                assert_eq!(status, Some(401));
                assert_eq!(got, body);
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
        assert!(manager.cache.lock().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "shared", "expires_in": 3600 }))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manager = Arc::new(manager_for(&server, valid_credentials()));
        let calls = (0..8).map(|_| {
            let manager = Arc::clone(&manager);
            async move { manager.access_token().await }
        });
        let tokens = futures::future::join_all(calls).await;
        assert!(tokens.iter().all(|t| t.as_deref().ok() == Some("shared")));
    }

    #[test]
    fn missing_expires_in_defaults_to_one_hour() {
        let now = Utc::now();
        let token = parse_token_response(r#"{"access_token":"t"}"#, now).expect("token");
        assert_eq!(token.expires_at, now + Duration::seconds(3540));
    }

    #[test]
    fn out_of_range_expires_in_is_invalid() {
        for expires_in in [9_000_000_000_000_000_i64, i64::MAX, i64::MIN] {
            let body = format!(r#"{{"access_token":"t","expires_in":{expires_in}}}"#);
            let err = parse_token_response(&body, Utc::now()).expect_err("must fail");
            assert!(
                matches!(err, GraphError::InvalidResponse(ref msg) if msg == "token expires_in out of range")
            );
        }
    }

    #[tokio::test]
    async fn out_of_range_expiry_from_endpoint_caches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "t",
                "expires_in": 9_000_000_000_000_000_i64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server, valid_credentials());
        let err = manager.access_token().await.expect_err("must fail");
        assert!(matches!(err, GraphError::InvalidResponse(_)));
        assert!(manager.cache.lock().await.is_none());
    }

    #[tokio::test]
    async fn timed_out_exchange_is_authentication_failure_and_caches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "late", "expires_in": 3600 }))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = ServerConfig::with_credentials(valid_credentials());
        config.authority_url = server.uri();
        config.http_timeout_ms = 50;
        let manager = TokenManager::new(Arc::new(config), reqwest::Client::new());

        match manager.access_token().await {
            Err(GraphError::Authentication { status, .. }) => assert_eq!(status, None),
            other => panic!("expected authentication error, got {other:?}"),
        }
        assert!(manager.cache.lock().await.is_none());
    }

    #[test]
    fn response_without_access_token_is_invalid() {
        let err = parse_token_response(r#"{"expires_in":3600}"#, Utc::now()).expect_err("must fail");
        assert!(matches!(err, GraphError::InvalidResponse(_)));
    }

    #[test]
    fn debug_output_redacts_token_value() {
        let token = CachedToken {
            value: "eyJ0eXAi.secret".to_owned(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{token:?}").contains("secret"));
    }
}
