//! Configuration for Graph credentials and server settings
//!
//! Credentials come from `TENANT_ID`, `CLIENT_ID` and `CLIENT_SECRET`. They
//! are optional at load time: a missing credential is logged as a warning at
//! startup and only becomes an error when a tool first needs a token. Server
//! settings use the `MAIL_GRAPH_<KEY>` prefix.

use std::env;
use std::env::VarError;
use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::{AppError, AppResult, GraphError, GraphResult};

/// Default identity provider authority
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
/// Versioned Microsoft Graph base URL
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// OAuth2 scope requesting every application permission granted to the app
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// App registration credentials for the client-credentials flow
///
/// Immutable after load. The secret is stored as a `SecretString` so it never
/// shows up in `Debug` output.
#[derive(Debug, Clone, Default)]
pub struct GraphCredentials {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
}

/// Borrowed view of a complete credential set
#[derive(Clone, Copy)]
pub struct ResolvedCredentials<'a> {
    pub tenant_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

impl fmt::Debug for ResolvedCredentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl GraphCredentials {
    /// Build credentials from explicit values, treating blanks as missing
    pub fn new(tenant_id: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            tenant_id: non_blank(tenant_id.to_owned()),
            client_id: non_blank(client_id.to_owned()),
            client_secret: non_blank(client_secret.to_owned())
                .map(|s| SecretString::new(s.into())),
        }
    }

    /// Names of the environment variables that are not set
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant_id.is_none() {
            missing.push("TENANT_ID");
        }
        if self.client_id.is_none() {
            missing.push("CLIENT_ID");
        }
        if self.client_secret.is_none() {
            missing.push("CLIENT_SECRET");
        }
        missing
    }

    /// Return all three credentials or a `Configuration` error
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Configuration` naming every missing variable.
    pub fn require(&self) -> GraphResult<ResolvedCredentials<'_>> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(ResolvedCredentials {
                tenant_id,
                client_id,
                client_secret: client_secret.expose_secret(),
            }),
            _ => Err(GraphError::Configuration {
                missing: self.missing(),
            }),
        }
    }
}

/// Server-wide configuration
///
/// Shared by the token manager, the dispatcher and the tool handlers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// App registration credentials
    pub credentials: GraphCredentials,
    /// Identity provider authority, without the tenant segment
    pub authority_url: String,
    /// Graph API base URL, including the version segment
    pub graph_base_url: String,
    /// Timeout applied to every outbound HTTP call, in milliseconds
    pub http_timeout_ms: u64,
    /// Mailbox owner to address instead of `/me`
    pub mailbox_user: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Missing credentials are not an error here; see
    /// [`GraphCredentials::require`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if an optional setting is present but malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// TENANT_ID=00000000-0000-0000-0000-000000000000
    /// CLIENT_ID=11111111-1111-1111-1111-111111111111
    /// CLIENT_SECRET=app-secret
    /// MAIL_GRAPH_MAILBOX_USER=shared@contoso.com
    /// MAIL_GRAPH_HTTP_TIMEOUT_MS=30000
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let credentials = GraphCredentials::new(
            &optional_env("TENANT_ID")?.unwrap_or_default(),
            &optional_env("CLIENT_ID")?.unwrap_or_default(),
            &optional_env("CLIENT_SECRET")?.unwrap_or_default(),
        );

        let http_timeout_ms = parse_u64_env("MAIL_GRAPH_HTTP_TIMEOUT_MS", 30_000)?;
        if http_timeout_ms == 0 {
            return Err(AppError::invalid(
                "MAIL_GRAPH_HTTP_TIMEOUT_MS must be greater than zero",
            ));
        }

        let mut config = Self::with_credentials(credentials);
        config.authority_url = url_env("MAIL_GRAPH_AUTHORITY_URL", DEFAULT_AUTHORITY_URL)?;
        config.graph_base_url = url_env("MAIL_GRAPH_BASE_URL", DEFAULT_GRAPH_BASE_URL)?;
        config.http_timeout_ms = http_timeout_ms;
        config.mailbox_user = optional_env("MAIL_GRAPH_MAILBOX_USER")?;
        Ok(config)
    }

    /// Configuration with default endpoints and the given credentials
    pub fn with_credentials(credentials: GraphCredentials) -> Self {
        Self {
            credentials,
            authority_url: DEFAULT_AUTHORITY_URL.to_owned(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_owned(),
            http_timeout_ms: 30_000,
            mailbox_user: None,
        }
    }

    /// Per-call HTTP timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Token endpoint for the configured tenant
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url,
            urlencoding::encode(tenant_id)
        )
    }

    /// Root path for mailbox resources (`/me` or `/users/{user}`)
    pub fn mailbox_root(&self) -> String {
        match &self.mailbox_user {
            Some(user) => format!("/users/{}", urlencoding::encode(user)),
            None => "/me".to_owned(),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_owned())
    }
}

/// Read an optional environment variable; blank counts as unset
fn optional_env(key: &str) -> AppResult<Option<String>> {
    match env::var(key) {
        Ok(v) => Ok(non_blank(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Read a base URL, stripping trailing slashes
///
/// # Errors
///
/// Returns `InvalidInput` if the value is not an http(s) URL.
fn url_env(key: &str, default: &str) -> AppResult<String> {
    let value = optional_env(key)?.unwrap_or_else(|| default.to_owned());
    parse_base_url(&value).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "invalid URL environment variable {key}: '{value}'"
        ))
    })
}

fn parse_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))?;
    if rest.is_empty() || rest.chars().any(|ch| ch.is_whitespace()) {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Parse a `u64` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u64`.
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}
