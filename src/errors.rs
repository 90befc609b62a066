//! Error model for the Graph core and the MCP tool layer
//!
//! [`GraphError`] is what the token manager and request dispatcher return.
//! Each failure kind is its own variant so callers can branch on it without
//! matching message text. [`AppError`] wraps it for the tool handlers and adds
//! parameter validation failures.

use thiserror::Error;

/// Failure produced by the token manager or the Graph request dispatcher
///
/// `status` is `None` when the call never produced an HTTP response
/// (connection failure, timeout, body read failure).
#[derive(Debug, Error)]
pub enum GraphError {
    /// One or more required credentials are not configured
    #[error("missing required credentials: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },
    /// Token exchange was rejected or failed in transit
    #[error("authentication failed ({}): {body}", status_label(.status))]
    Authentication { status: Option<u16>, body: String },
    /// HTTP method outside GET/POST/PATCH/DELETE
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    /// Graph rejected the request or the request failed in transit
    ///
    /// `body` is the raw response text, kept verbatim for display.
    #[error("Graph API error {}: {body}", status_label(.status))]
    RemoteApi { status: Option<u16>, body: String },
    /// Successful status but a body that could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::RemoteApi { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "transport".to_owned(),
    }
}

/// Core result alias
pub type GraphResult<T> = Result<T, GraphError>;

/// Tool-layer error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid tool parameter (missing required value, bad number, bad address)
    #[error("{0}")]
    InvalidInput(String),
    /// Failure reported by the Graph core
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Type alias for fallible tool-layer return values
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::{AppError, GraphError};

    #[test]
    fn remote_api_display_keeps_body_verbatim() {
        let body = r#"{"error":{"message":"Access denied"}}"#;
        let err = GraphError::RemoteApi {
            status: Some(403),
            body: body.to_owned(),
        };
        assert_eq!(err.to_string(), format!("Graph API error 403: {body}"));
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn transport_failures_have_no_status() {
        let err = GraphError::Authentication {
            status: None,
            body: "operation timed out".to_owned(),
        };
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("(transport)"));
    }

    #[test]
    fn configuration_error_lists_every_missing_variable() {
        let err = GraphError::Configuration {
            missing: vec!["TENANT_ID", "CLIENT_SECRET"],
        };
        assert_eq!(
            err.to_string(),
            "missing required credentials: TENANT_ID, CLIENT_SECRET"
        );
    }

    #[test]
    fn app_error_is_transparent_over_graph_error() {
        let err: AppError = GraphError::UnsupportedMethod("TRACE".to_owned()).into();
        assert_eq!(err.to_string(), "unsupported method: TRACE");
    }
}
