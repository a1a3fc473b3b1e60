// =============================================================================
// Broker Login Callback — Axum extractor for the one-time request token
// =============================================================================
//
// The broker redirects back to `/callback?request_token=...&status=success`.
//
// Usage as an Axum extractor:
//
//   async fn handler(token: Result<RequestToken, CallbackRejection>, ...) { ... }
//
// If the token is missing, empty, or the broker reports a non-success status,
// extraction fails with a rejection that renders as a bare JSON
// `{"error": ...}` body. `/callback` takes the `Result` form so it can reset
// the login state before answering.
// =============================================================================

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

/// Query parameters the broker appends to the redirect URL.
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    request_token: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Request token extracted from a successful broker redirect.
pub struct RequestToken(pub String);

/// Rejection returned when the callback carries no usable token.
pub struct CallbackRejection {
    message: String,
}

impl CallbackRejection {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for CallbackRejection {
    fn into_response(self) -> Response {
        axum::Json(serde_json::json!({ "error": self.message })).into_response()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestToken
where
    S: Send + Sync,
{
    type Rejection = CallbackRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<CallbackQuery>::try_from_uri(&parts.uri).map_err(|e| {
            warn!(error = %e, "unparseable callback query");
            CallbackRejection::new("Malformed callback query")
        })?;

        if let Some(status) = query.status.as_deref() {
            if status != "success" {
                warn!(status, "broker reported unsuccessful login");
                return Err(CallbackRejection::new(format!(
                    "Broker login not completed (status: {status})"
                )));
            }
        }

        match query.request_token.map(|t| t.trim().to_string()) {
            Some(token) if !token.is_empty() => Ok(RequestToken(token)),
            _ => {
                warn!("callback without request_token");
                Err(CallbackRejection::new("Missing request_token in callback"))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> Result<String, String> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        match RequestToken::from_request_parts(&mut parts, &()).await {
            Ok(RequestToken(token)) => Ok(token),
            Err(rejection) => Err(rejection.message),
        }
    }

    #[tokio::test]
    async fn extracts_token() {
        assert_eq!(
            extract("/callback?request_token=abc123&action=login&status=success").await,
            Ok("abc123".to_string())
        );
        assert_eq!(extract("/callback?request_token=abc123").await, Ok("abc123".into()));
    }

    #[tokio::test]
    async fn missing_or_blank_token_is_rejected() {
        assert_eq!(
            extract("/callback").await,
            Err("Missing request_token in callback".to_string())
        );
        assert_eq!(
            extract("/callback?request_token=").await,
            Err("Missing request_token in callback".to_string())
        );
    }

    #[tokio::test]
    async fn unsuccessful_status_is_rejected() {
        let err = extract("/callback?request_token=abc123&status=cancelled")
            .await
            .unwrap_err();
        assert!(err.contains("cancelled"));
    }
}
