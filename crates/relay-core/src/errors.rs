use std::time::Duration;

/// Typed error hierarchy for model provider calls. The display string is
/// what the client sees in its `error` frame.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("content blocked: {0}")]
    ContentBlocked(String),
    #[error("rate limited: {message}{}", retry_hint(.retry_after))]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl GatewayError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ContentBlocked(_) => "content_blocked",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 | 404 => Self::InvalidRequest(body),
            429 => Self::RateLimited {
                message: body,
                retry_after: None,
            },
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(after) => format!(" (retry after {}s)", after.as_secs()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            GatewayError::from_status(401, "unauthorized".into()),
            GatewayError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            GatewayError::from_status(403, "forbidden".into()),
            GatewayError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            GatewayError::from_status(400, "bad request".into()),
            GatewayError::InvalidRequest(_)
        ));
        assert!(matches!(
            GatewayError::from_status(404, "no such model".into()),
            GatewayError::InvalidRequest(_)
        ));
        assert!(matches!(
            GatewayError::from_status(429, "quota".into()),
            GatewayError::RateLimited { retry_after: None, .. }
        ));
        assert!(matches!(
            GatewayError::from_status(503, "unavailable".into()),
            GatewayError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            GatewayError::from_status(418, "teapot".into()),
            GatewayError::InvalidRequest(msg) if msg == "unexpected status 418: teapot"
        ));
    }

    #[test]
    fn display_carries_provider_message() {
        let err = GatewayError::from_status(429, "Resource has been exhausted".into());
        assert_eq!(err.to_string(), "rate limited: Resource has been exhausted");

        let err = GatewayError::RateLimited {
            message: "Resource has been exhausted".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(
            err.to_string(),
            "rate limited: Resource has been exhausted (retry after 30s)"
        );

        let err = GatewayError::AuthenticationFailed("API key not valid".into());
        assert_eq!(err.to_string(), "authentication failed: API key not valid");
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(GatewayError::ContentBlocked("x".into()).error_kind(), "content_blocked");
        assert_eq!(
            GatewayError::StreamInterrupted("eof".into()).error_kind(),
            "stream_interrupted"
        );
        assert_eq!(
            GatewayError::ServerError { status: 500, body: String::new() }.error_kind(),
            "server_error"
        );
    }
}
