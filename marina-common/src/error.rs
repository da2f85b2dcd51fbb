//! Error types for the Marina assistant services.

use thiserror::Error;

/// Result type alias using the Marina error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the relay bot and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failure against an upstream API
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network, timeout, or non-success HTTP status
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Upstream answered but the body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify a non-success HTTP status from an upstream API.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth(body),
            429 => Self::RateLimited(body),
            _ => Self::Transport(format!("status {status}: {body}")),
        }
    }

    /// Check if this is an authentication error, looking through context wrappers.
    pub const fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::WithContext { source, .. } => source.is_auth(),
            _ => false,
        }
    }

    /// Check if this is a rate limit error, looking through context wrappers.
    pub const fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::WithContext { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(Error::from_status(401, "bad key".into()).is_auth());
        assert!(Error::from_status(403, "forbidden".into()).is_auth());
        assert!(Error::from_status(429, "slow down".into()).is_rate_limited());
        assert!(matches!(
            Error::from_status(500, "boom".into()),
            Error::Transport(_)
        ));
        assert!(matches!(
            Error::from_status(404, "gone".into()),
            Error::Transport(_)
        ));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::Transport("connection refused".into());
        let with_ctx = err.with_context("calling backend");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert_eq!(
            with_ctx.to_string(),
            "calling backend: Transport failure: connection refused"
        );
    }

    #[test]
    fn test_predicates_look_through_context() {
        let err = Error::Auth("invalid x-api-key".into()).with_context("connectivity check");
        assert!(err.is_auth());
        assert!(!err.is_rate_limited());

        let err = Error::RateLimited("429".into())
            .with_context("first")
            .with_context("second");
        assert!(err.is_rate_limited());
        assert!(!err.is_auth());
    }
}
