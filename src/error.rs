//! Error taxonomy for the data-access layer.
//!
//! Failures are classified once, at the network-call boundary, into an
//! [`ErrorKind`]. Everything downstream (retry decisions, exhaustion tracking,
//! queueing policy, UI routing) matches on the kind instead of inspecting
//! messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform error code emitted when the client runs out of connection
/// resources (too many in-flight requests, socket exhaustion).
pub const RESOURCE_EXHAUSTION_SIGNATURE: &str = "ERR_INSUFFICIENT_RESOURCES";

/// Broad failure class used for retry behavior and user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreachable host, dropped connection or timeout.
    Network,
    /// Client-side resource exhaustion.
    Resource,
    /// 5xx-equivalent failure.
    Server,
    /// 4xx-equivalent failure, not retryable.
    Validation,
    /// 401/403-equivalent failure, not retryable.
    Auth,
    /// 404-equivalent failure, not retryable.
    NotFound,
    /// Denied by the health gate before any call was attempted.
    Offline,
}

impl ErrorKind {
    /// Only transient transport and server failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server)
    }

    /// Connectivity-class failures: these may be absorbed into fallback data.
    /// Validation, auth and not-found failures always reach the caller.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server | ErrorKind::Resource)
    }

    /// Stable lowercase label, used for log fields and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Resource => "resource",
            ErrorKind::Server => "server",
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure returned by fetch and submit collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{kind}:{code}: {message}")]
pub struct ApiError {
    /// Failure class.
    pub kind: ErrorKind,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP-equivalent status, when one was received.
    pub status: Option<u16>,
}

impl ApiError {
    /// Construct a new classified error.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Attach the status that produced this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, "network_error", message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, "server_error", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, "validation_error", message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, "auth_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "not_found", message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource, "resource_exhausted", message)
    }

    /// A call that did not settle before its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Network,
            "timeout",
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    /// Classify a transport-level failure message.
    ///
    /// The platform reports exhaustion only through its error text, so this is
    /// the single place where the signature is matched.
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(RESOURCE_EXHAUSTION_SIGNATURE) {
            Self::resource(message)
        } else {
            Self::network(message)
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = classify_http_status(status);
        let code = match kind {
            ErrorKind::Auth => "auth_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Server => "server_error",
            _ => "network_error",
        };
        Self::new(kind, code, message).with_status(status)
    }
}

/// Map HTTP status codes to error kinds.
pub fn classify_http_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::Network,
        400..=499 => ErrorKind::Validation,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Network,
    }
}

/// Errors surfaced by query and mutation execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The health gate denied the call and nothing could stand in for it.
    #[error("network unavailable for '{domain}': {reason}")]
    NetworkUnavailable { domain: String, reason: String },

    /// Calls are suspended after a resource-exhaustion failure.
    #[error("api calls suspended for '{domain}' due to resource limitations")]
    ResourceExhausted { domain: String },

    /// The collaborator call itself failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn network_unavailable(domain: &str, reason: impl Into<String>) -> Self {
        Error::NetworkUnavailable {
            domain: domain.to_string(),
            reason: reason.into(),
        }
    }

    pub fn resource_exhausted(domain: &str) -> Self {
        Error::ResourceExhausted {
            domain: domain.to_string(),
        }
    }

    /// Machine-checkable class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NetworkUnavailable { .. } => ErrorKind::Offline,
            Error::ResourceExhausted { .. } => ErrorKind::Resource,
            Error::Api(err) => err.kind,
        }
    }

    /// Stable code, suitable for UI lookup tables.
    pub fn code(&self) -> &str {
        match self {
            Error::NetworkUnavailable { .. } => "OFFLINE_ERROR",
            Error::ResourceExhausted { .. } => "RESOURCE_ERROR",
            Error::Api(err) => &err.code,
        }
    }

    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            Error::NetworkUnavailable { .. } => {
                "This action cannot be performed while offline".to_string()
            }
            Error::ResourceExhausted { .. } => {
                "API calls are temporarily disabled due to resource limitations".to_string()
            }
            Error::Api(err) => err.message.clone(),
        }
    }

    /// Exhaustion is surfaced without any retry suggestion.
    pub fn suggests_retry(&self) -> bool {
        match self {
            Error::NetworkUnavailable { .. } => true,
            Error::ResourceExhausted { .. } => false,
            Error::Api(err) => err.kind.is_retryable(),
        }
    }
}

/// Result type for the data-access layer.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_kinds() {
        assert_eq!(classify_http_status(401), ErrorKind::Auth);
        assert_eq!(classify_http_status(403), ErrorKind::Auth);
        assert_eq!(classify_http_status(404), ErrorKind::NotFound);
        assert_eq!(classify_http_status(422), ErrorKind::Validation);
        assert_eq!(classify_http_status(503), ErrorKind::Server);
        assert_eq!(classify_http_status(408), ErrorKind::Network);
    }

    #[test]
    fn transport_signature_becomes_resource_kind() {
        let err = ApiError::from_transport("net::ERR_INSUFFICIENT_RESOURCES while fetching");
        assert_eq!(err.kind, ErrorKind::Resource);

        let err = ApiError::from_transport("connection refused");
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[test]
    fn only_network_and_server_are_retryable() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Resource.is_retryable());
    }

    #[test]
    fn surfaced_errors_carry_kind_and_code() {
        let err = Error::network_unavailable("cart", "offline");
        assert_eq!(err.kind(), ErrorKind::Offline);
        assert_eq!(err.code(), "OFFLINE_ERROR");

        let err = Error::resource_exhausted("cart");
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!err.suggests_retry());

        let err: Error = ApiError::from_status(500, "boom").into();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.to_string(), "server:server_error: boom");
    }

    #[test]
    fn timeout_is_network_class() {
        let err = ApiError::timeout(Duration::from_secs(2));
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.code, "timeout");
        assert!(err.message.contains("2000ms"));
    }
}
