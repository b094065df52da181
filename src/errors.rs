//! Error taxonomy for the sign-in flow
//!
//! None of these escape the protocol boundary as-is: configuration and SDK
//! errors end in a log line, exchange and session errors are folded into a
//! [`FailureReason`] by the flow.

use crate::models::FailureReason;
use thiserror::Error;

/// The identity provider script could not be fetched
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to load identity SDK from {src}: {reason}")]
pub struct SdkLoadError {
    pub src: String,
    pub reason: String,
}

/// Missing or placeholder application credentials
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Google client id is not configured")]
    MissingClientId,
    #[error("Google client id is still the placeholder value '{0}'")]
    PlaceholderClientId(String),
    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),
}

/// Network failure or non-2xx answer from the authentication backend
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("another exchange is already in flight")]
    InFlight,
    #[error(transparent)]
    Malformed(#[from] MalformedSessionError),
}

impl ExchangeError {
    /// Map to the redirect reason, given the reason the endpoint uses for rejections
    #[must_use]
    pub fn failure_reason(&self, rejected: FailureReason) -> FailureReason {
        match self {
            Self::Network { .. } => FailureReason::NetworkError,
            Self::Status { .. } => rejected,
            Self::InFlight => FailureReason::RequestInProgress,
            Self::Malformed(_) => FailureReason::InvalidUserData,
        }
    }
}

/// A response body or cookie lacked the fields of an established session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedSessionError {
    #[error("session data is missing")]
    Missing,
    #[error("session data is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("session data is incomplete: {0}")]
    Incomplete(String),
    #[error("backend reported success=false")]
    Unsuccessful,
}

impl MalformedSessionError {
    /// Redirect reason for a failed session read
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Missing => FailureReason::MissingUserInfo,
            _ => FailureReason::InvalidUserData,
        }
    }
}

/// The persistent client storage file could not be read or written
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not a JSON object: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_uses_endpoint_reason() {
        let err = ExchangeError::Status {
            endpoint: "/api/v1/auth/login".to_string(),
            status: 401,
        };
        assert_eq!(
            err.failure_reason(FailureReason::InvalidCredentials),
            FailureReason::InvalidCredentials
        );
        assert_eq!(
            err.failure_reason(FailureReason::OauthFailed),
            FailureReason::OauthFailed
        );
    }

    #[test]
    fn test_malformed_errors_map_to_redirect_reasons() {
        assert_eq!(
            MalformedSessionError::Missing.failure_reason(),
            FailureReason::MissingUserInfo
        );
        assert_eq!(
            MalformedSessionError::InvalidJson("eof".into()).failure_reason(),
            FailureReason::InvalidUserData
        );
        let wrapped = ExchangeError::from(MalformedSessionError::Unsuccessful);
        assert_eq!(
            wrapped.failure_reason(FailureReason::OauthFailed),
            FailureReason::InvalidUserData
        );
    }
}
