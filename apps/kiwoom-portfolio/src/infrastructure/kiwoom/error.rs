//! Kiwoom REST error types.

use thiserror::Error;

use super::normalize::NormalizeError;
use crate::application::ports::AccountError;

/// Errors from the Kiwoom REST client.
#[derive(Debug, Error, Clone)]
pub enum KiwoomError {
    /// Token endpoint rejected the credentials or returned no token.
    #[error("Authentication failed ({status}): {body}")]
    Authentication {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A transaction request returned a non-success status.
    #[error("Request {api_id} failed ({status}): {body}")]
    Request {
        /// Transaction identifier.
        api_id: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Transport failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// Response body was not valid JSON.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Expected field absent from the response payload.
    #[error("Missing field `{field}` in {api_id} response")]
    MissingField {
        /// Transaction identifier.
        api_id: String,
        /// Field name.
        field: String,
    },

    /// Numeric field could not be parsed.
    #[error("Invalid number in field `{field}`: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: String,
        /// Raw value.
        value: String,
    },

    /// Credentials or base URL unusable.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Payload could not be reshaped.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl KiwoomError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<KiwoomError> for AccountError {
    fn from(err: KiwoomError) -> Self {
        match err {
            KiwoomError::Authentication { .. } | KiwoomError::Request { .. } => Self::Rejected {
                message: err.to_string(),
            },
            KiwoomError::Network(message) => Self::Unavailable { message },
            KiwoomError::JsonParse(_)
            | KiwoomError::MissingField { .. }
            | KiwoomError::InvalidNumber { .. }
            | KiwoomError::InvalidConfig(_)
            | KiwoomError::Normalize(_) => Self::Malformed {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_http_failures() {
        let err = KiwoomError::Request {
            api_id: "kt00018".to_string(),
            status: 500,
            body: "{\"return_msg\":\"fail\"}".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("kt00018"));
        assert_eq!(KiwoomError::Network("reset".to_string()).status(), None);
    }

    #[test]
    fn request_failure_maps_to_rejected() {
        let err = KiwoomError::Request {
            api_id: "kt00018".to_string(),
            status: 401,
            body: String::new(),
        };
        assert!(matches!(AccountError::from(err), AccountError::Rejected { .. }));
    }

    #[test]
    fn network_failure_maps_to_unavailable() {
        let err = KiwoomError::Network("connection refused".to_string());
        assert!(matches!(
            AccountError::from(err),
            AccountError::Unavailable { .. }
        ));
    }

    #[test]
    fn parse_failure_maps_to_malformed() {
        let err = KiwoomError::MissingField {
            api_id: "kt00018".to_string(),
            field: "tot_evlt_amt".to_string(),
        };
        assert!(matches!(AccountError::from(err), AccountError::Malformed { .. }));
    }
}
