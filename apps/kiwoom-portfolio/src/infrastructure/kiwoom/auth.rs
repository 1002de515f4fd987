//! Kiwoom Access Token
//!
//! The token endpoint issues a bearer token once per process. There is no
//! renewal: once the remote expiry passes, requests start failing with an
//! authentication status and the process must be restarted.
//!
//! # Token Flow
//!
//! 1. `POST {host}/oauth2/token` with
//!    `{"grant_type":"client_credentials","appkey":"...","secretkey":"..."}`
//! 2. Receive `{"token":"...","token_type":"bearer","expires_dt":"20250101083713",...}`
//! 3. Send `authorization: Bearer <token>` on every REST call and the token
//!    itself in the WebSocket `LOGIN` frame

use chrono::NaiveDateTime;

const EXPIRY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Bearer token issued by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: Option<NaiveDateTime>,
}

impl AccessToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Attach the server-reported expiry (`YYYYMMDDhhmmss`, exchange local time).
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_expiry(mut self, expires_dt: Option<&str>) -> Self {
        self.expires_at =
            expires_dt.and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), EXPIRY_FORMAT).ok());
        self
    }

    /// Raw token string, as sent in the `LOGIN` frame.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// `authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Server-reported expiry, if one was provided.
    #[must_use]
    pub const fn expires_at(&self) -> Option<NaiveDateTime> {
        self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn bearer_header_value() {
        let token = AccessToken::new("abc123");
        assert_eq!(token.bearer(), "Bearer abc123");
        assert_eq!(token.as_str(), "abc123");
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken::new("super-secret-token");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn parses_server_expiry() {
        let token = AccessToken::new("t").with_expiry(Some("20250107083713"));
        let expires = token.expires_at().unwrap();
        assert_eq!(expires.year(), 2025);
        assert_eq!(expires.day(), 7);
        assert_eq!(expires.hour(), 8);
    }

    #[test]
    fn ignores_malformed_expiry() {
        assert!(AccessToken::new("t").with_expiry(Some("tomorrow")).expires_at().is_none());
        assert!(AccessToken::new("t").with_expiry(None).expires_at().is_none());
    }
}
