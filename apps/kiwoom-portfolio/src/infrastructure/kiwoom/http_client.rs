//! Kiwoom REST client with continuation-key pagination.
//!
//! Every transaction is a `POST` to `{host}/api/dostk/<resource>` carrying:
//!
//! - `authorization: Bearer <token>`
//! - `api-id: <transaction id>`
//! - `cont-yn: Y|N` and `next-key: <opaque key>` (continuation cursor)
//!
//! The server echoes `cont-yn`/`next-key` in the response headers. A
//! `cont-yn` of `Y` means another page is available under `next-key`.

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use super::api_types::{TokenRequest, TokenResponse};
use super::auth::AccessToken;
use super::error::KiwoomError;
use super::transactions::TransactionId;
use crate::infrastructure::config::Credentials;
use crate::infrastructure::metrics::{self, RequestOutcome};

const JSON_UTF8: &str = "application/json;charset=UTF-8";
const CONT_YN: &str = "cont-yn";
const NEXT_KEY: &str = "next-key";
const API_ID: &str = "api-id";

// =============================================================================
// Continuation
// =============================================================================

/// Continuation cursor returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuation {
    /// Whether another page is available.
    pub has_more: bool,
    /// Opaque key for the next page. Empty when absent.
    pub next_key: String,
}

impl Continuation {
    /// Cursor for a first request: `cont-yn: N`, empty `next-key`.
    #[must_use]
    pub fn initial() -> Self {
        Self::default()
    }

    /// Cursor continuing from `next_key`.
    #[must_use]
    pub fn resume(next_key: impl Into<String>) -> Self {
        Self {
            has_more: true,
            next_key: next_key.into(),
        }
    }

    /// `cont-yn` header value.
    #[must_use]
    pub const fn cont_yn(&self) -> &'static str {
        if self.has_more { "Y" } else { "N" }
    }

    /// Read the cursor from response headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            has_more: header(CONT_YN).eq_ignore_ascii_case("Y"),
            next_key: header(NEXT_KEY),
        }
    }
}

/// One response page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Parsed JSON body.
    pub payload: Value,
    /// Cursor for the next request.
    pub continuation: Continuation,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the Kiwoom REST API.
#[derive(Debug, Clone)]
pub struct KiwoomHttpClient {
    client: Client,
    base_url: String,
}

impl KiwoomHttpClient {
    /// Create a client for `base_url` (e.g. `https://mockapi.kiwoom.com`).
    ///
    /// # Errors
    ///
    /// Returns `KiwoomError::InvalidConfig` for an empty base URL and
    /// `KiwoomError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, KiwoomError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(KiwoomError::InvalidConfig("empty REST base URL".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KiwoomError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// REST base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange app credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `KiwoomError::Authentication` on a non-success status or a
    /// missing/empty token, `KiwoomError::Network` if no response arrives.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken, KiwoomError> {
        let url = format!("{}/oauth2/token", self.base_url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_UTF8)
            .json(&TokenRequest::client_credentials(
                credentials.app_key(),
                credentials.secret_key(),
            ))
            .send()
            .await
            .map_err(|e| {
                metrics::record_http_request("oauth2", RequestOutcome::NetworkError, started.elapsed());
                KiwoomError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KiwoomError::Network(e.to_string()))?;

        if !status.is_success() {
            metrics::record_http_request("oauth2", RequestOutcome::HttpError, started.elapsed());
            tracing::error!(status = status.as_u16(), "Token request rejected");
            return Err(KiwoomError::Authentication {
                status: status.as_u16(),
                body,
            });
        }
        metrics::record_http_request("oauth2", RequestOutcome::Success, started.elapsed());

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| KiwoomError::JsonParse(e.to_string()))?;

        match parsed.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                tracing::info!(expires_dt = ?parsed.expires_dt, "Access token obtained");
                Ok(AccessToken::new(token).with_expiry(parsed.expires_dt.as_deref()))
            }
            None => {
                tracing::error!(
                    return_code = ?parsed.return_code,
                    return_msg = ?parsed.return_msg,
                    "Token response carried no token"
                );
                Err(KiwoomError::Authentication {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Send one transaction request.
    ///
    /// # Errors
    ///
    /// Returns `KiwoomError::Request` with status and body on a non-success
    /// status, `KiwoomError::Network` or `KiwoomError::JsonParse` otherwise.
    pub async fn fetch_page<B>(
        &self,
        transaction: TransactionId,
        token: &AccessToken,
        body: &B,
        continuation: &Continuation,
    ) -> Result<Page, KiwoomError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let api_id = transaction.api_id();
        let url = format!("{}{}", self.base_url, transaction.path());
        let request_id = uuid::Uuid::new_v4();
        let started = Instant::now();

        tracing::debug!(
            %request_id,
            api_id,
            cont_yn = continuation.cont_yn(),
            next_key = %continuation.next_key,
            "Sending transaction request"
        );

        let response: Response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_UTF8)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .header(CONT_YN, continuation.cont_yn())
            .header(NEXT_KEY, continuation.next_key.as_str())
            .header(API_ID, api_id)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                metrics::record_http_request(api_id, RequestOutcome::NetworkError, started.elapsed());
                tracing::warn!(%request_id, api_id, error = %e, "Transaction request failed");
                KiwoomError::Network(e.to_string())
            })?;

        let status = response.status();
        let next = Continuation::from_headers(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| KiwoomError::Network(e.to_string()))?;

        if !status.is_success() {
            metrics::record_http_request(api_id, RequestOutcome::HttpError, started.elapsed());
            tracing::warn!(
                %request_id,
                api_id,
                status = status.as_u16(),
                body = %text,
                "Transaction request rejected"
            );
            return Err(KiwoomError::Request {
                api_id: api_id.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        metrics::record_http_request(api_id, RequestOutcome::Success, started.elapsed());
        metrics::record_page_fetched(api_id);

        let payload =
            serde_json::from_str(&text).map_err(|e| KiwoomError::JsonParse(e.to_string()))?;

        tracing::debug!(
            %request_id,
            api_id,
            has_more = next.has_more,
            elapsed_ms = started.elapsed().as_millis(),
            "Transaction page received"
        );

        Ok(Page {
            payload,
            continuation: next,
        })
    }

    /// Fetch up to `max_pages` pages back to back.
    ///
    /// # Errors
    ///
    /// Propagates the first `fetch_page` error.
    pub async fn fetch_all<B>(
        &self,
        transaction: TransactionId,
        token: &AccessToken,
        body: &B,
        max_pages: u32,
    ) -> Result<Vec<Page>, KiwoomError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.fetch_all_paced(transaction, token, body, max_pages, Duration::ZERO)
            .await
    }

    /// Fetch up to `max_pages` pages, sleeping `delay` between requests.
    ///
    /// Stops early when the server reports no further pages. Hitting the
    /// bound is not an error; the pages collected so far are returned.
    ///
    /// # Errors
    ///
    /// Propagates the first `fetch_page` error.
    pub async fn fetch_all_paced<B>(
        &self,
        transaction: TransactionId,
        token: &AccessToken,
        body: &B,
        max_pages: u32,
        delay: Duration,
    ) -> Result<Vec<Page>, KiwoomError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let mut pages: Vec<Page> = Vec::new();
        let mut cursor = Continuation::initial();

        while pages.len() < max_pages as usize {
            if !pages.is_empty() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let page = self.fetch_page(transaction, token, body, &cursor).await?;
            cursor = page.continuation.clone();
            pages.push(page);

            if !cursor.has_more {
                break;
            }
        }

        if cursor.has_more {
            tracing::info!(
                api_id = transaction.api_id(),
                pages = pages.len(),
                "Page limit reached with more data available"
            );
        }

        Ok(pages)
    }
}
