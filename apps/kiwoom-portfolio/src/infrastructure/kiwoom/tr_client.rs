//! Transaction Client
//!
//! High-level operations over a logged-in session. Each operation issues the
//! transaction through [`KiwoomHttpClient`] and reshapes the payload with the
//! transaction's label table.

use async_trait::async_trait;
use serde_json::Value;

use super::api_types::{
    AccountBalanceRequest, AccountBalanceResponse, DailyPriceRequest, IntradayQuoteRequest,
    StockListRequest, TradeValueRankingRequest,
};
use super::auth::AccessToken;
use super::error::KiwoomError;
use super::http_client::{Continuation, KiwoomHttpClient};
use super::normalize::{self, LabeledRecord, NestedRecord, Table};
use super::transactions::{PayloadShape, TransactionId};
use crate::application::ports::{AccountError, AccountPort};
use crate::domain::holdings::AccountBalance;
use crate::infrastructure::config::{Credentials, RestSettings};

/// Normalized payload of any transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Array payload.
    Table(Table),
    /// Summary plus sub-records.
    Nested(NestedRecord),
    /// Single record.
    Flat(LabeledRecord),
}

/// Reshape a payload according to the transaction's shape and labels.
///
/// # Errors
///
/// Returns `KiwoomError::Normalize` if the payload does not have the
/// expected shape.
pub fn normalize_payload(
    transaction: TransactionId,
    payload: &Value,
) -> Result<Normalized, KiwoomError> {
    let labels = transaction.labels();
    Ok(match transaction.shape() {
        PayloadShape::Table { key, rules } => {
            Normalized::Table(normalize::to_table(payload, key, labels, rules)?)
        }
        PayloadShape::Nested {
            list_key,
            list_label,
            item_labels,
        } => Normalized::Nested(normalize::to_nested(
            payload,
            labels,
            list_key,
            list_label,
            item_labels,
        )?),
        PayloadShape::Flat => {
            let object = payload.as_object().ok_or_else(|| {
                normalize::NormalizeError::NotAnObject(transaction.api_id().to_string())
            })?;
            Normalized::Flat(normalize::to_labeled(object, labels))
        }
    })
}

fn expect_table(transaction: TransactionId, normalized: Normalized) -> Result<Table, KiwoomError> {
    match normalized {
        Normalized::Table(table) => Ok(table),
        _ => Err(KiwoomError::InvalidConfig(format!(
            "{transaction} is not a table transaction"
        ))),
    }
}

/// Account balance in typed and labeled form.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    /// Typed balance for valuation.
    pub balance: AccountBalance,
    /// Labeled summary and holdings.
    pub record: NestedRecord,
}

/// Client for Kiwoom transactions under one access token.
#[derive(Debug, Clone)]
pub struct TrClient {
    http: KiwoomHttpClient,
    token: AccessToken,
    settings: RestSettings,
}

impl TrClient {
    /// Authenticate and build a client.
    ///
    /// # Errors
    ///
    /// Returns `KiwoomError::Authentication` if the token request fails.
    pub async fn login(
        http: KiwoomHttpClient,
        credentials: &Credentials,
        settings: RestSettings,
    ) -> Result<Self, KiwoomError> {
        let token = http.authenticate(credentials).await?;
        Ok(Self::with_token(http, token, settings))
    }

    /// Build a client around an existing token.
    #[must_use]
    pub const fn with_token(
        http: KiwoomHttpClient,
        token: AccessToken,
        settings: RestSettings,
    ) -> Self {
        Self {
            http,
            token,
            settings,
        }
    }

    /// Session token.
    #[must_use]
    pub const fn token(&self) -> &AccessToken {
        &self.token
    }

    /// REST settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &RestSettings {
        &self.settings
    }

    /// `ka10099`: listed stocks of one market, all pages up to the limit.
    ///
    /// # Errors
    ///
    /// Propagates request and normalization errors.
    pub async fn stock_list(&self, market: &str) -> Result<Table, KiwoomError> {
        self.paged_table(
            TransactionId::StockList,
            &StockListRequest::market(market),
            self.settings.max_pages,
        )
        .await
    }

    /// `ka10086`: one page of daily prices ending at `date` (`YYYYMMDD`).
    ///
    /// The trailing summary row is dropped and OHLC values are absolute
    /// integers. Returns the cursor for the next (older) page.
    ///
    /// # Errors
    ///
    /// Propagates request and normalization errors.
    pub async fn daily_prices(
        &self,
        code: &str,
        date: &str,
        continuation: &Continuation,
    ) -> Result<(Table, Continuation), KiwoomError> {
        let transaction = TransactionId::DailyPrices;
        let page = self
            .http
            .fetch_page(
                transaction,
                &self.token,
                &DailyPriceRequest::new(code, date),
                continuation,
            )
            .await?;
        let table = expect_table(transaction, normalize_payload(transaction, &page.payload)?)?;
        Ok((table, page.continuation))
    }

    /// `kt00018`: account evaluation balance on the configured exchange.
    ///
    /// # Errors
    ///
    /// Propagates request, parse, and normalization errors.
    pub async fn account_report(&self) -> Result<AccountReport, KiwoomError> {
        let transaction = TransactionId::AccountBalance;
        let request = AccountBalanceRequest::aggregated(self.settings.exchange.clone());
        let page = self
            .http
            .fetch_page(transaction, &self.token, &request, &Continuation::initial())
            .await?;

        let record = match normalize_payload(transaction, &page.payload)? {
            Normalized::Nested(record) => record,
            _ => NestedRecord::default(),
        };
        let raw: AccountBalanceResponse = serde_json::from_value(page.payload)
            .map_err(|e| KiwoomError::JsonParse(e.to_string()))?;
        let balance = AccountBalance::try_from(raw)?;

        crate::infrastructure::metrics::set_holdings(balance.holdings.len());
        Ok(AccountReport { balance, record })
    }

    /// `ka10032`: trade value ranking over up to `pages` pages.
    ///
    /// # Errors
    ///
    /// Propagates request and normalization errors.
    pub async fn trade_value_ranking(
        &self,
        request: &TradeValueRankingRequest,
        pages: u32,
    ) -> Result<Table, KiwoomError> {
        self.paged_table(TransactionId::TradeValueRanking, request, pages)
            .await
    }

    /// `ka10006`: date and OHLC of one stock.
    ///
    /// # Errors
    ///
    /// Propagates request and normalization errors.
    pub async fn intraday_quote(&self, code: &str) -> Result<LabeledRecord, KiwoomError> {
        let transaction = TransactionId::IntradayQuote;
        let request = IntradayQuoteRequest {
            stk_cd: code.to_string(),
        };
        let page = self
            .http
            .fetch_page(transaction, &self.token, &request, &Continuation::initial())
            .await?;
        match normalize_payload(transaction, &page.payload)? {
            Normalized::Flat(record) => Ok(record),
            _ => Ok(LabeledRecord::default()),
        }
    }

    async fn paged_table<B>(
        &self,
        transaction: TransactionId,
        body: &B,
        pages: u32,
    ) -> Result<Table, KiwoomError>
    where
        B: serde::Serialize + Sync,
    {
        let fetched = self
            .http
            .fetch_all_paced(transaction, &self.token, body, pages, self.settings.page_delay)
            .await?;

        let mut table = Table::default();
        for page in fetched {
            let next = expect_table(transaction, normalize_payload(transaction, &page.payload)?)?;
            table.append(next);
        }

        tracing::debug!(api_id = transaction.api_id(), rows = table.len(), "Table assembled");
        Ok(table)
    }
}

#[async_trait]
impl AccountPort for TrClient {
    async fn account_balance(&self) -> Result<AccountBalance, AccountError> {
        self.account_report()
            .await
            .map(|report| report.balance)
            .map_err(AccountError::from)
    }
}
