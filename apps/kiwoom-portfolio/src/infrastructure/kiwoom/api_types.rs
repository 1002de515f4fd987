//! Kiwoom REST request and response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::KiwoomError;
use crate::domain::holdings::{
    AccountBalance, AccountSummary, HoldingRecord, parse_kiwoom_number, parse_kiwoom_price,
};

// =============================================================================
// Token
// =============================================================================

/// Body of `POST /oauth2/token`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    /// Always `client_credentials`.
    pub grant_type: &'static str,
    /// App key.
    pub appkey: &'a str,
    /// Secret key.
    pub secretkey: &'a str,
}

impl<'a> TokenRequest<'a> {
    /// Client-credentials grant.
    #[must_use]
    pub const fn client_credentials(appkey: &'a str, secretkey: &'a str) -> Self {
        Self {
            grant_type: "client_credentials",
            appkey,
            secretkey,
        }
    }
}

/// Response of `POST /oauth2/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token. Absent when the server rejects the grant.
    #[serde(default)]
    pub token: Option<String>,
    /// Token type, normally `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Expiry as `YYYYMMDDhhmmss`.
    #[serde(default)]
    pub expires_dt: Option<String>,
    /// Server result code (0 = success).
    #[serde(default)]
    pub return_code: Option<i64>,
    /// Server result message.
    #[serde(default)]
    pub return_msg: Option<String>,
}

// =============================================================================
// Transaction Bodies
// =============================================================================

/// `ka10099` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockListRequest {
    /// Market: `0` KOSPI, `10` KOSDAQ, `3` ELW, `8` ETF, `50` KONEX.
    pub mrkt_tp: String,
}

impl StockListRequest {
    /// Request the listing of one market.
    #[must_use]
    pub fn market(mrkt_tp: impl Into<String>) -> Self {
        Self {
            mrkt_tp: mrkt_tp.into(),
        }
    }
}

/// `ka10086` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPriceRequest {
    /// Stock code.
    pub stk_cd: String,
    /// Query date `YYYYMMDD`; rows run backward from it.
    pub qry_dt: String,
    /// `0` quantities, `1` amounts (millions).
    pub indc_tp: String,
}

impl DailyPriceRequest {
    /// Daily prices for `stk_cd` up to `qry_dt`, in quantities.
    #[must_use]
    pub fn new(stk_cd: impl Into<String>, qry_dt: impl Into<String>) -> Self {
        Self {
            stk_cd: stk_cd.into(),
            qry_dt: qry_dt.into(),
            indc_tp: "0".to_string(),
        }
    }
}

/// `kt00018` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalanceRequest {
    /// `1` aggregated, `2` per lot.
    pub qry_tp: String,
    /// Domestic exchange: `KRX` or `NXT`.
    pub dmst_stex_tp: String,
}

impl AccountBalanceRequest {
    /// Aggregated balance on `exchange`.
    #[must_use]
    pub fn aggregated(exchange: impl Into<String>) -> Self {
        Self {
            qry_tp: "1".to_string(),
            dmst_stex_tp: exchange.into(),
        }
    }
}

/// `ka10032` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeValueRankingRequest {
    /// `000` all, `001` KOSPI, `101` KOSDAQ.
    pub mrkt_tp: String,
    /// `0` excludes managed stocks, `1` includes them.
    pub mang_stk_incls: String,
    /// `1` KRX, `2` NXT, `3` combined.
    pub stex_tp: String,
}

impl Default for TradeValueRankingRequest {
    fn default() -> Self {
        Self {
            mrkt_tp: "000".to_string(),
            mang_stk_incls: "0".to_string(),
            stex_tp: "3".to_string(),
        }
    }
}

/// `ka10006` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntradayQuoteRequest {
    /// Stock code, optionally suffixed with `_NX`/`_AL`.
    pub stk_cd: String,
}

// =============================================================================
// Account Balance Response
// =============================================================================

/// Raw `kt00018` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountBalanceResponse {
    #[serde(default)]
    tot_pur_amt: String,
    #[serde(default)]
    tot_evlt_amt: String,
    #[serde(default)]
    tot_evlt_pl: String,
    #[serde(default)]
    tot_prft_rt: String,
    #[serde(default)]
    prsm_dpst_aset_amt: String,
    #[serde(default)]
    tot_loan_amt: String,
    #[serde(default)]
    tot_crd_loan_amt: String,
    #[serde(default)]
    tot_crd_ls_amt: String,
    #[serde(default)]
    acnt_evlt_remn_indv_tot: Vec<AccountHoldingRow>,
}

/// Raw `kt00018` per-instrument row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountHoldingRow {
    #[serde(default)]
    stk_cd: String,
    #[serde(default)]
    stk_nm: String,
    #[serde(default)]
    rmnd_qty: String,
    #[serde(default)]
    trde_able_qty: String,
    #[serde(default)]
    pur_pric: String,
    #[serde(default)]
    cur_prc: String,
    #[serde(default)]
    pur_amt: String,
    #[serde(default)]
    evlt_amt: String,
    #[serde(default)]
    evltv_prft: String,
    #[serde(default)]
    prft_rt: String,
    #[serde(default)]
    poss_rt: String,
}

fn number(field: &str, raw: &str) -> Result<Decimal, KiwoomError> {
    parse_kiwoom_number(raw).map_err(|_| KiwoomError::InvalidNumber {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn price(field: &str, raw: &str) -> Result<Decimal, KiwoomError> {
    parse_kiwoom_price(raw).map_err(|_| KiwoomError::InvalidNumber {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

impl TryFrom<AccountHoldingRow> for HoldingRecord {
    type Error = KiwoomError;

    fn try_from(row: AccountHoldingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            quantity: number("rmnd_qty", &row.rmnd_qty)?,
            tradable_quantity: number("trde_able_qty", &row.trde_able_qty)?,
            purchase_price: price("pur_pric", &row.pur_pric)?,
            current_price: price("cur_prc", &row.cur_prc)?,
            purchase_amount: number("pur_amt", &row.pur_amt)?,
            evaluation_amount: number("evlt_amt", &row.evlt_amt)?,
            evaluation_profit: number("evltv_prft", &row.evltv_prft)?,
            profit_rate: number("prft_rt", &row.prft_rt)?,
            holding_ratio: number("poss_rt", &row.poss_rt)?,
            code: row.stk_cd.trim().to_string(),
            name: row.stk_nm.trim().to_string(),
        })
    }
}

impl TryFrom<AccountBalanceResponse> for AccountBalance {
    type Error = KiwoomError;

    fn try_from(resp: AccountBalanceResponse) -> Result<Self, Self::Error> {
        let summary = AccountSummary {
            total_purchase: number("tot_pur_amt", &resp.tot_pur_amt)?,
            total_evaluation: number("tot_evlt_amt", &resp.tot_evlt_amt)?,
            total_profit: number("tot_evlt_pl", &resp.tot_evlt_pl)?,
            total_profit_rate: number("tot_prft_rt", &resp.tot_prft_rt)?,
            estimated_deposit_assets: number("prsm_dpst_aset_amt", &resp.prsm_dpst_aset_amt)?,
            total_loan: number("tot_loan_amt", &resp.tot_loan_amt)?,
            total_credit_loan: number("tot_crd_loan_amt", &resp.tot_crd_loan_amt)?,
            total_credit_short: number("tot_crd_ls_amt", &resp.tot_crd_ls_amt)?,
        };

        let holdings = resp
            .acnt_evlt_remn_indv_tot
            .into_iter()
            .map(HoldingRecord::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Self { summary, holdings })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn token_request_body() {
        let body = serde_json::to_value(TokenRequest::client_credentials("key", "secret")).unwrap();
        assert_eq!(
            body,
            json!({"grant_type": "client_credentials", "appkey": "key", "secretkey": "secret"})
        );
    }

    #[test]
    fn token_response_tolerates_missing_token() {
        let resp: TokenResponse =
            serde_json::from_value(json!({"return_code": 3, "return_msg": "invalid appkey"}))
                .unwrap();
        assert!(resp.token.is_none());
        assert_eq!(resp.return_code, Some(3));
    }

    #[test]
    fn account_balance_from_padded_strings() {
        let raw = json!({
            "tot_pur_amt": "000000017598258",
            "tot_evlt_amt": "000000025789890",
            "tot_evlt_pl": "000000008138178",
            "tot_prft_rt": "46.25",
            "prsm_dpst_aset_amt": "000000049925000",
            "tot_loan_amt": "000000000000000",
            "tot_crd_loan_amt": "000000000000000",
            "tot_crd_ls_amt": "000000000000000",
            "acnt_evlt_remn_indv_tot": [{
                "stk_cd": "A005930",
                "stk_nm": "삼성전자",
                "evltv_prft": "-00000000196888",
                "prft_rt": "-52.71",
                "pur_pric": "000000000124500",
                "pred_close_pric": "000000045400",
                "rmnd_qty": "000000000000003",
                "trde_able_qty": "000000000000003",
                "cur_prc": "-000000059000",
                "pur_amt": "000000000373500",
                "evlt_amt": "000000000177000",
                "poss_rt": "0.69"
            }],
            "return_code": 0,
            "return_msg": "조회가 완료되었습니다."
        });
        let resp: AccountBalanceResponse = serde_json::from_value(raw).unwrap();
        let balance = AccountBalance::try_from(resp).unwrap();

        assert_eq!(balance.summary.total_purchase, dec!(17598258));
        assert_eq!(balance.summary.total_profit_rate, dec!(46.25));
        assert_eq!(balance.summary.cash(), dec!(24135110));

        let holding = &balance.holdings[0];
        assert_eq!(holding.instrument_code(), "005930");
        assert_eq!(holding.quantity, dec!(3));
        assert_eq!(holding.current_price, dec!(59000));
        assert_eq!(holding.evaluation_profit, dec!(-196888));
    }

    #[test]
    fn account_balance_rejects_garbage_numbers() {
        let resp: AccountBalanceResponse =
            serde_json::from_value(json!({"tot_pur_amt": "n/a"})).unwrap();
        assert!(matches!(
            AccountBalance::try_from(resp),
            Err(KiwoomError::InvalidNumber { field, .. }) if field == "tot_pur_amt"
        ));
    }
}
