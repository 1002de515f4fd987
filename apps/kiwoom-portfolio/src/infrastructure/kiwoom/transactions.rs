//! Transaction Catalogue
//!
//! Every Kiwoom REST call is identified by an `api-id` header and posted to
//! `/api/dostk/<resource>`. Each transaction also has a fixed mapping from
//! raw response field names to output labels.
//!
//! | api-id    | resource  | payload key                | shape  |
//! |-----------|-----------|----------------------------|--------|
//! | `ka10099` | `stkinfo` | `list`                     | table  |
//! | `ka10086` | `mrkcond` | `daly_stkpc`               | table  |
//! | `kt00018` | `acnt`    | `acnt_evlt_remn_indv_tot`  | nested |
//! | `ka10032` | `rkinfo`  | `trde_prica_upper`         | table  |
//! | `ka10006` | `mrkcond` | (root)                     | flat   |

use super::normalize::{FieldLabels, TableRules};

/// Known transaction identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionId {
    /// `ka10099` stock info list.
    StockList,
    /// `ka10086` daily stock prices.
    DailyPrices,
    /// `kt00018` account evaluation balance.
    AccountBalance,
    /// `ka10032` trade value ranking.
    TradeValueRanking,
    /// `ka10006` stock intraday quote.
    IntradayQuote,
}

/// How a transaction's payload is reshaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Array of records under a key.
    Table {
        /// Payload key holding the array.
        key: &'static str,
        /// Row reshaping rules.
        rules: TableRules,
    },
    /// Root summary plus an array of sub-records.
    Nested {
        /// Payload key holding the sub-records.
        list_key: &'static str,
        /// Label for the sub-record list.
        list_label: &'static str,
        /// Labels for each sub-record.
        item_labels: FieldLabels,
    },
    /// A single flat record at the root.
    Flat,
}

impl TransactionId {
    /// Every known transaction.
    pub const ALL: [Self; 5] = [
        Self::StockList,
        Self::DailyPrices,
        Self::AccountBalance,
        Self::TradeValueRanking,
        Self::IntradayQuote,
    ];

    /// `api-id` header value.
    #[must_use]
    pub const fn api_id(self) -> &'static str {
        match self {
            Self::StockList => "ka10099",
            Self::DailyPrices => "ka10086",
            Self::AccountBalance => "kt00018",
            Self::TradeValueRanking => "ka10032",
            Self::IntradayQuote => "ka10006",
        }
    }

    /// Resource segment under `/api/dostk/`.
    #[must_use]
    pub const fn resource(self) -> &'static str {
        match self {
            Self::StockList => "stkinfo",
            Self::DailyPrices | Self::IntradayQuote => "mrkcond",
            Self::AccountBalance => "acnt",
            Self::TradeValueRanking => "rkinfo",
        }
    }

    /// Request path.
    #[must_use]
    pub fn path(self) -> String {
        format!("/api/dostk/{}", self.resource())
    }

    /// Look up by `api-id`.
    #[must_use]
    pub fn from_api_id(api_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.api_id() == api_id)
    }

    /// Labels for the table columns, summary fields, or flat record.
    #[must_use]
    pub const fn labels(self) -> FieldLabels {
        match self {
            Self::StockList => STOCK_LIST_LABELS,
            Self::DailyPrices => DAILY_PRICE_LABELS,
            Self::AccountBalance => ACCOUNT_SUMMARY_LABELS,
            Self::TradeValueRanking => TRADE_VALUE_RANKING_LABELS,
            Self::IntradayQuote => INTRADAY_QUOTE_LABELS,
        }
    }

    /// Payload shape.
    #[must_use]
    pub const fn shape(self) -> PayloadShape {
        match self {
            Self::StockList => PayloadShape::Table {
                key: "list",
                rules: PLAIN_TABLE,
            },
            Self::DailyPrices => PayloadShape::Table {
                key: "daly_stkpc",
                rules: DAILY_PRICE_RULES,
            },
            Self::AccountBalance => PayloadShape::Nested {
                list_key: "acnt_evlt_remn_indv_tot",
                list_label: ACCOUNT_HOLDINGS_LABEL,
                item_labels: ACCOUNT_HOLDING_LABELS,
            },
            Self::TradeValueRanking => PayloadShape::Table {
                key: "trde_prica_upper",
                rules: PLAIN_TABLE,
            },
            Self::IntradayQuote => PayloadShape::Flat,
        }
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_id())
    }
}

const PLAIN_TABLE: TableRules = TableRules {
    drop_trailing_rows: 0,
    absolute_columns: &[],
};

// The last daily row is a partial summary row.
const DAILY_PRICE_RULES: TableRules = TableRules {
    drop_trailing_rows: 1,
    absolute_columns: &["open_pric", "high_pric", "low_pric", "close_pric"],
};

// =============================================================================
// Field Labels
// =============================================================================

const STOCK_LIST_LABELS: FieldLabels = &[
    ("code", "종목코드"),
    ("name", "종목명"),
    ("listCount", "상장주식수"),
    ("auditInfo", "감리구분"),
    ("regDay", "상장일"),
    ("lastPrice", "전일종가"),
    ("state", "종목상태"),
    ("marketCode", "시장구분코드"),
    ("marketName", "시장명"),
    ("upName", "업종명"),
    ("upSizeName", "회사크기분류"),
    ("companyClassName", "회사분류"),
    ("orderWarning", "투자유의종목여부"),
    ("nxtEnable", "NXT가능여부"),
];

const DAILY_PRICE_LABELS: FieldLabels = &[
    ("date", "날짜"),
    ("open_pric", "시가"),
    ("high_pric", "고가"),
    ("low_pric", "저가"),
    ("close_pric", "종가"),
    ("pred_rt", "전일비"),
    ("flu_rt", "등락률"),
    ("trde_qty", "거래량"),
    ("amt_mn", "금액(백만)"),
    ("crd_rt", "신용비"),
    ("ind", "개인"),
    ("orgn", "기관"),
    ("for_qty", "외인수량"),
    ("frgn", "외국계"),
    ("prm", "프로그램"),
    ("for_rt", "외인비"),
    ("for_poss", "외인보유"),
    ("for_wght", "외인비중"),
    ("for_netprps", "외인순매수"),
    ("orgn_netprps", "기관순매수"),
    ("ind_netprps", "개인순매수"),
    ("crd_remn_rt", "신용잔고율"),
];

const ACCOUNT_SUMMARY_LABELS: FieldLabels = &[
    ("tot_pur_amt", "총매입금액"),
    ("tot_evlt_amt", "총평가금액"),
    ("tot_evlt_pl", "총평가손익금액"),
    ("tot_prft_rt", "총수익률(%)"),
    ("prsm_dpst_aset_amt", "추정예탁자산"),
    ("tot_loan_amt", "총대출금"),
    ("tot_crd_loan_amt", "총융자금액"),
    ("tot_crd_ls_amt", "총대주금액"),
];

/// Label of the per-instrument list in the account balance.
pub const ACCOUNT_HOLDINGS_LABEL: &str = "계좌평가잔고개별합산";

const ACCOUNT_HOLDING_LABELS: FieldLabels = &[
    ("stk_cd", "종목번호"),
    ("stk_nm", "종목명"),
    ("evltv_prft", "평가손익"),
    ("prft_rt", "수익률(%)"),
    ("pur_pric", "매입가"),
    ("pred_close_pric", "전일종가"),
    ("rmnd_qty", "보유수량"),
    ("trde_able_qty", "매매가능수량"),
    ("cur_prc", "현재가"),
    ("pred_buyq", "전일매수수량"),
    ("pred_sellq", "전일매도수량"),
    ("tdy_buyq", "금일매수수량"),
    ("tdy_sellq", "금일매도수량"),
    ("pur_amt", "매입금액"),
    ("pur_cmsn", "매입수수료"),
    ("evlt_amt", "평가금액"),
    ("sell_cmsn", "평가수수료"),
    ("tax", "세금"),
    ("sum_cmsn", "수수료합"),
    ("poss_rt", "보유비중(%)"),
    ("crd_tp", "신용구분"),
    ("crd_tp_nm", "신용구분명"),
    ("crd_loan_dt", "대출일"),
];

const TRADE_VALUE_RANKING_LABELS: FieldLabels = &[
    ("now_rank", "현재순위"),
    ("pred_rank", "전일순위"),
    ("stk_cd", "종목코드"),
    ("stk_nm", "종목명"),
    ("cur_prc", "현재가"),
    ("pred_pre_sig", "전일대비기호"),
    ("pred_pre", "전일대비"),
    ("flu_rt", "등락률"),
    ("sel_bid", "매도호가"),
    ("buy_bid", "매수호가"),
    ("now_trde_qty", "현재거래량"),
    ("pred_trde_qty", "전일거래량"),
    ("trde_prica", "거래대금"),
];

const INTRADAY_QUOTE_LABELS: FieldLabels = &[
    ("date", "date"),
    ("open_pric", "open"),
    ("high_pric", "high"),
    ("low_pric", "low"),
    ("close_pric", "close"),
];
