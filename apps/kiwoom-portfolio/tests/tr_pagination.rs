//! REST Client Integration Tests
//!
//! Token login, continuation-key pagination, and transaction normalization
//! against a local mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kiwoom_portfolio::infrastructure::kiwoom::api_types::StockListRequest;
use kiwoom_portfolio::{
    AccessToken, Continuation, Credentials, KiwoomError, KiwoomHttpClient, RestSettings, TrClient,
    TransactionId,
};

fn client(server: &MockServer) -> KiwoomHttpClient {
    KiwoomHttpClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn settings() -> RestSettings {
    RestSettings {
        page_delay: Duration::ZERO,
        ..RestSettings::default()
    }
}

fn token() -> AccessToken {
    AccessToken::new("test-token")
}

fn page(has_more: bool, next_key: &str, body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("cont-yn", if has_more { "Y" } else { "N" })
        .insert_header("next-key", next_key)
        .set_body_json(body)
}

// =============================================================================
// Token Client
// =============================================================================

#[tokio::test]
async fn authenticate_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/json;charset=UTF-8"))
        .and(body_partial_json(json!({
            "grant_type": "client_credentials",
            "appkey": "app",
            "secretkey": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc123",
            "token_type": "bearer",
            "expires_dt": "20261231235959",
            "return_code": 0,
            "return_msg": "정상적으로 처리되었습니다"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials::new("app", "secret").unwrap();
    let token = client(&server).authenticate(&credentials).await.unwrap();

    assert_eq!(token.as_str(), "abc123");
    assert!(token.expires_at().is_some());
}

#[tokio::test]
async fn rejected_credentials_fail_with_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid appkey"))
        .mount(&server)
        .await;

    let credentials = Credentials::new("bad", "creds").unwrap();
    let err = client(&server).authenticate(&credentials).await.unwrap_err();

    match err {
        KiwoomError::Authentication { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid appkey");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "return_code": 3,
            "return_msg": "입력 값 오류"
        })))
        .mount(&server)
        .await;

    let credentials = Credentials::new("app", "secret").unwrap();
    let err = client(&server).authenticate(&credentials).await.unwrap_err();
    assert!(matches!(err, KiwoomError::Authentication { status: 200, .. }));
}

#[tokio::test]
async fn login_builds_client_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "session"})))
        .mount(&server)
        .await;

    let credentials = Credentials::new("app", "secret").unwrap();
    let tr = TrClient::login(client(&server), &credentials, settings())
        .await
        .unwrap();
    assert_eq!(tr.token().as_str(), "session");
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn fetch_page_sends_headers_and_reads_continuation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/stkinfo"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("api-id", "ka10099"))
        .and(header("cont-yn", "N"))
        .respond_with(page(true, "abc", json!({"list": []})))
        .expect(1)
        .mount(&server)
        .await;

    let first = client(&server)
        .fetch_page(
            TransactionId::StockList,
            &token(),
            &StockListRequest::market("0"),
            &Continuation::initial(),
        )
        .await
        .unwrap();

    assert_eq!(first.continuation, Continuation::resume("abc"));
    assert_eq!(first.continuation.cont_yn(), "Y");
}

#[tokio::test]
async fn next_request_carries_next_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/stkinfo"))
        .and(header("cont-yn", "N"))
        .respond_with(page(true, "abc", json!({"list": [{"code": "005930"}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/stkinfo"))
        .and(header("cont-yn", "Y"))
        .and(header("next-key", "abc"))
        .respond_with(page(false, "", json!({"list": [{"code": "000660"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let pages = client(&server)
        .fetch_all(
            TransactionId::StockList,
            &token(),
            &StockListRequest::market("0"),
            10,
        )
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert!(!pages[1].continuation.has_more);
}

#[tokio::test]
async fn fetch_all_returns_exactly_the_pages_served() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("cont-yn", "N"))
        .respond_with(page(true, "k1", json!({"n": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("next-key", "k1"))
        .respond_with(page(true, "k2", json!({"n": 2})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("next-key", "k2"))
        .respond_with(page(false, "", json!({"n": 3})))
        .mount(&server)
        .await;

    let pages = client(&server)
        .fetch_all(TransactionId::StockList, &token(), &json!({}), 50)
        .await
        .unwrap();

    let numbers: Vec<_> = pages.iter().map(|p| p.payload["n"].clone()).collect();
    assert_eq!(numbers, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn page_limit_stops_without_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(page(true, "more", json!({"list": []})))
        .expect(2)
        .mount(&server)
        .await;

    let pages = client(&server)
        .fetch_all(TransactionId::StockList, &token(), &json!({}), 2)
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert!(pages[1].continuation.has_more);
}

#[tokio::test]
async fn zero_page_limit_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(page(false, "", json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let pages = client(&server)
        .fetch_all(TransactionId::StockList, &token(), &json!({}), 0)
        .await
        .unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn non_success_status_is_a_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/mrkcond"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server busy"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_page(
            TransactionId::DailyPrices,
            &token(),
            &json!({}),
            &Continuation::initial(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    match err {
        KiwoomError::Request {
            api_id,
            status,
            body,
        } => {
            assert_eq!(api_id, "ka10086");
            assert_eq!(status, 500);
            assert_eq!(body, "server busy");
        }
        other => panic!("expected request error, got {other:?}"),
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn stock_list_concatenates_pages_with_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("cont-yn", "N"))
        .respond_with(page(
            true,
            "p2",
            json!({"list": [{"code": "005930", "name": "삼성전자"}]}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("next-key", "p2"))
        .respond_with(page(
            false,
            "",
            json!({"list": [{"code": "000660", "name": "SK하이닉스", "extra": "x"}]}),
        ))
        .mount(&server)
        .await;

    let tr = TrClient::with_token(client(&server), token(), settings());
    let table = tr.stock_list("0").await.unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.columns()[..2], ["종목코드", "종목명"]);
    assert_eq!(table.get(1, "종목코드"), Some(&json!("000660")));
    assert_eq!(table.get(0, "extra"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn daily_prices_drop_summary_row_and_sign() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/mrkcond"))
        .and(header("api-id", "ka10086"))
        .and(body_partial_json(json!({"stk_cd": "005930", "qry_dt": "20250103"})))
        .respond_with(page(
            true,
            "older",
            json!({"daly_stkpc": [
                {"date": "20250103", "open_pric": "+60700", "high_pric": "+61000", "low_pric": "-60000", "close_pric": "-60500"},
                {"date": "20250102", "open_pric": "-59900", "high_pric": "+60100", "low_pric": "-59000", "close_pric": "+60000"},
                {"date": "20241231", "open_pric": "1", "high_pric": "1", "low_pric": "1", "close_pric": "1"}
            ]}),
        ))
        .mount(&server)
        .await;

    let tr = TrClient::with_token(client(&server), token(), settings());
    let (table, next) = tr
        .daily_prices("005930", "20250103", &Continuation::initial())
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0, "시가"), Some(&json!(60700)));
    assert_eq!(table.get(0, "저가"), Some(&json!(60000)));
    assert_eq!(table.get(1, "날짜"), Some(&json!("20250102")));
    assert_eq!(next, Continuation::resume("older"));
}

#[tokio::test]
async fn account_report_parses_balance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/acnt"))
        .and(header("api-id", "kt00018"))
        .and(body_partial_json(json!({"qry_tp": "1", "dmst_stex_tp": "KRX"})))
        .respond_with(page(
            false,
            "",
            json!({
                "tot_pur_amt": "000000001200000",
                "tot_evlt_amt": "000000001300000",
                "tot_evlt_pl": "000000000100000",
                "tot_prft_rt": "8.33",
                "prsm_dpst_aset_amt": "000000002000000",
                "acnt_evlt_remn_indv_tot": [{
                    "stk_cd": "A005930",
                    "stk_nm": "삼성전자",
                    "rmnd_qty": "000000000020",
                    "trde_able_qty": "000000000020",
                    "pur_pric": "000000060000",
                    "cur_prc": "-000000065000",
                    "evlt_amt": "000000001300000"
                }],
                "return_code": 0
            }),
        ))
        .mount(&server)
        .await;

    let tr = TrClient::with_token(client(&server), token(), settings());
    let report = tr.account_report().await.unwrap();

    assert_eq!(report.balance.holdings.len(), 1);
    let holding = &report.balance.holdings[0];
    assert_eq!(holding.instrument_code(), "005930");
    assert_eq!(holding.current_price.to_string(), "65000");
    assert_eq!(report.balance.instrument_codes(), vec!["005930"]);
    assert_eq!(report.record.items.len(), 1);
    assert_eq!(report.record.summary.get("총수익률(%)"), Some(&json!("8.33")));
}

#[tokio::test]
async fn same_request_same_normalized_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dostk/rkinfo"))
        .respond_with(page(
            false,
            "",
            json!({"trde_prica_upper": [
                {"now_rank": "1", "stk_cd": "005930", "stk_nm": "삼성전자", "trde_prica": "1000", "zzz": "1"},
                {"now_rank": "2", "stk_cd": "000660", "stk_nm": "SK하이닉스", "trde_prica": "900"}
            ]}),
        ))
        .expect(2)
        .mount(&server)
        .await;

    let tr = TrClient::with_token(client(&server), token(), settings());
    let request = kiwoom_portfolio::infrastructure::kiwoom::TradeValueRankingRequest::default();
    let first = tr.trade_value_ranking(&request, 3).await.unwrap();
    let second = tr.trade_value_ranking(&request, 3).await.unwrap();

    assert_eq!(first.columns(), second.columns());
    assert_eq!(first, second);
    assert_eq!(first.columns().last().map(String::as_str), Some("zzz"));
}
