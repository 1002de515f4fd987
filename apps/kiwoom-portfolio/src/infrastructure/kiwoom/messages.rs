//! Kiwoom WebSocket Message Types
//!
//! Frames are JSON objects tagged by `trnm`:
//!
//! | `trnm`   | Direction | Purpose                                  |
//! |----------|-----------|------------------------------------------|
//! | `LOGIN`  | both      | token login and its acknowledgment       |
//! | `PING`   | both      | keep-alive, echoed back unchanged        |
//! | `REG`    | both      | register realtime items / ack            |
//! | `REMOVE` | both      | unregister realtime items / ack          |
//! | `REAL`   | inbound   | realtime data                            |
//!
//! Realtime values are keyed by numeric field ids: `"10"` is the current
//! price (signed by direction) and `"20"` the trade time (`HHMMSS`).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::holdings::parse_kiwoom_price;
use crate::domain::ticks::Tick;

/// `trnm` of the login frame.
pub const TRNM_LOGIN: &str = "LOGIN";
/// `trnm` of the keep-alive frame.
pub const TRNM_PING: &str = "PING";
/// `trnm` of a registration.
pub const TRNM_REG: &str = "REG";
/// `trnm` of an unregistration.
pub const TRNM_REMOVE: &str = "REMOVE";
/// `trnm` of a realtime data frame.
pub const TRNM_REAL: &str = "REAL";

/// Realtime field id of the current price.
pub const FIELD_CURRENT_PRICE: &str = "10";
/// Realtime field id of the trade time.
pub const FIELD_TRADE_TIME: &str = "20";

// =============================================================================
// Outbound
// =============================================================================

/// `{"trnm":"LOGIN","token":"..."}`.
#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// Always `LOGIN`.
    pub trnm: &'static str,
    /// Access token.
    pub token: &'a str,
}

impl<'a> LoginRequest<'a> {
    /// Login frame for `token`.
    #[must_use]
    pub const fn new(token: &'a str) -> Self {
        Self {
            trnm: TRNM_LOGIN,
            token,
        }
    }
}

/// One registration entry: items crossed with realtime types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationItem {
    /// Instrument codes.
    pub item: Vec<String>,
    /// Realtime types (e.g. `0B` trade execution).
    #[serde(rename = "type")]
    pub types: Vec<String>,
}

/// `REG`/`REMOVE` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    /// `REG` or `REMOVE`.
    pub trnm: &'static str,
    /// Registration group number.
    pub grp_no: String,
    /// `1` keeps existing registrations, `0` replaces them.
    pub refresh: String,
    /// Registration entries.
    pub data: Vec<RegistrationItem>,
}

impl RegistrationRequest {
    /// Register `codes` for `types`, keeping existing registrations.
    #[must_use]
    pub fn register(group: &str, codes: Vec<String>, types: Vec<String>) -> Self {
        Self {
            trnm: TRNM_REG,
            grp_no: group.to_string(),
            refresh: "1".to_string(),
            data: vec![RegistrationItem { item: codes, types }],
        }
    }

    /// Unregister `codes` for `types`.
    #[must_use]
    pub fn remove(group: &str, codes: Vec<String>, types: Vec<String>) -> Self {
        Self {
            trnm: TRNM_REMOVE,
            grp_no: group.to_string(),
            refresh: "1".to_string(),
            data: vec![RegistrationItem { item: codes, types }],
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

fn int_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Code>::deserialize(deserializer)? {
        Some(Code::Int(n)) => Some(n),
        Some(Code::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Acknowledgment of `LOGIN`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginAck {
    /// Result code, `0` on success.
    #[serde(default, deserialize_with = "int_or_string")]
    pub return_code: Option<i64>,
    /// Result message.
    #[serde(default)]
    pub return_msg: String,
}

impl LoginAck {
    /// Whether the login was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// Acknowledgment of `REG`/`REMOVE`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationAck {
    /// `REG` or `REMOVE`.
    pub trnm: String,
    /// Result code, `0` on success.
    #[serde(default, deserialize_with = "int_or_string")]
    pub return_code: Option<i64>,
    /// Result message.
    #[serde(default)]
    pub return_msg: String,
}

/// One realtime entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealEntry {
    /// Realtime type (e.g. `0B`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Realtime type name.
    #[serde(default)]
    pub name: String,
    /// Instrument code.
    #[serde(default)]
    pub item: String,
    /// Field id to value.
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl RealEntry {
    /// Absolute current price, if present and parseable.
    #[must_use]
    pub fn price(&self) -> Option<Decimal> {
        self.values
            .get(FIELD_CURRENT_PRICE)
            .and_then(|raw| parse_kiwoom_price(raw).ok())
    }

    /// Trade time `HHMMSS`, if present.
    #[must_use]
    pub fn trade_time(&self) -> Option<&str> {
        self.values.get(FIELD_TRADE_TIME).map(String::as_str)
    }

    /// Tick observed now, if the entry carries a positive price.
    #[must_use]
    pub fn tick(&self) -> Option<Tick> {
        let price = self.price().filter(|p| *p > Decimal::ZERO)?;
        if self.item.is_empty() {
            return None;
        }
        Some(Tick::now(self.item.clone(), price))
    }
}

/// `REAL` data frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealFrame {
    /// Realtime entries.
    #[serde(default)]
    pub data: Vec<RealEntry>,
}

/// Flat tick frame `{"msg_cd":"0","stck_cano":"005930","stck_prpr":"60700"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlatTickFrame {
    /// Message code, `0` for data.
    pub msg_cd: String,
    /// Instrument code.
    pub stck_cano: String,
    /// Current price.
    pub stck_prpr: String,
}

impl FlatTickFrame {
    /// Tick observed now, if this is a data frame with a positive price.
    #[must_use]
    pub fn tick(&self) -> Option<Tick> {
        if self.msg_cd != "0" || self.stck_cano.is_empty() {
            return None;
        }
        let price = parse_kiwoom_price(&self.stck_prpr)
            .ok()
            .filter(|p| *p > Decimal::ZERO)?;
        Some(Tick::now(self.stck_cano.clone(), price))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn login_request_json() {
        let json = serde_json::to_value(LoginRequest::new("tok")).unwrap();
        assert_eq!(json, json!({"trnm": "LOGIN", "token": "tok"}));
    }

    #[test]
    fn registration_request_json() {
        let req = RegistrationRequest::register(
            "1",
            vec!["005930".to_string(), "000660".to_string()],
            vec!["0B".to_string()],
        );
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            json!({
                "trnm": "REG",
                "grp_no": "1",
                "refresh": "1",
                "data": [{"item": ["005930", "000660"], "type": ["0B"]}]
            })
        );
        let removal = RegistrationRequest::remove("1", vec![], vec![]);
        assert_eq!(removal.trnm, "REMOVE");
    }

    #[test]
    fn login_ack_accepts_numeric_or_text_code() {
        let ok: LoginAck = serde_json::from_value(json!({"return_code": 0})).unwrap();
        assert!(ok.is_success());
        let text: LoginAck = serde_json::from_value(json!({"return_code": "0"})).unwrap();
        assert!(text.is_success());
        let rejected: LoginAck =
            serde_json::from_value(json!({"return_code": 100013, "return_msg": "token expired"}))
                .unwrap();
        assert!(!rejected.is_success());
        let missing: LoginAck = serde_json::from_value(json!({})).unwrap();
        assert!(!missing.is_success());
    }

    #[test]
    fn real_entry_price_drops_sign() {
        let entry: RealEntry = serde_json::from_value(json!({
            "type": "0B",
            "name": "주식체결",
            "item": "005930",
            "values": {"10": "-60700", "20": "093015"}
        }))
        .unwrap();
        assert_eq!(entry.price(), Some(dec!(60700)));
        assert_eq!(entry.trade_time(), Some("093015"));
        assert_eq!(entry.tick().unwrap().code, "005930");
    }

    #[test]
    fn real_entry_without_price_has_no_tick() {
        let entry: RealEntry =
            serde_json::from_value(json!({"item": "005930", "values": {"20": "093015"}})).unwrap();
        assert!(entry.tick().is_none());

        let zero: RealEntry =
            serde_json::from_value(json!({"item": "005930", "values": {"10": "0"}})).unwrap();
        assert!(zero.tick().is_none());
    }

    #[test]
    fn flat_frame_tick() {
        let frame = FlatTickFrame {
            msg_cd: "0".to_string(),
            stck_cano: "005930".to_string(),
            stck_prpr: "+61000".to_string(),
        };
        assert_eq!(frame.tick().unwrap().price, dec!(61000));

        let control = FlatTickFrame {
            msg_cd: "1".to_string(),
            ..frame
        };
        assert!(control.tick().is_none());
    }
}
