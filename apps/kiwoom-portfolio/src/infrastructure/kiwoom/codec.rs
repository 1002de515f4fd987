//! WebSocket Frame Codec
//!
//! Classifies inbound text frames by `trnm`. Frames without `trnm` are
//! checked for the flat `msg_cd`/`stck_cano`/`stck_prpr` tick shape.

use serde::Serialize;
use serde_json::Value;

use super::messages::{
    FlatTickFrame, LoginAck, RealFrame, RegistrationAck, TRNM_LOGIN, TRNM_PING, TRNM_REAL,
    TRNM_REG, TRNM_REMOVE,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Login acknowledgment.
    Login(LoginAck),
    /// Keep-alive probe; the raw text must be echoed.
    Ping,
    /// `REG`/`REMOVE` acknowledgment.
    Registration(RegistrationAck),
    /// Realtime data.
    Real(RealFrame),
    /// Flat tick.
    FlatTick(FlatTickFrame),
    /// Anything else, by `trnm` (empty if absent).
    Other(String),
}

/// JSON codec for the Kiwoom realtime stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object or a known frame
    /// does not match its schema.
    pub fn decode(&self, text: &str) -> Result<StreamFrame, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;
        if !value.is_object() {
            let preview: String = text.chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {preview}"
            )));
        }

        let trnm = value
            .get("trnm")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(match trnm.as_deref() {
            Some(TRNM_LOGIN) => StreamFrame::Login(serde_json::from_value(value)?),
            Some(TRNM_PING) => StreamFrame::Ping,
            Some(TRNM_REG | TRNM_REMOVE) => StreamFrame::Registration(serde_json::from_value(value)?),
            Some(TRNM_REAL) => StreamFrame::Real(serde_json::from_value(value)?),
            Some(other) => StreamFrame::Other(other.to_string()),
            None if value.get("msg_cd").is_some() && value.get("stck_cano").is_some() => {
                StreamFrame::FlatTick(serde_json::from_value(value)?)
            }
            None => StreamFrame::Other(String::new()),
        })
    }

    /// Encode an outbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode<T: Serialize>(&self, frame: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kiwoom::messages::LoginRequest;

    #[test]
    fn decodes_login_ack() {
        let frame = JsonCodec::new()
            .decode(r#"{"trnm":"LOGIN","return_code":0,"return_msg":""}"#)
            .unwrap();
        assert!(matches!(frame, StreamFrame::Login(ack) if ack.is_success()));
    }

    #[test]
    fn decodes_ping() {
        let frame = JsonCodec::new().decode(r#"{"trnm":"PING"}"#).unwrap();
        assert_eq!(frame, StreamFrame::Ping);
    }

    #[test]
    fn decodes_registration_ack() {
        let frame = JsonCodec::new()
            .decode(r#"{"trnm":"REG","return_code":0,"return_msg":""}"#)
            .unwrap();
        assert!(matches!(frame, StreamFrame::Registration(ack) if ack.trnm == "REG"));
    }

    #[test]
    fn decodes_real_frame() {
        let text = r#"{"trnm":"REAL","data":[{"type":"0B","name":"주식체결","item":"005930","values":{"10":"+60700","20":"093015"}}]}"#;
        let StreamFrame::Real(real) = JsonCodec::new().decode(text).unwrap() else {
            panic!("expected REAL frame");
        };
        assert_eq!(real.data.len(), 1);
        assert_eq!(real.data[0].item, "005930");
    }

    #[test]
    fn decodes_flat_tick() {
        let frame = JsonCodec::new()
            .decode(r#"{"msg_cd":"0","stck_cano":"005930","stck_prpr":"60700"}"#)
            .unwrap();
        assert!(matches!(frame, StreamFrame::FlatTick(_)));
    }

    #[test]
    fn unknown_frames_are_other() {
        assert_eq!(
            JsonCodec::new().decode(r#"{"trnm":"CNSRLST"}"#).unwrap(),
            StreamFrame::Other("CNSRLST".to_string())
        );
        assert_eq!(
            JsonCodec::new().decode(r#"{"hello":1}"#).unwrap(),
            StreamFrame::Other(String::new())
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(JsonCodec::new().decode("not json").is_err());
        assert!(matches!(
            JsonCodec::new().decode("[1,2]"),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(JsonCodec::new().decode(r#"{"trnm":"REAL","data":"x"}"#).is_err());
    }

    #[test]
    fn encodes_login() {
        let text = JsonCodec::new().encode(&LoginRequest::new("tok")).unwrap();
        assert_eq!(text, r#"{"trnm":"LOGIN","token":"tok"}"#);
    }
}
