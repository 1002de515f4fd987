//! Account Holdings
//!
//! Typed view of an account evaluation balance: the account-level summary
//! and one [`HoldingRecord`] per instrument held. Records are derived
//! entirely from server response fields and recomputed on every fetch.
//!
//! # Number Format
//!
//! Kiwoom returns numbers as zero-padded strings, optionally prefixed with a
//! `+`/`-` direction marker (`"000000060700"`, `"-60700"`, `"-000012.34"`).
//! [`parse_kiwoom_number`] turns those into [`Decimal`] values.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

// =============================================================================
// Number Parsing
// =============================================================================

/// Error returned when a Kiwoom numeric string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid number: {0:?}")]
pub struct NumberParseError(pub String);

/// Parse a Kiwoom numeric string.
///
/// Leading zeros are ignored, a leading `+` or `-` sets the sign, and an
/// empty string parses as zero.
///
/// # Errors
///
/// Returns `NumberParseError` if the remaining characters are not a decimal
/// number.
pub fn parse_kiwoom_number(raw: &str) -> Result<Decimal, NumberParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(NumberParseError(raw.to_string()));
    }

    let digits = unsigned.trim_start_matches('0');
    let normalized = if digits.is_empty() || digits.starts_with('.') {
        format!("0{digits}")
    } else {
        digits.to_string()
    };

    let value =
        Decimal::from_str(&normalized).map_err(|_| NumberParseError(raw.to_string()))?;
    Ok(if negative { -value } else { value })
}

/// Parse a Kiwoom price field, discarding the direction marker.
///
/// # Errors
///
/// Returns `NumberParseError` if the value is not a number.
pub fn parse_kiwoom_price(raw: &str) -> Result<Decimal, NumberParseError> {
    parse_kiwoom_number(raw).map(|v| v.abs())
}

// =============================================================================
// Holding Record
// =============================================================================

/// One instrument held in the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingRecord {
    /// Instrument code as returned by the account endpoint (e.g. `A005930`).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Quantity held.
    pub quantity: Decimal,
    /// Quantity that can be sold today.
    pub tradable_quantity: Decimal,
    /// Average purchase price (cost basis per share).
    pub purchase_price: Decimal,
    /// Last trade price reported by the account endpoint.
    pub current_price: Decimal,
    /// Total purchase amount.
    pub purchase_amount: Decimal,
    /// Evaluation amount at the reported price.
    pub evaluation_amount: Decimal,
    /// Evaluation profit reported by the server.
    pub evaluation_profit: Decimal,
    /// Profit rate in percent reported by the server.
    pub profit_rate: Decimal,
    /// Share of the account in percent reported by the server.
    pub holding_ratio: Decimal,
}

impl HoldingRecord {
    /// Instrument code in the form the realtime stream expects.
    ///
    /// The account endpoint prefixes stock codes with `A`; realtime
    /// registration uses the bare six-digit code.
    #[must_use]
    pub fn instrument_code(&self) -> &str {
        self.code
            .strip_prefix('A')
            .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(&self.code)
    }

    /// Whether any quantity is held.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}

// =============================================================================
// Account Summary
// =============================================================================

/// Account-level totals of the evaluation balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    /// Total purchase amount.
    pub total_purchase: Decimal,
    /// Total evaluation amount.
    pub total_evaluation: Decimal,
    /// Total evaluation profit.
    pub total_profit: Decimal,
    /// Total profit rate in percent.
    pub total_profit_rate: Decimal,
    /// Estimated deposit assets (cash plus evaluated stock).
    pub estimated_deposit_assets: Decimal,
    /// Total loan amount.
    pub total_loan: Decimal,
    /// Total credit loan amount.
    pub total_credit_loan: Decimal,
    /// Total credit short amount.
    pub total_credit_short: Decimal,
}

impl AccountSummary {
    /// Cash portion of the account.
    ///
    /// Estimated deposit assets minus the evaluated stock, floored at zero.
    #[must_use]
    pub fn cash(&self) -> Decimal {
        (self.estimated_deposit_assets - self.total_evaluation).max(Decimal::ZERO)
    }
}

/// Account evaluation balance: summary plus holdings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    /// Account totals.
    pub summary: AccountSummary,
    /// Per-instrument holdings.
    pub holdings: Vec<HoldingRecord>,
}

impl AccountBalance {
    /// Realtime instrument codes of every holding with a positive quantity.
    #[must_use]
    pub fn instrument_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .holdings
            .iter()
            .filter(|h| h.is_held())
            .map(|h| h.instrument_code().to_string())
            .collect();
        codes.dedup();
        codes
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;

    #[test_case("000000060700", dec!(60700) ; "zero padded")]
    #[test_case("+60700", dec!(60700) ; "plus sign")]
    #[test_case("-60700", dec!(-60700) ; "minus sign")]
    #[test_case("-000000012.34", dec!(-12.34) ; "padded negative rate")]
    #[test_case("0.00", dec!(0) ; "zero rate")]
    #[test_case("000000000000", dec!(0) ; "all zeros")]
    #[test_case("", dec!(0) ; "empty")]
    #[test_case("  1500 ", dec!(1500) ; "surrounding whitespace")]
    fn parses_kiwoom_numbers(raw: &str, expected: Decimal) {
        assert_eq!(parse_kiwoom_number(raw).unwrap(), expected);
    }

    #[test_case("abc" ; "letters")]
    #[test_case("-" ; "bare sign")]
    #[test_case("1,000" ; "thousands separator")]
    fn rejects_malformed_numbers(raw: &str) {
        assert!(parse_kiwoom_number(raw).is_err());
    }

    #[test]
    fn price_drops_direction_marker() {
        assert_eq!(parse_kiwoom_price("-60700").unwrap(), dec!(60700));
        assert_eq!(parse_kiwoom_price("+60700").unwrap(), dec!(60700));
    }

    proptest! {
        #[test]
        fn padded_integers_round_trip(value in 0u64..1_000_000_000, pad in 0usize..6, sign in prop::bool::ANY) {
            let raw = format!("{}{}{value}", if sign { "-" } else { "+" }, "0".repeat(pad));
            let parsed = parse_kiwoom_number(&raw).unwrap();
            let expected = if sign { -Decimal::from(value) } else { Decimal::from(value) };
            prop_assert_eq!(parsed, expected);
        }
    }

    fn holding(code: &str, quantity: Decimal) -> HoldingRecord {
        HoldingRecord {
            code: code.to_string(),
            name: "삼성전자".to_string(),
            quantity,
            tradable_quantity: quantity,
            purchase_price: dec!(70000),
            current_price: dec!(60700),
            purchase_amount: dec!(700000),
            evaluation_amount: dec!(607000),
            evaluation_profit: dec!(-93000),
            profit_rate: dec!(-13.29),
            holding_ratio: dec!(100),
        }
    }

    #[test]
    fn instrument_code_strips_account_prefix() {
        assert_eq!(holding("A005930", dec!(1)).instrument_code(), "005930");
        assert_eq!(holding("005930", dec!(1)).instrument_code(), "005930");
        assert_eq!(holding("A", dec!(1)).instrument_code(), "A");
    }

    #[test]
    fn cash_is_deposit_minus_evaluation() {
        let summary = AccountSummary {
            total_evaluation: dec!(600000),
            estimated_deposit_assets: dec!(1000000),
            ..AccountSummary::default()
        };
        assert_eq!(summary.cash(), dec!(400000));

        let underwater = AccountSummary {
            total_evaluation: dec!(600000),
            estimated_deposit_assets: dec!(500000),
            ..AccountSummary::default()
        };
        assert_eq!(underwater.cash(), Decimal::ZERO);
    }

    #[test]
    fn instrument_codes_skip_empty_positions() {
        let balance = AccountBalance {
            summary: AccountSummary::default(),
            holdings: vec![
                holding("A005930", dec!(10)),
                holding("A000660", dec!(0)),
                holding("A035420", dec!(3)),
            ],
        };
        assert_eq!(balance.instrument_codes(), vec!["005930", "035420"]);
    }
}
