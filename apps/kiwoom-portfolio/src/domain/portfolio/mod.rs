//! Portfolio Valuation
//!
//! Merges an [`AccountBalance`] with the latest-price board. The current
//! price of each holding is the live tick when one exists and the price
//! reported by the account endpoint otherwise. Every ratio is zero when its
//! denominator is zero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::holdings::{AccountBalance, HoldingRecord};
use super::ticks::PriceBoard;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Where a holding's current price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Realtime tick stream.
    Live,
    /// Account balance response.
    Rest,
}

/// Valuation of one holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingValuation {
    /// Display name.
    pub name: String,
    /// Bare instrument code.
    pub code: String,
    /// Quantity held.
    pub quantity: Decimal,
    /// Average purchase price.
    pub purchase_price: Decimal,
    /// Price used for valuation.
    pub current_price: Decimal,
    /// Origin of `current_price`.
    pub price_source: PriceSource,
    /// `current_price * quantity`.
    pub evaluation: Decimal,
    /// Unrealized profit, truncated to whole units.
    pub profit: Decimal,
    /// Profit over cost basis in percent.
    pub profit_rate: Decimal,
    /// Share of total assets in percent.
    pub weight: Decimal,
}

/// Account-level totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioTotals {
    /// Stock value plus cash.
    pub total_assets: Decimal,
    /// Sum of holding evaluations.
    pub stock_value: Decimal,
    /// Cash derived from the account summary.
    pub cash: Decimal,
    /// Sum of holding profits.
    pub total_profit: Decimal,
    /// Stock value over total assets in percent.
    pub stock_share: Decimal,
    /// Cash over total assets in percent.
    pub cash_share: Decimal,
    /// Total profit over stock value in percent.
    pub total_profit_rate: Decimal,
}

/// Point-in-time portfolio valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioSnapshot {
    /// Per-holding rows, in account order.
    pub holdings: Vec<HoldingValuation>,
    /// Account totals.
    pub totals: PortfolioTotals,
    /// Whether the realtime feed was streaming when computed.
    pub live_feed: bool,
    /// Number of holdings priced from the live feed.
    pub live_priced: usize,
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        (numerator / denominator * HUNDRED).round_dp(2)
    }
}

fn value_holding(holding: &HoldingRecord, board: &PriceBoard) -> HoldingValuation {
    let code = holding.instrument_code().to_string();
    let (current_price, price_source) = board
        .price(&code)
        .map_or((holding.current_price, PriceSource::Rest), |p| {
            (p, PriceSource::Live)
        });

    let evaluation = current_price * holding.quantity;
    let profit = ((current_price - holding.purchase_price) * holding.quantity).trunc();
    let profit_rate = if holding.purchase_price > Decimal::ZERO {
        ratio(current_price - holding.purchase_price, holding.purchase_price)
    } else {
        Decimal::ZERO
    };

    HoldingValuation {
        name: holding.name.clone(),
        code,
        quantity: holding.quantity,
        purchase_price: holding.purchase_price,
        current_price,
        price_source,
        evaluation,
        profit,
        profit_rate,
        weight: Decimal::ZERO,
    }
}

impl PortfolioSnapshot {
    /// Value the balance against the price board.
    ///
    /// Holdings with zero quantity are skipped.
    #[must_use]
    pub fn compute(balance: &AccountBalance, board: &PriceBoard, live_feed: bool) -> Self {
        let mut holdings: Vec<HoldingValuation> = balance
            .holdings
            .iter()
            .filter(|h| h.is_held())
            .map(|h| value_holding(h, board))
            .collect();

        let stock_value: Decimal = holdings.iter().map(|h| h.evaluation).sum();
        let total_profit: Decimal = holdings.iter().map(|h| h.profit).sum();
        let cash = balance.summary.cash();
        let total_assets = stock_value + cash;

        for holding in &mut holdings {
            holding.weight = ratio(holding.evaluation, total_assets);
        }

        let live_priced = holdings
            .iter()
            .filter(|h| h.price_source == PriceSource::Live)
            .count();

        Self {
            holdings,
            totals: PortfolioTotals {
                total_assets,
                stock_value,
                cash,
                total_profit,
                stock_share: ratio(stock_value, total_assets),
                cash_share: ratio(cash, total_assets),
                total_profit_rate: ratio(total_profit, stock_value),
            },
            live_feed,
            live_priced,
            computed_at: Utc::now(),
        }
    }
}
