//! Core domain types for the wallet performance engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Action carried by a transaction event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    /// Token-for-token exchange; applied as a disposal of `token`
    Swap,
}

/// A single on-chain trade event, immutable once ingested.
/// Deduplicated by `tx_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub wallet: String,
    pub token: String,
    pub action: TradeAction,
    pub amount: Decimal,
    pub price: Decimal,
    /// Epoch seconds
    pub timestamp: i64,
    pub tx_hash: String,
}

/// Open position for one (wallet, token) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    /// Weighted-average cost per unit
    pub cost_basis: Decimal,
}

/// Result of applying one event to the position ledger
#[derive(Debug, Clone)]
pub struct PositionDelta {
    pub wallet: String,
    pub token: String,
    pub action: TradeAction,
    /// Gain realized on the closed portion: (price - cost_basis) * closed_qty
    pub realized_gain: Decimal,
    /// Quantity actually closed by this event
    pub closed_qty: Decimal,
    /// Sell quantity that exceeded the held amount and was not applied
    pub overdrawn: Option<Decimal>,
    pub quantity_after: Decimal,
    pub cost_basis_after: Decimal,
    pub price: Decimal,
    pub timestamp: i64,
}

impl PositionDelta {
    /// True when the event reduced an open position
    pub fn is_close(&self) -> bool {
        self.closed_qty > Decimal::ZERO
    }
}

/// Running P&L totals for one wallet.
/// Published whole and replaced atomically, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnLRecord {
    pub wallet: String,
    /// Sum of closed-trade gains
    pub realized: Decimal,
    /// Open positions marked at the latest observed price
    pub unrealized: Decimal,
    pub total: Decimal,
    pub updated_at: i64,
}

/// Performance grade buckets, best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "S" => Some(Self::S),
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }
}

/// Rolling-window performance metrics for one wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub wallet: String,
    pub window_days: u32,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    /// False when the wallet closed no trades in the window
    pub win_rate_defined: bool,
    /// Closed trades in the window
    pub trade_count: u32,
    /// Realized P&L summed over the window
    pub realized_pnl: Decimal,
    pub grade: Grade,
    pub computed_at: i64,
}

/// Metric a leaderboard ordering is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMetric {
    AnnualizedReturn,
    SharpeRatio,
    WinRate,
    RealizedPnl,
}

impl SortMetric {
    pub const ALL: [SortMetric; 4] = [
        SortMetric::AnnualizedReturn,
        SortMetric::SharpeRatio,
        SortMetric::WinRate,
        SortMetric::RealizedPnl,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "annualized_return" | "annual_return_pct" => Some(Self::AnnualizedReturn),
            "sharpe_ratio" | "sharpe" => Some(Self::SharpeRatio),
            "win_rate" => Some(Self::WinRate),
            "realized_pnl" | "pnl" => Some(Self::RealizedPnl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnnualizedReturn => "annualized_return",
            Self::SharpeRatio => "sharpe_ratio",
            Self::WinRate => "win_rate",
            Self::RealizedPnl => "realized_pnl",
        }
    }

    /// Extract this metric's value from a snapshot as an orderable Decimal.
    /// f64 is not Ord; non-finite stats collapse to zero.
    pub fn value_of(&self, snap: &MetricsSnapshot) -> Decimal {
        let from_f64 = |v: f64| Decimal::from_f64_retain(v).unwrap_or(Decimal::ZERO);
        match self {
            Self::AnnualizedReturn => from_f64(snap.annualized_return_pct),
            Self::SharpeRatio => from_f64(snap.sharpe_ratio),
            Self::WinRate => from_f64(snap.win_rate_pct),
            Self::RealizedPnl => snap.realized_pnl,
        }
    }
}

/// One row of a ranked leaderboard page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based, consistent with the strict ordering at read time
    pub rank: usize,
    pub wallet: String,
    pub value: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_metric_parse_roundtrip() {
        for metric in SortMetric::ALL {
            assert_eq!(SortMetric::parse(metric.as_str()), Some(metric));
        }
        assert_eq!(SortMetric::parse("garbage"), None);
    }

    #[test]
    fn test_action_serde_lowercase() {
        assert_eq!(serde_json::to_string(&TradeAction::Buy).unwrap(), "\"buy\"");
        assert_eq!(
            serde_json::from_str::<TradeAction>("\"swap\"").unwrap(),
            TradeAction::Swap
        );
    }

    #[test]
    fn test_grade_parse() {
        assert_eq!(Grade::parse("S"), Some(Grade::S));
        assert_eq!(Grade::parse("x"), None);
        assert_eq!(Grade::A.as_str(), "A");
    }
}
