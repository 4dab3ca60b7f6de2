//! Rolling-window performance metrics
//!
//! Maintains per-wallet daily P&L samples and closed-trade outcomes, and
//! derives annualized return, Sharpe ratio, max drawdown, win rate, and
//! the grade bucket for each configured lookback window. Degenerate
//! inputs (no trades, zero variance) produce sentinel values, never a
//! division fault.

use crate::config::GradeThresholds;
use crate::types::{MetricsSnapshot, PositionDelta};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

const SECS_PER_DAY: i64 = 86_400;
const DAYS_PER_YEAR: f64 = 365.0;

struct ClosedTrade {
    day: i64,
    gain: Decimal,
}

#[derive(Default)]
pub struct MetricsBook {
    /// wallet -> UTC day -> realized P&L that day
    daily: HashMap<String, BTreeMap<i64, Decimal>>,
    closed: HashMap<String, Vec<ClosedTrade>>,
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

impl MetricsBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a ledger delta into the daily series. Only closing trades
    /// move realized P&L; buys leave the series untouched. Samples older
    /// than the largest window are pruned as new ones arrive.
    pub fn record_delta(&mut self, delta: &PositionDelta, max_window_days: u32) {
        if !delta.is_close() {
            return;
        }
        let day = delta.timestamp.div_euclid(SECS_PER_DAY);
        let days = self.daily.entry(delta.wallet.clone()).or_default();
        *days.entry(day).or_default() += delta.realized_gain;

        let trades = self.closed.entry(delta.wallet.clone()).or_default();
        trades.push(ClosedTrade {
            day,
            gain: delta.realized_gain,
        });

        let cutoff = day - i64::from(max_window_days) + 1;
        days.retain(|&d, _| d >= cutoff);
        trades.retain(|t| t.day >= cutoff);
    }

    /// Compute a full snapshot for one (wallet, window) pair.
    pub fn snapshot(
        &self,
        wallet: &str,
        window_days: u32,
        notional_base: Decimal,
        thresholds: &GradeThresholds,
        now: i64,
    ) -> MetricsSnapshot {
        let today = now.div_euclid(SECS_PER_DAY);
        let cutoff = today - i64::from(window_days) + 1;

        let samples: Vec<Decimal> = self
            .daily
            .get(wallet)
            .map(|days| days.range(cutoff..).map(|(_, pnl)| *pnl).collect())
            .unwrap_or_default();

        let realized_pnl: Decimal = samples.iter().copied().sum();

        // walk the equity curve: notional base plus cumulative daily P&L
        let base = to_f64(notional_base);
        let mut equity = base;
        let mut peak = base;
        let mut max_drawdown_pct = 0.0f64;
        let mut returns = Vec::with_capacity(samples.len());
        for pnl in &samples {
            let pnl = to_f64(*pnl);
            let r = if equity > 0.0 { pnl / equity } else { 0.0 };
            returns.push(r);
            equity += pnl;
            if equity > peak {
                peak = equity;
            }
            if peak > 0.0 {
                let dd = (peak - equity) / peak * 100.0;
                if dd > max_drawdown_pct {
                    max_drawdown_pct = dd;
                }
            }
        }

        let annualized_return_pct = annualize(&returns, window_days);
        let sharpe_ratio = sharpe(&returns);

        let (win_rate_pct, win_rate_defined, trade_count) = self.win_rate(wallet, cutoff);

        MetricsSnapshot {
            wallet: wallet.to_string(),
            window_days,
            annualized_return_pct,
            sharpe_ratio,
            max_drawdown_pct,
            win_rate_pct,
            win_rate_defined,
            trade_count,
            realized_pnl,
            grade: thresholds.grade_for(annualized_return_pct, sharpe_ratio),
            computed_at: now,
        }
    }

    fn win_rate(&self, wallet: &str, cutoff_day: i64) -> (f64, bool, u32) {
        let trades: Vec<&ClosedTrade> = self
            .closed
            .get(wallet)
            .map(|v| v.iter().filter(|t| t.day >= cutoff_day).collect())
            .unwrap_or_default();
        let total = trades.len();
        if total == 0 {
            // undefined, reported as 0 with the flag cleared
            return (0.0, false, 0);
        }
        let wins = trades.iter().filter(|t| t.gain > Decimal::ZERO).count();
        (wins as f64 / total as f64 * 100.0, true, total as u32)
    }

    pub fn remove_wallet(&mut self, wallet: &str) {
        self.daily.remove(wallet);
        self.closed.remove(wallet);
    }
}

/// Compounded daily return scaled to a year, in percent
fn annualize(returns: &[f64], window_days: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    if growth <= 0.0 {
        // equity wiped out within the window
        return -100.0;
    }
    (growth.powf(DAYS_PER_YEAR / f64::from(window_days)) - 1.0) * 100.0
}

/// Annualized Sharpe: mean(daily return) / stddev * sqrt(365).
/// Zero variance yields 0, not infinity or NaN.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev < 1e-12 {
        return 0.0;
    }
    mean / std_dev * DAYS_PER_YEAR.sqrt()
}
