//! Tracker configuration
//!
//! All tunables live here so the pipeline carries no magic numbers:
//! worker pool shape, dedup retention, metric windows, and the grade
//! threshold table.

use crate::types::Grade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Minimum (annualized return %, Sharpe) per grade.
/// The mapping is total: the first grade whose minima are both met wins,
/// anything else (including NaN inputs) falls through to D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub s_min_return: f64,
    pub s_min_sharpe: f64,
    pub a_min_return: f64,
    pub a_min_sharpe: f64,
    pub b_min_return: f64,
    pub b_min_sharpe: f64,
    pub c_min_return: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            s_min_return: 100.0,
            s_min_sharpe: 2.0,
            a_min_return: 50.0,
            a_min_sharpe: 1.0,
            b_min_return: 20.0,
            b_min_sharpe: 0.5,
            c_min_return: 0.0,
        }
    }
}

impl GradeThresholds {
    /// Deterministic, total grade assignment.
    /// NaN fails every `>=` comparison and lands on D.
    pub fn grade_for(&self, annualized_return_pct: f64, sharpe_ratio: f64) -> Grade {
        if annualized_return_pct >= self.s_min_return && sharpe_ratio >= self.s_min_sharpe {
            Grade::S
        } else if annualized_return_pct >= self.a_min_return && sharpe_ratio >= self.a_min_sharpe {
            Grade::A
        } else if annualized_return_pct >= self.b_min_return && sharpe_ratio >= self.b_min_sharpe {
            Grade::B
        } else if annualized_return_pct >= self.c_min_return {
            Grade::C
        } else {
            Grade::D
        }
    }
}

/// Configuration for the tracker pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Worker tasks; wallets are sharded across them by address hash
    pub workers: usize,
    /// Bounded pending-event queue per worker; full queue rejects ingestion
    pub queue_capacity: usize,
    /// Transaction hashes retained for dedup (FIFO eviction beyond this)
    pub dedup_retention: usize,
    /// Rolling metric windows, in days
    pub windows: Vec<u32>,
    /// Window the leaderboard and wallet overviews default to
    pub default_window: u32,
    /// Notional equity base the daily return series compounds on
    pub notional_base: Decimal,
    /// Snapshots retained per (wallet, window) for the history query
    pub history_cap: usize,
    pub grade_thresholds: GradeThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            dedup_retention: 100_000,
            windows: vec![30, 90, 365],
            default_window: 30,
            notional_base: dec!(10000),
            history_cap: 64,
            grade_thresholds: GradeThresholds::default(),
        }
    }
}

impl TrackerConfig {
    /// Largest configured window; samples older than this are pruned
    pub fn max_window(&self) -> u32 {
        self.windows.iter().copied().max().unwrap_or(365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_thresholds_total() {
        let t = GradeThresholds::default();
        assert_eq!(t.grade_for(300.0, 3.0), Grade::S);
        assert_eq!(t.grade_for(60.0, 1.5), Grade::A);
        assert_eq!(t.grade_for(25.0, 0.7), Grade::B);
        assert_eq!(t.grade_for(5.0, 0.1), Grade::C);
        assert_eq!(t.grade_for(-40.0, -1.0), Grade::D);
        // high return with poor risk adjustment degrades
        assert_eq!(t.grade_for(300.0, 0.1), Grade::C);
    }

    #[test]
    fn test_grade_nan_maps_to_d() {
        let t = GradeThresholds::default();
        assert_eq!(t.grade_for(f64::NAN, 1.0), Grade::D);
        assert_eq!(t.grade_for(f64::NAN, f64::NAN), Grade::D);
    }

    #[test]
    fn test_default_config_windows() {
        let cfg = TrackerConfig::default();
        assert!(cfg.windows.contains(&cfg.default_window));
        assert_eq!(cfg.max_window(), 365);
    }
}
