//! Smart Money Tracker Engine
//!
//! In-memory pipeline for following high-performing wallets:
//! - ingestion gate with dedup, ordering, and backpressure
//! - position ledger with weighted-average cost basis
//! - realized/unrealized P&L calculator
//! - rolling-window performance metrics and grading
//! - incrementally maintained leaderboard index
//!
//! The `tracker` module wires these into a sharded worker pool and is the
//! entry point for embedding the pipeline.

pub mod config;
pub mod error;
pub mod ingest;
pub mod leaderboard;
pub mod ledger;
pub mod metrics;
pub mod pnl;
pub mod tracker;
pub mod types;

// Re-exports for convenience
pub use config::{GradeThresholds, TrackerConfig};
pub use error::IngestError;
pub use tracker::{SmartMoneyTracker, WalletOverview};
pub use types::{
    Grade, LeaderboardRow, MetricsSnapshot, PnLRecord, Position, PositionDelta, SortMetric,
    TradeAction, TransactionEvent,
};
