//! Database schema definitions

/// SQL to create all tables
/// NOTE: All prices/amounts stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Open positions at the latest checkpoint
CREATE TABLE IF NOT EXISTS positions (
    wallet TEXT NOT NULL,
    token TEXT NOT NULL,
    quantity TEXT NOT NULL DEFAULT '0',
    cost_basis TEXT NOT NULL DEFAULT '0',
    updated_at INTEGER,
    PRIMARY KEY (wallet, token)
);

-- Realized/unrealized P&L totals at the latest checkpoint
CREATE TABLE IF NOT EXISTS pnl_records (
    wallet TEXT PRIMARY KEY,
    realized TEXT NOT NULL DEFAULT '0',
    unrealized TEXT NOT NULL DEFAULT '0',
    updated_at INTEGER
);

-- Append-only metrics snapshot history
CREATE TABLE IF NOT EXISTS metrics_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet TEXT NOT NULL,
    window_days INTEGER NOT NULL,
    annualized_return_pct REAL NOT NULL DEFAULT 0,
    sharpe_ratio REAL NOT NULL DEFAULT 0,
    max_drawdown_pct REAL NOT NULL DEFAULT 0,
    win_rate_pct REAL NOT NULL DEFAULT 0,
    win_rate_defined INTEGER NOT NULL DEFAULT 0,
    trade_count INTEGER NOT NULL DEFAULT 0,
    realized_pnl TEXT NOT NULL DEFAULT '0',
    grade TEXT NOT NULL DEFAULT 'D',
    computed_at INTEGER NOT NULL
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_positions_wallet ON positions(wallet);
CREATE INDEX IF NOT EXISTS idx_snapshots_wallet_window
    ON metrics_snapshots(wallet, window_days, computed_at DESC)
"#;
