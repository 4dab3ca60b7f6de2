//! Checkpoint repository, the tracker's durable state

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One open position row. Quantity and cost basis are TEXT-encoded
/// decimals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionRecord {
    pub wallet: String,
    pub token: String,
    pub quantity: String,
    pub cost_basis: String,
    pub updated_at: Option<i64>,
}

/// Per-wallet P&L totals at checkpoint time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PnlRow {
    pub wallet: String,
    pub realized: String,
    pub unrealized: String,
    pub updated_at: Option<i64>,
}

/// One metrics snapshot row; history is append-only
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRecord {
    pub id: Option<i64>,
    pub wallet: String,
    pub window_days: i64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub win_rate_defined: i64,
    pub trade_count: i64,
    pub realized_pnl: String,
    pub grade: String,
    pub computed_at: i64,
}

/// Repository for tracker checkpoints
pub struct CheckpointRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CheckpointRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the stored positions and P&L totals with the given sets
    /// and append the snapshots, all in one transaction.
    pub async fn save_checkpoint(
        &self,
        positions: &[PositionRecord],
        pnl: &[PnlRow],
        snapshots: &[SnapshotRecord],
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM positions").execute(&mut *tx).await?;
        for rec in positions {
            sqlx::query(
                r#"
                INSERT INTO positions (wallet, token, quantity, cost_basis, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&rec.wallet)
            .bind(&rec.token)
            .bind(&rec.quantity)
            .bind(&rec.cost_basis)
            .bind(rec.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM pnl_records").execute(&mut *tx).await?;
        for row in pnl {
            sqlx::query(
                r#"
                INSERT INTO pnl_records (wallet, realized, unrealized, updated_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&row.wallet)
            .bind(&row.realized)
            .bind(&row.unrealized)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for snap in snapshots {
            sqlx::query(
                r#"
                INSERT INTO metrics_snapshots (
                    wallet, window_days,
                    annualized_return_pct, sharpe_ratio, max_drawdown_pct,
                    win_rate_pct, win_rate_defined, trade_count,
                    realized_pnl, grade, computed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&snap.wallet)
            .bind(snap.window_days)
            .bind(snap.annualized_return_pct)
            .bind(snap.sharpe_ratio)
            .bind(snap.max_drawdown_pct)
            .bind(snap.win_rate_pct)
            .bind(snap.win_rate_defined)
            .bind(snap.trade_count)
            .bind(&snap.realized_pnl)
            .bind(&snap.grade)
            .bind(snap.computed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn load_positions(&self) -> DbResult<Vec<PositionRecord>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT wallet, token, quantity, cost_basis, updated_at FROM positions",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    pub async fn load_pnl(&self) -> DbResult<Vec<PnlRow>> {
        let rows = sqlx::query_as::<_, PnlRow>(
            "SELECT wallet, realized, unrealized, updated_at FROM pnl_records",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Latest snapshot per (wallet, window)
    pub async fn load_latest_snapshots(&self) -> DbResult<Vec<SnapshotRecord>> {
        let records = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            WITH latest AS (
              SELECT id,
                ROW_NUMBER() OVER (
                  PARTITION BY wallet, window_days
                  ORDER BY computed_at DESC, id DESC
                ) AS rn
              FROM metrics_snapshots
            )
            SELECT s.id, s.wallet, s.window_days,
                   s.annualized_return_pct, s.sharpe_ratio, s.max_drawdown_pct,
                   s.win_rate_pct, s.win_rate_defined, s.trade_count,
                   s.realized_pnl, s.grade, s.computed_at
            FROM latest l
            JOIN metrics_snapshots s ON s.id = l.id
            WHERE l.rn = 1
            "#,
        )
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Snapshot history for one (wallet, window), newest first
    pub async fn snapshot_history(
        &self,
        wallet: &str,
        window_days: i64,
        limit: i64,
    ) -> DbResult<Vec<SnapshotRecord>> {
        let records = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            SELECT id, wallet, window_days,
                   annualized_return_pct, sharpe_ratio, max_drawdown_pct,
                   win_rate_pct, win_rate_defined, trade_count,
                   realized_pnl, grade, computed_at
            FROM metrics_snapshots
            WHERE wallet = ? AND window_days = ?
            ORDER BY computed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(wallet)
        .bind(window_days)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(records)
    }

    /// Remove every trace of a wallet
    pub async fn delete_wallet(&self, wallet: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM positions WHERE wallet = ?")
            .bind(wallet)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pnl_records WHERE wallet = ?")
            .bind(wallet)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM metrics_snapshots WHERE wallet = ?")
            .bind(wallet)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Trim snapshot history to the newest `keep` rows per (wallet, window)
    pub async fn prune_snapshots(&self, keep: i64) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM metrics_snapshots WHERE id IN (
              SELECT id FROM (
                SELECT id,
                  ROW_NUMBER() OVER (
                    PARTITION BY wallet, window_days
                    ORDER BY computed_at DESC, id DESC
                  ) AS rn
                FROM metrics_snapshots
              ) WHERE rn > ?
            )
            "#,
        )
        .bind(keep)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
