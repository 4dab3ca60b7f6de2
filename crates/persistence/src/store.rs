//! Checkpoint store abstraction
//!
//! The tracker checkpoints through this trait so the server can run on
//! SQLite while tests use the in-memory store.

use crate::repository::{CheckpointRepository, PnlRow, PositionRecord, SnapshotRecord};
use crate::{Database, DbResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Full durable state of the tracker at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointState {
    pub positions: Vec<PositionRecord>,
    pub pnl: Vec<PnlRow>,
    pub snapshots: Vec<SnapshotRecord>,
}

impl CheckpointState {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.pnl.is_empty() && self.snapshots.is_empty()
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, replacing positions and P&L and appending
    /// the snapshots to history.
    async fn save(&self, state: &CheckpointState) -> DbResult<()>;

    /// Load positions, P&L, and the latest snapshot per (wallet, window)
    async fn load(&self) -> DbResult<CheckpointState>;

    /// Snapshot history for one (wallet, window), newest first
    async fn history(
        &self,
        wallet: &str,
        window_days: i64,
        limit: i64,
    ) -> DbResult<Vec<SnapshotRecord>>;

    async fn delete_wallet(&self, wallet: &str) -> DbResult<()>;
}

pub struct SqliteCheckpointStore {
    db: Database,
    /// Snapshot history rows kept per (wallet, window)
    history_keep: i64,
}

impl SqliteCheckpointStore {
    pub fn new(db: Database, history_keep: i64) -> Self {
        Self { db, history_keep }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, state: &CheckpointState) -> DbResult<()> {
        let repo = CheckpointRepository::new(self.db.pool());
        repo.save_checkpoint(&state.positions, &state.pnl, &state.snapshots)
            .await?;
        let pruned = repo.prune_snapshots(self.history_keep).await?;
        debug!(
            positions = state.positions.len(),
            pnl = state.pnl.len(),
            snapshots = state.snapshots.len(),
            pruned,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self) -> DbResult<CheckpointState> {
        let repo = CheckpointRepository::new(self.db.pool());
        Ok(CheckpointState {
            positions: repo.load_positions().await?,
            pnl: repo.load_pnl().await?,
            snapshots: repo.load_latest_snapshots().await?,
        })
    }

    async fn history(
        &self,
        wallet: &str,
        window_days: i64,
        limit: i64,
    ) -> DbResult<Vec<SnapshotRecord>> {
        CheckpointRepository::new(self.db.pool())
            .snapshot_history(wallet, window_days, limit)
            .await
    }

    async fn delete_wallet(&self, wallet: &str) -> DbResult<()> {
        CheckpointRepository::new(self.db.pool())
            .delete_wallet(wallet)
            .await
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryCheckpointStore {
    state: Mutex<CheckpointState>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, state: &CheckpointState) -> DbResult<()> {
        let mut guard = self.state.lock().await;
        guard.positions = state.positions.clone();
        guard.pnl = state.pnl.clone();
        guard.snapshots.extend(state.snapshots.iter().cloned());
        Ok(())
    }

    async fn load(&self) -> DbResult<CheckpointState> {
        let guard = self.state.lock().await;
        // latest snapshot per (wallet, window), mirroring the SQL store
        let mut latest: Vec<SnapshotRecord> = Vec::new();
        for snap in guard.snapshots.iter().rev() {
            if !latest
                .iter()
                .any(|s| s.wallet == snap.wallet && s.window_days == snap.window_days)
            {
                latest.push(snap.clone());
            }
        }
        Ok(CheckpointState {
            positions: guard.positions.clone(),
            pnl: guard.pnl.clone(),
            snapshots: latest,
        })
    }

    async fn history(
        &self,
        wallet: &str,
        window_days: i64,
        limit: i64,
    ) -> DbResult<Vec<SnapshotRecord>> {
        let guard = self.state.lock().await;
        Ok(guard
            .snapshots
            .iter()
            .filter(|s| s.wallet == wallet && s.window_days == window_days)
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_wallet(&self, wallet: &str) -> DbResult<()> {
        let mut guard = self.state.lock().await;
        guard.positions.retain(|p| p.wallet != wallet);
        guard.pnl.retain(|p| p.wallet != wallet);
        guard.snapshots.retain(|s| s.wallet != wallet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(wallet: &str, token: &str, qty: &str, basis: &str) -> PositionRecord {
        PositionRecord {
            wallet: wallet.to_string(),
            token: token.to_string(),
            quantity: qty.to_string(),
            cost_basis: basis.to_string(),
            updated_at: Some(1_700_000_000),
        }
    }

    fn pnl(wallet: &str, realized: &str) -> PnlRow {
        PnlRow {
            wallet: wallet.to_string(),
            realized: realized.to_string(),
            unrealized: "0".to_string(),
            updated_at: Some(1_700_000_000),
        }
    }

    fn snapshot(wallet: &str, window: i64, ret: f64, at: i64) -> SnapshotRecord {
        SnapshotRecord {
            id: None,
            wallet: wallet.to_string(),
            window_days: window,
            annualized_return_pct: ret,
            sharpe_ratio: 1.0,
            max_drawdown_pct: 5.0,
            win_rate_pct: 60.0,
            win_rate_defined: 1,
            trade_count: 5,
            realized_pnl: "123.45".to_string(),
            grade: "B".to_string(),
            computed_at: at,
        }
    }

    async fn sqlite_store() -> SqliteCheckpointStore {
        let db = Database::in_memory().await.expect("in-memory db");
        SqliteCheckpointStore::new(db, 8)
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let store = sqlite_store().await;
        let state = CheckpointState {
            positions: vec![position("0xw1", "ETH", "10", "100.5")],
            pnl: vec![pnl("0xw1", "500")],
            snapshots: vec![snapshot("0xw1", 30, 42.0, 100)],
        };
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.positions.len(), 1);
        assert_eq!(loaded.positions[0].quantity, "10");
        assert_eq!(loaded.positions[0].cost_basis, "100.5");
        assert_eq!(loaded.pnl[0].realized, "500");
        assert_eq!(loaded.snapshots.len(), 1);
        assert_eq!(loaded.snapshots[0].grade, "B");
    }

    #[tokio::test]
    async fn test_save_replaces_positions_but_appends_history() {
        let store = sqlite_store().await;
        let first = CheckpointState {
            positions: vec![position("0xw1", "ETH", "10", "100")],
            pnl: vec![pnl("0xw1", "0")],
            snapshots: vec![snapshot("0xw1", 30, 10.0, 100)],
        };
        store.save(&first).await.unwrap();

        let second = CheckpointState {
            positions: vec![position("0xw1", "SOL", "3", "20")],
            pnl: vec![pnl("0xw1", "50")],
            snapshots: vec![snapshot("0xw1", 30, 20.0, 200)],
        };
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap();
        // positions replaced wholesale
        assert_eq!(loaded.positions.len(), 1);
        assert_eq!(loaded.positions[0].token, "SOL");
        // latest snapshot wins, older one remains in history
        assert_eq!(loaded.snapshots.len(), 1);
        assert_eq!(loaded.snapshots[0].annualized_return_pct, 20.0);
        let history = store.history("0xw1", 30, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].computed_at, 200);
        assert_eq!(history[1].computed_at, 100);
    }

    #[tokio::test]
    async fn test_history_pruned_to_keep_limit() {
        let db = Database::in_memory().await.expect("in-memory db");
        let store = SqliteCheckpointStore::new(db, 2);
        for i in 0..5 {
            let state = CheckpointState {
                positions: vec![],
                pnl: vec![],
                snapshots: vec![snapshot("0xw1", 30, i as f64, i)],
            };
            store.save(&state).await.unwrap();
        }
        let history = store.history("0xw1", 30, 100).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].computed_at, 4);
        assert_eq!(history[1].computed_at, 3);
    }

    #[tokio::test]
    async fn test_delete_wallet_removes_all_rows() {
        let store = sqlite_store().await;
        let state = CheckpointState {
            positions: vec![
                position("0xw1", "ETH", "10", "100"),
                position("0xw2", "ETH", "5", "90"),
            ],
            pnl: vec![pnl("0xw1", "1"), pnl("0xw2", "2")],
            snapshots: vec![snapshot("0xw1", 30, 1.0, 1), snapshot("0xw2", 30, 2.0, 1)],
        };
        store.save(&state).await.unwrap();

        store.delete_wallet("0xw1").await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.positions.len(), 1);
        assert_eq!(loaded.positions[0].wallet, "0xw2");
        assert_eq!(loaded.pnl.len(), 1);
        assert_eq!(loaded.snapshots.len(), 1);
        assert!(store.history("0xw1", 30, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_mirrors_sqlite_semantics() {
        let store = MemoryCheckpointStore::new();
        let first = CheckpointState {
            positions: vec![position("0xw1", "ETH", "10", "100")],
            pnl: vec![pnl("0xw1", "0")],
            snapshots: vec![snapshot("0xw1", 30, 10.0, 100)],
        };
        store.save(&first).await.unwrap();
        let second = CheckpointState {
            positions: vec![position("0xw1", "ETH", "4", "100")],
            pnl: vec![pnl("0xw1", "600")],
            snapshots: vec![snapshot("0xw1", 30, 25.0, 200)],
        };
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.positions[0].quantity, "4");
        assert_eq!(loaded.snapshots.len(), 1);
        assert_eq!(loaded.snapshots[0].annualized_return_pct, 25.0);
        assert_eq!(store.history("0xw1", 30, 10).await.unwrap().len(), 2);
    }
}
