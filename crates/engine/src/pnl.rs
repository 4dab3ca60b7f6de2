//! P&L calculator
//!
//! Accumulates realized gains from ledger deltas and marks open positions
//! at the latest observed price per token. Records are built whole so a
//! reader can never see half-updated totals.

use crate::ledger::PositionLedger;
use crate::types::{PnLRecord, PositionDelta};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Default)]
pub struct PnlBook {
    realized: HashMap<String, Decimal>,
    /// token -> latest observed price
    marks: HashMap<String, Decimal>,
}

impl PnlBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a ledger delta into the running totals. The trade price is
    /// also the freshest mark for the token.
    pub fn on_delta(&mut self, delta: &PositionDelta) {
        if delta.is_close() {
            *self.realized.entry(delta.wallet.clone()).or_default() += delta.realized_gain;
        }
        self.marks.insert(delta.token.clone(), delta.price);
    }

    /// Record a price observed without a trade
    pub fn on_mark(&mut self, token: &str, price: Decimal) {
        self.marks.insert(token.to_string(), price);
    }

    pub fn mark(&self, token: &str) -> Option<Decimal> {
        self.marks.get(token).copied()
    }

    pub fn realized(&self, wallet: &str) -> Decimal {
        self.realized.get(wallet).copied().unwrap_or_default()
    }

    /// Build a complete record for one wallet. Unrealized is
    /// (mark - cost_basis) * quantity per open position; a token with no
    /// observed mark yet contributes nothing.
    pub fn record_for(&self, wallet: &str, ledger: &PositionLedger, now: i64) -> PnLRecord {
        let realized = self.realized(wallet);
        let mut unrealized = Decimal::ZERO;
        for (token, pos) in ledger.positions_of(wallet) {
            if let Some(mark) = self.mark(token) {
                unrealized += (mark - pos.cost_basis) * pos.quantity;
            }
        }
        PnLRecord {
            wallet: wallet.to_string(),
            realized,
            unrealized,
            total: realized + unrealized,
            updated_at: now,
        }
    }

    pub fn remove_wallet(&mut self, wallet: &str) {
        self.realized.remove(wallet);
    }

    /// Realized totals, for checkpointing
    pub fn entries(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.realized.iter().map(|(w, v)| (w.as_str(), *v))
    }

    /// Restore a realized total from a checkpoint
    pub fn restore_realized(&mut self, wallet: String, realized: Decimal) {
        self.realized.insert(wallet, realized);
    }
}
