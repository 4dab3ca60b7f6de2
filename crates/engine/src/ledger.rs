//! Position ledger
//!
//! Per-wallet, per-token running positions with weighted-average cost
//! basis. Sells never go short: the covered portion applies and the
//! excess is reported on the delta as an overdrawn condition.

use crate::types::{Position, PositionDelta, TradeAction, TransactionEvent};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct PositionLedger {
    positions: HashMap<(String, String), Position>,
    /// token -> wallets currently holding it, for re-marking
    holders: HashMap<String, HashSet<String>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one admitted event and report what changed.
    pub fn apply(&mut self, event: &TransactionEvent) -> PositionDelta {
        match event.action {
            TradeAction::Buy => self.apply_buy(event),
            // A swap disposes of the named token, same as a sell
            TradeAction::Sell | TradeAction::Swap => self.apply_sell(event),
        }
    }

    fn apply_buy(&mut self, event: &TransactionEvent) -> PositionDelta {
        let key = (event.wallet.clone(), event.token.clone());
        let pos = self.positions.entry(key).or_insert(Position {
            quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
        });

        let new_qty = pos.quantity + event.amount;
        // weighted average: (old_qty*old_cost + new_qty*price) / total
        pos.cost_basis =
            (pos.quantity * pos.cost_basis + event.amount * event.price) / new_qty;
        pos.quantity = new_qty;

        let (quantity_after, cost_basis_after) = (pos.quantity, pos.cost_basis);
        self.holders
            .entry(event.token.clone())
            .or_default()
            .insert(event.wallet.clone());

        PositionDelta {
            wallet: event.wallet.clone(),
            token: event.token.clone(),
            action: event.action,
            realized_gain: Decimal::ZERO,
            closed_qty: Decimal::ZERO,
            overdrawn: None,
            quantity_after,
            cost_basis_after,
            price: event.price,
            timestamp: event.timestamp,
        }
    }

    fn apply_sell(&mut self, event: &TransactionEvent) -> PositionDelta {
        let key = (event.wallet.clone(), event.token.clone());
        let held = self
            .positions
            .get(&key)
            .cloned()
            .unwrap_or(Position {
                quantity: Decimal::ZERO,
                cost_basis: Decimal::ZERO,
            });

        let sold = event.amount.min(held.quantity);
        let excess = event.amount - sold;
        let realized_gain = (event.price - held.cost_basis) * sold;
        let quantity_after = held.quantity - sold;

        let cost_basis_after = if quantity_after.is_zero() {
            // closed out: prune so the next buy establishes a fresh basis
            self.positions.remove(&key);
            if let Some(wallets) = self.holders.get_mut(&event.token) {
                wallets.remove(&event.wallet);
            }
            Decimal::ZERO
        } else {
            if let Some(pos) = self.positions.get_mut(&key) {
                pos.quantity = quantity_after;
            }
            held.cost_basis
        };

        PositionDelta {
            wallet: event.wallet.clone(),
            token: event.token.clone(),
            action: event.action,
            realized_gain,
            closed_qty: sold,
            overdrawn: (excess > Decimal::ZERO).then_some(excess),
            quantity_after,
            cost_basis_after,
            price: event.price,
            timestamp: event.timestamp,
        }
    }

    pub fn position(&self, wallet: &str, token: &str) -> Option<&Position> {
        self.positions
            .get(&(wallet.to_string(), token.to_string()))
    }

    /// Open positions for one wallet
    pub fn positions_of<'a>(
        &'a self,
        wallet: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Position)> + 'a {
        self.positions
            .iter()
            .filter(move |((w, _), _)| w == wallet)
            .map(|((_, t), p)| (t.as_str(), p))
    }

    /// Wallets currently holding a token
    pub fn holders_of(&self, token: &str) -> Vec<String> {
        self.holders
            .get(token)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every position a wallet holds
    pub fn remove_wallet(&mut self, wallet: &str) {
        self.positions.retain(|(w, _), _| w != wallet);
        for wallets in self.holders.values_mut() {
            wallets.remove(wallet);
        }
    }

    /// All positions, for checkpointing
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &Position)> {
        self.positions
            .iter()
            .map(|((w, t), p)| (w.as_str(), t.as_str(), p))
    }

    /// Restore a position from a checkpoint
    pub fn restore(&mut self, wallet: String, token: String, position: Position) {
        if position.quantity > Decimal::ZERO {
            self.holders
                .entry(token.clone())
                .or_default()
                .insert(wallet.clone());
            self.positions.insert((wallet, token), position);
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
