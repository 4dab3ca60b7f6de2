//! Ingestion admission gate
//!
//! Validates, deduplicates, and orders incoming transaction events before
//! they reach the position ledger. Dedup keeps a bounded FIFO of seen
//! hashes; ordering is enforced per wallet only (cross-wallet ordering is
//! unconstrained).

use crate::error::IngestError;
use crate::types::TransactionEvent;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct IngestGate {
    seen: HashSet<String>,
    /// Insertion order of `seen`, for retention eviction
    seen_order: VecDeque<String>,
    retention: usize,
    /// Last accepted timestamp per wallet
    last_ts: HashMap<String, i64>,
}

impl IngestGate {
    pub fn new(retention: usize) -> Self {
        Self {
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            retention,
            last_ts: HashMap::new(),
        }
    }

    /// Admit or reject one event. On acceptance the hash and wallet
    /// timestamp are recorded; a rejected event leaves no trace.
    pub fn admit(&mut self, event: &TransactionEvent) -> Result<(), IngestError> {
        if event.amount <= Decimal::ZERO {
            return Err(IngestError::InvalidEventData(format!(
                "non-positive amount {}",
                event.amount
            )));
        }
        if event.price <= Decimal::ZERO {
            return Err(IngestError::InvalidEventData(format!(
                "non-positive price {}",
                event.price
            )));
        }
        if event.tx_hash.is_empty() {
            return Err(IngestError::InvalidEventData("empty tx hash".into()));
        }

        if self.seen.contains(&event.tx_hash) {
            return Err(IngestError::DuplicateEvent(event.tx_hash.clone()));
        }

        if let Some(&last) = self.last_ts.get(&event.wallet) {
            if event.timestamp < last {
                return Err(IngestError::OutOfOrderEvent {
                    wallet: event.wallet.clone(),
                    timestamp: event.timestamp,
                    last_seen: last,
                });
            }
        }

        self.seen.insert(event.tx_hash.clone());
        self.seen_order.push_back(event.tx_hash.clone());
        while self.seen_order.len() > self.retention {
            if let Some(evicted) = self.seen_order.pop_front() {
                self.seen.remove(&evicted);
            }
        }

        self.last_ts.insert(event.wallet.clone(), event.timestamp);
        Ok(())
    }

    /// Forget a wallet's ordering state (used when tracking stops)
    pub fn forget_wallet(&mut self, wallet: &str) {
        self.last_ts.remove(wallet);
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rust_decimal_macros::dec;

    #[test]
    fn test_accepts_valid_event() {
        let mut gate = IngestGate::new(100);
        let ev = fixtures::buy("0xw1", "ETH", dec!(10), dec!(100), 1_000, "0xh1");
        assert!(gate.admit(&ev).is_ok());
        assert_eq!(gate.seen_count(), 1);
    }

    #[test]
    fn test_rejects_duplicate_hash() {
        let mut gate = IngestGate::new(100);
        let first = fixtures::buy("0xw1", "ETH", dec!(10), dec!(100), 1_000, "0xabc");
        let second = fixtures::sell("0xw1", "ETH", dec!(5), dec!(120), 2_000, "0xabc");
        gate.admit(&first).unwrap();
        assert_eq!(
            gate.admit(&second),
            Err(IngestError::DuplicateEvent("0xabc".into()))
        );
    }

    #[test]
    fn test_rejects_non_positive_amount_and_price() {
        let mut gate = IngestGate::new(100);
        let zero_amount = fixtures::buy("0xw1", "ETH", dec!(0), dec!(100), 1_000, "0xh1");
        let neg_price = fixtures::buy("0xw1", "ETH", dec!(1), dec!(-5), 1_000, "0xh2");
        assert!(matches!(
            gate.admit(&zero_amount),
            Err(IngestError::InvalidEventData(_))
        ));
        assert!(matches!(
            gate.admit(&neg_price),
            Err(IngestError::InvalidEventData(_))
        ));
        // rejected events must not poison dedup or ordering state
        assert_eq!(gate.seen_count(), 0);
    }

    #[test]
    fn test_rejects_timestamp_regression_per_wallet() {
        let mut gate = IngestGate::new(100);
        gate.admit(&fixtures::buy("0xw1", "ETH", dec!(1), dec!(100), 2_000, "0xh1"))
            .unwrap();
        let stale = fixtures::buy("0xw1", "ETH", dec!(1), dec!(100), 1_500, "0xh2");
        assert!(matches!(
            gate.admit(&stale),
            Err(IngestError::OutOfOrderEvent { last_seen: 2_000, .. })
        ));
        // equal timestamps are fine (same block), other wallets unaffected
        gate.admit(&fixtures::buy("0xw1", "ETH", dec!(1), dec!(100), 2_000, "0xh3"))
            .unwrap();
        gate.admit(&fixtures::buy("0xw2", "ETH", dec!(1), dec!(100), 100, "0xh4"))
            .unwrap();
    }

    #[test]
    fn test_dedup_retention_evicts_oldest() {
        let mut gate = IngestGate::new(2);
        for i in 0..3 {
            gate.admit(&fixtures::buy(
                "0xw1",
                "ETH",
                dec!(1),
                dec!(100),
                1_000 + i,
                &format!("0xh{i}"),
            ))
            .unwrap();
        }
        assert_eq!(gate.seen_count(), 2);
        // oldest hash aged out of the retention window: re-admission is
        // possible again (the documented trade-off of bounded retention),
        // but the per-wallet timestamp check still applies
        let replay = fixtures::buy("0xw1", "ETH", dec!(1), dec!(100), 1_005, "0xh0");
        assert!(gate.admit(&replay).is_ok());
    }
}
