//! Leaderboard index
//!
//! Incrementally maintained ordered index over tracked wallets, one
//! ordering per (window, sort metric). Keys sort by metric value
//! descending with wallet address ascending as the deterministic
//! tie-break, so upsert is O(log n) and a top-k page is a prefix walk
//! with no resort.

use crate::types::{LeaderboardRow, MetricsSnapshot, SortMetric};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RankKey {
    value: Decimal,
    wallet: String,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // descending by value, ascending by wallet
        other
            .value
            .cmp(&self.value)
            .then_with(|| self.wallet.cmp(&other.wallet))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

type OrderKey = (u32, SortMetric);

#[derive(Default)]
pub struct LeaderboardIndex {
    orders: HashMap<OrderKey, BTreeSet<RankKey>>,
    /// Current key per (wallet, window, metric), so upsert can drop the
    /// stale entry before inserting the replacement
    current: HashMap<(String, u32, SortMetric), Decimal>,
}

impl LeaderboardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-rank one wallet under every metric from its latest snapshot.
    pub fn upsert(&mut self, snap: &MetricsSnapshot) {
        for metric in SortMetric::ALL {
            let value = metric.value_of(snap);
            let order_key = (snap.window_days, metric);
            let cur_key = (snap.wallet.clone(), snap.window_days, metric);

            let order = self.orders.entry(order_key).or_default();
            if let Some(old) = self.current.get(&cur_key) {
                order.remove(&RankKey {
                    value: *old,
                    wallet: snap.wallet.clone(),
                });
            }
            order.insert(RankKey {
                value,
                wallet: snap.wallet.clone(),
            });
            self.current.insert(cur_key, value);
        }
    }

    /// Ranked page: `n` rows starting at `offset`, sorted descending by
    /// the chosen metric with ties broken by ascending wallet address.
    pub fn top(&self, n: usize, metric: SortMetric, window: u32, offset: usize) -> Vec<LeaderboardRow> {
        self.orders
            .get(&(window, metric))
            .map(|order| {
                order
                    .iter()
                    .skip(offset)
                    .take(n)
                    .enumerate()
                    .map(|(i, key)| LeaderboardRow {
                        rank: offset + i + 1,
                        wallet: key.wallet.clone(),
                        value: key.value,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 1-based rank of a wallet under a metric, if tracked.
    pub fn rank_of(&self, wallet: &str, metric: SortMetric, window: u32) -> Option<usize> {
        let value = *self
            .current
            .get(&(wallet.to_string(), window, metric))?;
        let order = self.orders.get(&(window, metric))?;
        let probe = RankKey {
            value,
            wallet: wallet.to_string(),
        };
        // position within the ordering; std has no order-statistic tree
        order.iter().position(|k| *k == probe).map(|i| i + 1)
    }

    /// Remove a wallet from every ordering (stale entries are dropped,
    /// not hidden).
    pub fn remove(&mut self, wallet: &str) {
        self.current.retain(|(w, window, metric), value| {
            if w == wallet {
                if let Some(order) = self.orders.get_mut(&(*window, *metric)) {
                    order.remove(&RankKey {
                        value: *value,
                        wallet: wallet.to_string(),
                    });
                }
                false
            } else {
                true
            }
        });
    }

    /// Tracked wallet count under one ordering
    pub fn len(&self, metric: SortMetric, window: u32) -> usize {
        self.orders
            .get(&(window, metric))
            .map(|o| o.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn index_with(wallets: &[(&str, f64)]) -> LeaderboardIndex {
        let mut index = LeaderboardIndex::new();
        for (wallet, ret) in wallets {
            index.upsert(&fixtures::snapshot(wallet, 30, *ret));
        }
        index
    }

    #[test]
    fn test_top_sorted_descending_with_wallet_tiebreak() {
        let index = index_with(&[
            ("0xbbb", 50.0),
            ("0xaaa", 50.0),
            ("0xccc", 80.0),
            ("0xddd", 10.0),
        ]);
        let rows = index.top(10, SortMetric::AnnualizedReturn, 30, 0);
        let wallets: Vec<&str> = rows.iter().map(|r| r.wallet.as_str()).collect();
        // ties at 50.0 break by ascending address
        assert_eq!(wallets, vec!["0xccc", "0xaaa", "0xbbb", "0xddd"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[3].rank, 4);
    }

    #[test]
    fn test_top_length_is_min_of_n_and_tracked() {
        let index = index_with(&[("0xa", 1.0), ("0xb", 2.0)]);
        assert_eq!(index.top(10, SortMetric::AnnualizedReturn, 30, 0).len(), 2);
        assert_eq!(index.top(1, SortMetric::AnnualizedReturn, 30, 0).len(), 1);
        assert_eq!(index.top(0, SortMetric::AnnualizedReturn, 30, 0).len(), 0);
    }

    #[test]
    fn test_pagination_offsets_rank() {
        let index = index_with(&[("0xa", 3.0), ("0xb", 2.0), ("0xc", 1.0)]);
        let page = index.top(2, SortMetric::AnnualizedReturn, 30, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].rank, 2);
        assert_eq!(page[0].wallet, "0xb");
        assert_eq!(page[1].rank, 3);
    }

    #[test]
    fn test_upsert_replaces_stale_entry() {
        let mut index = index_with(&[("0xa", 10.0), ("0xb", 20.0)]);
        assert_eq!(index.rank_of("0xa", SortMetric::AnnualizedReturn, 30), Some(2));

        index.upsert(&fixtures::snapshot("0xa", 30, 99.0));
        assert_eq!(index.rank_of("0xa", SortMetric::AnnualizedReturn, 30), Some(1));
        // no ghost of the old value left behind
        assert_eq!(index.len(SortMetric::AnnualizedReturn, 30), 2);
    }

    #[test]
    fn test_remove_drops_wallet_from_all_orderings() {
        let mut index = index_with(&[("0xa", 10.0), ("0xb", 20.0)]);
        index.remove("0xa");
        assert_eq!(index.rank_of("0xa", SortMetric::AnnualizedReturn, 30), None);
        for metric in SortMetric::ALL {
            assert_eq!(index.len(metric, 30), 1);
        }
    }

    #[test]
    fn test_windows_are_independent_orderings() {
        let mut index = LeaderboardIndex::new();
        index.upsert(&fixtures::snapshot("0xa", 30, 10.0));
        index.upsert(&fixtures::snapshot("0xa", 90, 40.0));
        assert_eq!(index.len(SortMetric::AnnualizedReturn, 30), 1);
        assert_eq!(index.len(SortMetric::AnnualizedReturn, 90), 1);
        assert_eq!(index.top(5, SortMetric::AnnualizedReturn, 365, 0).len(), 0);
    }
}
