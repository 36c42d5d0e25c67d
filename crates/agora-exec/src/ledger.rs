//! The pending-trade ledger.
//!
//! Exclusively owned by the action interpreter. Proposals enter on a
//! valid `TRADE_PROPOSAL` and leave exactly once: settlement, rejection,
//! cancellation, or an expiry sweep. No items are reserved while a
//! proposal is pending; settlement re-validates both sides.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use agora_types::{AgentId, PendingTrade, ProposalId};

/// Holds all not-yet-settled trade proposals, keyed by proposal id.
#[derive(Debug, Default)]
pub struct TradeLedger {
    trades: BTreeMap<ProposalId, PendingTrade>,
}

impl TradeLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proposal, replacing any pending trade with the same id.
    pub fn insert(&mut self, trade: PendingTrade) {
        self.trades.insert(trade.proposal_id.clone(), trade);
    }

    /// Look up a pending trade.
    pub fn get(&self, id: &ProposalId) -> Option<&PendingTrade> {
        self.trades.get(id)
    }

    /// Remove a pending trade, returning it if present.
    ///
    /// This is the single resolution point: settlement, rejection, and
    /// party-vanished cleanup all go through here, so a proposal id can
    /// never resolve twice.
    pub fn remove(&mut self, id: &ProposalId) -> Option<PendingTrade> {
        self.trades.remove(id)
    }

    /// Number of pending trades.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Pending trades in which the agent is proposer or target, in
    /// proposal-id order.
    pub fn for_agent(&self, agent: &AgentId) -> Vec<&PendingTrade> {
        self.trades
            .values()
            .filter(|t| t.proposer_id == *agent || t.target_id == *agent)
            .collect()
    }

    /// Cancel a pending trade; returns `true` when one was removed.
    pub fn cancel(&mut self, id: &ProposalId) -> bool {
        let removed = self.trades.remove(id).is_some();
        if removed {
            debug!(proposal_id = %id, "pending trade cancelled");
        }
        removed
    }

    /// Drop every trade older than `max_age_secs` relative to `now`.
    ///
    /// Returns the number of trades dropped.
    pub fn clear_expired(&mut self, now: DateTime<Utc>, max_age_secs: f64) -> usize {
        let expired: Vec<ProposalId> = self
            .trades
            .iter()
            .filter(|(_, trade)| {
                let age = now
                    .signed_duration_since(trade.created_at)
                    .num_milliseconds();
                #[allow(clippy::cast_precision_loss)]
                let age_secs = age as f64 / 1000.0;
                age_secs > max_age_secs
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.trades.remove(id);
            debug!(proposal_id = %id, "pending trade expired");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use agora_types::TradeItem;
    use chrono::Duration;

    use super::*;

    fn trade(id: &str, proposer: &str, target: &str, created_at: DateTime<Utc>) -> PendingTrade {
        PendingTrade {
            proposal_id: ProposalId::new(id),
            proposer_id: AgentId::new(proposer),
            target_id: AgentId::new(target),
            offered_items: vec![TradeItem::new("wheat", 5)],
            requested_items: vec![TradeItem::new("wood", 3)],
            created_at,
        }
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut ledger = TradeLedger::new();
        ledger.insert(trade("p1", "a", "b", Utc::now()));
        ledger.insert(trade("p1", "a", "c", Utc::now()));
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.get(&ProposalId::new("p1")).map(|t| t.target_id.clone()),
            Some(AgentId::new("c"))
        );
    }

    #[test]
    fn remove_resolves_at_most_once() {
        let mut ledger = TradeLedger::new();
        ledger.insert(trade("p1", "a", "b", Utc::now()));
        assert!(ledger.remove(&ProposalId::new("p1")).is_some());
        assert!(ledger.remove(&ProposalId::new("p1")).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn for_agent_matches_either_side() {
        let mut ledger = TradeLedger::new();
        ledger.insert(trade("p1", "a", "b", Utc::now()));
        ledger.insert(trade("p2", "b", "c", Utc::now()));
        ledger.insert(trade("p3", "c", "d", Utc::now()));
        assert_eq!(ledger.for_agent(&AgentId::new("b")).len(), 2);
        assert_eq!(ledger.for_agent(&AgentId::new("d")).len(), 1);
        assert!(ledger.for_agent(&AgentId::new("z")).is_empty());
    }

    #[test]
    fn clear_expired_drops_only_old_trades() {
        let mut ledger = TradeLedger::new();
        let now = Utc::now();
        ledger.insert(trade("old", "a", "b", now - Duration::seconds(200)));
        ledger.insert(trade("new", "a", "b", now - Duration::seconds(10)));
        let dropped = ledger.clear_expired(now, 100.0);
        assert_eq!(dropped, 1);
        assert!(ledger.get(&ProposalId::new("old")).is_none());
        assert!(ledger.get(&ProposalId::new("new")).is_some());
    }

    #[test]
    fn cancel_unknown_id_is_false() {
        let mut ledger = TradeLedger::new();
        assert!(!ledger.cancel(&ProposalId::new("nope")));
    }
}
