//! Structured results of executing one action.
//!
//! Every call to the action interpreter produces exactly one
//! [`ActionOutcome`]: a result code, a human-readable message, a map of
//! the state changes actually applied, and a list of typed side-effects
//! for external collaborators (messaging, trade notifications,
//! governance). The outcome is the kernel's only report channel --
//! handlers never raise past the interpreter boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, GroupId, LocationId, ProposalId};

/// Result code for an executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// The request was satisfied in full.
    Success,
    /// The request was satisfied to a lesser, well-defined extent;
    /// `state_changes` reports the actual effect.
    Partial,
    /// A precondition failed at execution time; no mutation unless
    /// explicitly documented otherwise.
    Failure,
    /// The action failed structural validation; zero mutation.
    Invalid,
}

impl core::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failure => "FAILURE",
            Self::Invalid => "INVALID",
        };
        write!(f, "{name}")
    }
}

/// A consequence of an action that an external collaborator must carry
/// out; the kernel itself only queues these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    /// Deliver a message through the messaging collaborator.
    Message {
        /// The sending agent.
        sender_id: AgentId,
        /// Recipient (direct channel only).
        recipient_id: Option<AgentId>,
        /// Delivery channel name.
        channel: String,
        /// Message text.
        content: String,
        /// Where the sender was standing.
        sender_location: LocationId,
    },
    /// Notify the target that a trade was proposed.
    TradeProposal {
        /// The new proposal's identifier.
        proposal_id: ProposalId,
        /// Who proposed.
        proposer_id: AgentId,
        /// Who may respond.
        target_id: AgentId,
    },
    /// Forward a group intent to the governance collaborator, untouched.
    GroupAction {
        /// The acting agent.
        agent_id: AgentId,
        /// The group operation tag.
        group_action_type: String,
        /// Target group, if any.
        group_id: Option<GroupId>,
        /// Opaque payload.
        payload: serde_json::Map<String, serde_json::Value>,
    },
}

/// The structured result of executing one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Result code.
    pub result: OutcomeKind,
    /// Human-readable description of what happened.
    pub message: String,
    /// The state changes actually applied, keyed by field name.
    pub state_changes: BTreeMap<String, serde_json::Value>,
    /// Consequences queued for external collaborators.
    pub side_effects: Vec<SideEffect>,
}

impl ActionOutcome {
    /// An outcome with the given result and message, no changes, no
    /// side-effects.
    pub fn bare(result: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
            state_changes: BTreeMap::new(),
            side_effects: Vec::new(),
        }
    }

    /// A `SUCCESS` outcome with no state changes.
    pub fn success(message: impl Into<String>) -> Self {
        Self::bare(OutcomeKind::Success, message)
    }

    /// A `FAILURE` outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::bare(OutcomeKind::Failure, message)
    }

    /// An `INVALID` outcome (structural validation failed).
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::bare(OutcomeKind::Invalid, message)
    }

    /// Attach a state change, consuming and returning the outcome.
    #[must_use]
    pub fn with_change(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state_changes.insert(key.into(), value);
        self
    }

    /// Attach a side-effect, consuming and returning the outcome.
    #[must_use]
    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effects.push(effect);
        self
    }

    /// `true` iff the result is `SUCCESS` or `PARTIAL`.
    pub const fn succeeded(&self) -> bool {
        matches!(self.result, OutcomeKind::Success | OutcomeKind::Partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_partial_count_as_succeeded() {
        assert!(ActionOutcome::success("ok").succeeded());
        assert!(ActionOutcome::bare(OutcomeKind::Partial, "some").succeeded());
        assert!(!ActionOutcome::failure("no").succeeded());
        assert!(!ActionOutcome::invalid("bad").succeeded());
    }

    #[test]
    fn with_change_accumulates() {
        let outcome = ActionOutcome::success("moved")
            .with_change("old_location", serde_json::json!("forest"))
            .with_change("new_location", serde_json::json!("plains"));
        assert_eq!(outcome.state_changes.len(), 2);
    }

    #[test]
    fn side_effect_serializes_with_type_tag() {
        let effect = SideEffect::TradeProposal {
            proposal_id: ProposalId::new("p1"),
            proposer_id: AgentId::new("a"),
            target_id: AgentId::new("b"),
        };
        let json = serde_json::to_value(&effect).unwrap_or_default();
        assert_eq!(
            json.get("type").and_then(serde_json::Value::as_str),
            Some("trade_proposal")
        );
    }
}
