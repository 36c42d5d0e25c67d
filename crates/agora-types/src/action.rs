//! The closed action model: one typed intent per agent per tick.
//!
//! An [`Action`] pairs an agent ID and a submission timestamp with an
//! [`ActionBody`], a closed tagged union over the eight supported action
//! kinds. Every body exposes structural validation that enumerates *all*
//! violated preconditions -- not just the first -- so an external decision
//! provider gets complete feedback in one pass. Validity is "the error
//! list is empty".
//!
//! Actions are transient: the decision provider constructs a fresh one
//! each tick and the interpreter consumes it. Nothing in the kernel holds
//! an `Action` across ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, GroupId, ItemId, LocationId, ProposalId, RecipeId};
use crate::structs::TradeItem;

/// Discriminant for the eight supported action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    /// Relocate to a neighboring location.
    Move,
    /// Collect a resource at the current location.
    Harvest,
    /// Convert inventory items through a recipe.
    Craft,
    /// Send a message (pure side-effect).
    Message,
    /// Propose a two-party item exchange.
    TradeProposal,
    /// Accept or reject a pending trade proposal.
    AcceptTrade,
    /// Forward a group/governance intent (pure side-effect).
    GroupAction,
    /// Do nothing this tick.
    Idle,
}

impl ActionKind {
    /// The canonical wire tag for this kind (upper snake case).
    pub const fn wire_tag(self) -> &'static str {
        match self {
            Self::Move => "MOVE",
            Self::Harvest => "HARVEST",
            Self::Craft => "CRAFT",
            Self::Message => "MESSAGE",
            Self::TradeProposal => "TRADE_PROPOSAL",
            Self::AcceptTrade => "ACCEPT_TRADE",
            Self::GroupAction => "GROUP_ACTION",
            Self::Idle => "IDLE",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.wire_tag())
    }
}

/// Delivery channel for a [`ActionBody::Message`] action.
///
/// The wire value `broadcast` is accepted and normalized to
/// [`Channel::Location`] during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// One recipient, addressed by agent ID.
    Direct,
    /// Everyone at the sender's location.
    Location,
    /// Everyone in the simulation.
    Global,
    /// Members of a group.
    Group,
    /// Trade negotiation channel.
    Trade,
    /// Governance/deliberation channel.
    Governance,
}

impl Channel {
    /// Parse a wire channel string (case-insensitive).
    ///
    /// `broadcast` maps to [`Channel::Location`] for provider
    /// compatibility. Returns `None` for unrecognized values.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "location" | "broadcast" => Some(Self::Location),
            "global" => Some(Self::Global),
            "group" => Some(Self::Group),
            "trade" => Some(Self::Trade),
            "governance" => Some(Self::Governance),
            _ => None,
        }
    }

    /// The lowercase wire name of this channel.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Location => "location",
            Self::Global => "global",
            Self::Group => "group",
            Self::Trade => "trade",
            Self::Governance => "governance",
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of group operation carried by a [`ActionBody::GroupAction`].
///
/// The kernel forwards these untouched to the governance collaborator;
/// their business rules live outside the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupActionKind {
    /// Found a new group.
    FormGroup,
    /// Join an existing group.
    JoinGroup,
    /// Leave a group.
    LeaveGroup,
    /// Cast a vote on an open proposal.
    Vote,
    /// Propose a rule to the group.
    ProposeRule,
}

impl GroupActionKind {
    /// Parse a wire tag (case-insensitive); unrecognized tags fall back
    /// to [`GroupActionKind::FormGroup`] as the original protocol does.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "JOIN_GROUP" => Self::JoinGroup,
            "LEAVE_GROUP" => Self::LeaveGroup,
            "VOTE" => Self::Vote,
            "PROPOSE_RULE" => Self::ProposeRule,
            _ => Self::FormGroup,
        }
    }

    /// The canonical wire tag for this group action kind.
    pub const fn wire_tag(self) -> &'static str {
        match self {
            Self::FormGroup => "FORM_GROUP",
            Self::JoinGroup => "JOIN_GROUP",
            Self::LeaveGroup => "LEAVE_GROUP",
            Self::Vote => "VOTE",
            Self::ProposeRule => "PROPOSE_RULE",
        }
    }
}

impl core::fmt::Display for GroupActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.wire_tag())
    }
}

/// Kind-specific payload of an [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionBody {
    /// Relocate to `destination` (must be a neighbor of the current location).
    Move {
        /// Target location.
        destination: LocationId,
    },
    /// Collect up to `amount` units of `resource_type` at the current location.
    Harvest {
        /// The resource to collect.
        resource_type: ItemId,
        /// Requested quantity (may be capped at execution time).
        amount: u32,
    },
    /// Execute `recipe_id` `quantity` times.
    Craft {
        /// The recipe to execute.
        recipe_id: RecipeId,
        /// How many times to apply the recipe.
        quantity: u32,
    },
    /// Queue a message for the external messaging collaborator.
    Message {
        /// Recipient, required for the direct channel.
        recipient_id: Option<AgentId>,
        /// Delivery channel.
        channel: Channel,
        /// Message text.
        content: String,
        /// Optional explicit location scope.
        location_id: Option<LocationId>,
        /// Optional group scope.
        group_id: Option<GroupId>,
    },
    /// Propose a two-party item exchange, registered as a pending trade.
    TradeProposal {
        /// The agent being offered the trade.
        target_agent_id: AgentId,
        /// Items the proposer gives on settlement.
        offered_items: Vec<TradeItem>,
        /// Items the proposer receives on settlement.
        requested_items: Vec<TradeItem>,
        /// Caller-supplied proposal identifier.
        proposal_id: ProposalId,
    },
    /// Accept (or reject) a pending trade proposal.
    AcceptTrade {
        /// The proposal being answered.
        proposal_id: ProposalId,
        /// `true` to settle, `false` to reject.
        accept: bool,
    },
    /// Forward a group intent to the governance collaborator.
    GroupAction {
        /// The group operation being requested.
        group_action_type: GroupActionKind,
        /// Target group (required except for `FORM_GROUP`).
        group_id: Option<GroupId>,
        /// Opaque payload forwarded untouched.
        payload: serde_json::Map<String, serde_json::Value>,
    },
    /// Do nothing; always succeeds for an existing agent.
    Idle {
        /// Why the agent idled (e.g. a throttle denial reason).
        reason: String,
    },
}

impl ActionBody {
    /// The discriminant of this body.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Move,
            Self::Harvest { .. } => ActionKind::Harvest,
            Self::Craft { .. } => ActionKind::Craft,
            Self::Message { .. } => ActionKind::Message,
            Self::TradeProposal { .. } => ActionKind::TradeProposal,
            Self::AcceptTrade { .. } => ActionKind::AcceptTrade,
            Self::GroupAction { .. } => ActionKind::GroupAction,
            Self::Idle { .. } => ActionKind::Idle,
        }
    }
}

/// A single typed intent submitted by (or for) an agent for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The acting agent.
    pub agent_id: AgentId,
    /// When the decision source produced this action.
    pub timestamp: DateTime<Utc>,
    /// Kind-specific fields.
    pub body: ActionBody,
}

impl Action {
    /// Construct an action stamped with the current wall-clock time.
    pub fn new(agent_id: AgentId, body: ActionBody) -> Self {
        Self {
            agent_id,
            timestamp: Utc::now(),
            body,
        }
    }

    /// Convenience constructor for the safe fallback action.
    pub fn idle(agent_id: AgentId, reason: impl Into<String>) -> Self {
        Self::new(
            agent_id,
            ActionBody::Idle {
                reason: reason.into(),
            },
        )
    }

    /// The discriminant of this action's body.
    pub const fn kind(&self) -> ActionKind {
        self.body.kind()
    }

    /// Enumerate every violated structural precondition.
    ///
    /// Returns an empty vector when the action is structurally valid.
    /// Validation is purely structural: it never consults agent or world
    /// state (that is the interpreter's job at execution time).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.agent_id.is_empty() {
            errors.push("agent_id is required".to_owned());
        }

        match &self.body {
            ActionBody::Move { destination } => {
                if destination.is_empty() {
                    errors.push("destination is required for MOVE action".to_owned());
                }
            }
            ActionBody::Harvest {
                resource_type,
                amount,
            } => {
                if resource_type.is_empty() {
                    errors.push("resource_type is required for HARVEST action".to_owned());
                }
                if *amount == 0 {
                    errors.push("amount must be positive for HARVEST action".to_owned());
                }
            }
            ActionBody::Craft {
                recipe_id,
                quantity,
            } => {
                if recipe_id.is_empty() {
                    errors.push("recipe_id is required for CRAFT action".to_owned());
                }
                if *quantity == 0 {
                    errors.push("quantity must be positive for CRAFT action".to_owned());
                }
            }
            ActionBody::Message {
                recipient_id,
                channel,
                content,
                ..
            } => {
                if content.is_empty() {
                    errors.push("content is required for MESSAGE action".to_owned());
                }
                if *channel == Channel::Direct
                    && recipient_id.as_ref().is_none_or(AgentId::is_empty)
                {
                    errors.push("recipient_id is required for direct MESSAGE".to_owned());
                }
            }
            ActionBody::TradeProposal {
                target_agent_id,
                offered_items,
                requested_items,
                proposal_id,
            } => {
                if target_agent_id.is_empty() {
                    errors.push("target_agent_id is required for TRADE_PROPOSAL".to_owned());
                }
                if *target_agent_id == self.agent_id {
                    errors.push("cannot trade with self".to_owned());
                }
                if proposal_id.is_empty() {
                    errors.push("proposal_id is required for TRADE_PROPOSAL".to_owned());
                }
                if offered_items.is_empty() && requested_items.is_empty() {
                    errors.push("trade must include offered or requested items".to_owned());
                }
                for item in offered_items {
                    if item.quantity == 0 {
                        errors.push(format!(
                            "offered item quantity must be positive: {}",
                            item.item_type
                        ));
                    }
                }
                for item in requested_items {
                    if item.quantity == 0 {
                        errors.push(format!(
                            "requested item quantity must be positive: {}",
                            item.item_type
                        ));
                    }
                }
            }
            ActionBody::AcceptTrade { proposal_id, .. } => {
                if proposal_id.is_empty() {
                    errors.push("proposal_id is required for ACCEPT_TRADE".to_owned());
                }
            }
            ActionBody::GroupAction {
                group_action_type,
                group_id,
                ..
            } => {
                if *group_action_type != GroupActionKind::FormGroup
                    && group_id.as_ref().is_none_or(GroupId::is_empty)
                {
                    errors.push(
                        "group_id required for group operations (except FORM_GROUP)".to_owned(),
                    );
                }
            }
            ActionBody::Idle { .. } => {}
        }

        errors
    }

    /// Whether [`validate`](Self::validate) returns no errors.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
