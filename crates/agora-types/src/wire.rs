//! Conversion from the untrusted provider wire shape into typed actions.
//!
//! Decision providers hand the kernel a flat JSON map with a
//! case-insensitive `action_type` tag plus type-specific fields. The
//! factory here maps that shape onto exactly one [`ActionBody`] variant
//! or rejects the tag outright -- it never produces a "best guess"
//! variant. Missing optional fields take the same defaults the original
//! protocol used, and structural problems that slip through defaults are
//! caught by [`Action::validate`] afterwards (the interpreter revalidates
//! regardless; the provider is untrusted).
//!
//! Field surface, preserved exactly for provider compatibility:
//!
//! | tag              | fields                                                          |
//! |------------------|-----------------------------------------------------------------|
//! | `MOVE`           | `destination`                                                   |
//! | `HARVEST`        | `resource_type`, `amount`                                       |
//! | `CRAFT`          | `recipe_id`, `quantity`                                         |
//! | `MESSAGE`        | `recipient_id`, `channel`, `content`, `location_id`, `group_id` |
//! | `TRADE_PROPOSAL` | `target_agent_id`, `offered_items`, `requested_items`, `proposal_id` |
//! | `ACCEPT_TRADE`   | `proposal_id`, `accept`                                         |
//! | `GROUP_ACTION`   | `group_action_type`, `group_id`, `payload`                      |
//! | `IDLE`           | `reason`                                                        |

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::action::{Action, ActionBody, Channel, GroupActionKind};
use crate::ids::{AgentId, GroupId, ItemId, LocationId, ProposalId, RecipeId};
use crate::structs::TradeItem;

/// Errors produced when converting a wire map into an [`Action`].
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The map has no `action_type` key.
    #[error("action_type is required")]
    MissingActionType,

    /// The `action_type` value is not one of the eight known tags.
    #[error("invalid action_type: {tag}")]
    UnknownActionType {
        /// The rejected tag value.
        tag: String,
    },

    /// The `channel` value on a `MESSAGE` is not a known channel.
    #[error("invalid channel '{channel}' for MESSAGE action")]
    UnknownChannel {
        /// The rejected channel value.
        channel: String,
    },
}

/// Read a string field, defaulting to the empty string.
fn str_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Read an optional string field; absent, null, or empty become `None`.
fn opt_str_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Read a non-negative integer field with a default.
fn u32_field(data: &Map<String, Value>, key: &str, default: u32) -> u32 {
    data.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// Read a trade item list field (`[{item_type, quantity}, ...]`).
///
/// Malformed entries degrade to zero-quantity items so that validation
/// reports them instead of silently dropping them.
fn trade_items_field(data: &Map<String, Value>, key: &str) -> Vec<TradeItem> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let obj = item.as_object();
                    let item_type = obj
                        .map(|o| str_field(o, "item_type"))
                        .unwrap_or_default();
                    let quantity = obj.map_or(0, |o| u32_field(o, "quantity", 0));
                    TradeItem::new(item_type, quantity)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Read the wire timestamp (fractional epoch seconds), defaulting to
/// the Unix epoch when absent or malformed.
fn timestamp_field(data: &Map<String, Value>) -> DateTime<Utc> {
    data.get("timestamp")
        .and_then(Value::as_f64)
        .and_then(|secs| {
            let millis = (secs * 1000.0).round();
            if millis.is_finite() && millis.abs() < 9.0e15 {
                #[allow(clippy::cast_possible_truncation)]
                DateTime::<Utc>::from_timestamp_millis(millis as i64)
            } else {
                None
            }
        })
        .unwrap_or_default()
}

impl Action {
    /// Convert an untrusted flat wire map into a typed action.
    ///
    /// Requires a recognized `action_type` tag (case-insensitive).
    /// Optional fields default exactly as the wire protocol specifies;
    /// the result may still fail [`Action::validate`] if required
    /// fields were defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the tag is missing or unrecognized,
    /// or when a `MESSAGE` carries an unknown channel.
    pub fn from_wire(data: &Map<String, Value>) -> Result<Self, WireError> {
        let tag = data
            .get("action_type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(WireError::MissingActionType)?;

        let agent_id = AgentId::new(str_field(data, "agent_id"));
        let timestamp = timestamp_field(data);

        let body = match tag.to_ascii_uppercase().as_str() {
            "MOVE" => ActionBody::Move {
                destination: LocationId::new(str_field(data, "destination")),
            },
            "HARVEST" => ActionBody::Harvest {
                resource_type: ItemId::new(str_field(data, "resource_type")),
                amount: u32_field(data, "amount", 1),
            },
            "CRAFT" => ActionBody::Craft {
                recipe_id: RecipeId::new(str_field(data, "recipe_id")),
                quantity: u32_field(data, "quantity", 1),
            },
            "MESSAGE" => {
                let raw_channel = opt_str_field(data, "channel")
                    .unwrap_or_else(|| "direct".to_owned());
                let channel = Channel::from_wire(&raw_channel).ok_or(WireError::UnknownChannel {
                    channel: raw_channel,
                })?;
                ActionBody::Message {
                    recipient_id: opt_str_field(data, "recipient_id").map(AgentId::new),
                    channel,
                    content: str_field(data, "content"),
                    location_id: opt_str_field(data, "location_id").map(LocationId::new),
                    group_id: opt_str_field(data, "group_id").map(GroupId::new),
                }
            }
            "TRADE_PROPOSAL" => ActionBody::TradeProposal {
                target_agent_id: AgentId::new(str_field(data, "target_agent_id")),
                offered_items: trade_items_field(data, "offered_items"),
                requested_items: trade_items_field(data, "requested_items"),
                proposal_id: ProposalId::new(str_field(data, "proposal_id")),
            },
            "ACCEPT_TRADE" => ActionBody::AcceptTrade {
                proposal_id: ProposalId::new(str_field(data, "proposal_id")),
                accept: data
                    .get("accept")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            },
            "GROUP_ACTION" => ActionBody::GroupAction {
                group_action_type: GroupActionKind::from_wire(
                    &opt_str_field(data, "group_action_type")
                        .unwrap_or_else(|| "FORM_GROUP".to_owned()),
                ),
                group_id: opt_str_field(data, "group_id").map(GroupId::new),
                payload: data
                    .get("payload")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            },
            "IDLE" => ActionBody::Idle {
                reason: str_field(data, "reason"),
            },
            other => {
                return Err(WireError::UnknownActionType {
                    tag: other.to_owned(),
                });
            }
        };

        Ok(Self {
            agent_id,
            timestamp,
            body,
        })
    }
}
