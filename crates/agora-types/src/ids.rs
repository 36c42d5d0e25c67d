//! Type-safe identifier wrappers around owned strings.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. Identifiers are
//! opaque strings because they originate outside the kernel: the agent
//! registry assigns agent IDs, the world configuration names locations
//! and items, and the decision provider supplies trade proposal IDs.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `String` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything that converts into a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string (never valid).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent in the simulation.
    AgentId
}

define_id! {
    /// Unique identifier for a location (node in the world graph).
    LocationId
}

define_id! {
    /// Identifier for an item or resource kind (e.g. `wheat`, `wood`).
    ItemId
}

define_id! {
    /// Identifier for a crafting recipe.
    RecipeId
}

define_id! {
    /// Unique identifier for a pending trade proposal.
    ProposalId
}

define_id! {
    /// Identifier for a social group of agents.
    GroupId
}
