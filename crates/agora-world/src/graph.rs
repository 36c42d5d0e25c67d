//! The world as a graph of named locations joined by weighted edges.
//!
//! Locations carry a resource-richness map consulted by harvesting and
//! regenerated by the world-update phase. Edges carry a distance and a
//! difficulty; travel cost is `distance * difficulty * destination
//! access_cost`, and an absent edge means the move is impossible rather
//! than expensive.
//!
//! The graph is append-mostly: nodes and edges are loaded from
//! configuration at startup, and only resource richness mutates during a
//! run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agora_types::{ItemId, LocationId};

/// A single location in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    /// Unique identifier (graph key).
    pub id: LocationId,
    /// Human-readable name.
    pub name: String,
    /// Free-form classification, e.g. `forest` or `market`.
    pub location_type: String,
    /// Harvestable units available per resource kind.
    #[serde(default)]
    pub resource_richness: BTreeMap<ItemId, u32>,
    /// Multiplier applied to the travel cost of entering this location.
    #[serde(default = "default_access_cost")]
    pub access_cost: f64,
    /// Opaque attributes for collaborators outside the kernel.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

const fn default_access_cost() -> f64 {
    1.0
}

impl LocationNode {
    /// Create a node with no resources and default access cost.
    pub fn new(id: impl Into<LocationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location_type: "generic".to_owned(),
            resource_richness: BTreeMap::new(),
            access_cost: 1.0,
            attributes: BTreeMap::new(),
        }
    }

    /// Set a resource's richness, consuming and returning the node.
    #[must_use]
    pub fn with_resource(mut self, item: impl Into<ItemId>, richness: u32) -> Self {
        self.resource_richness.insert(item.into(), richness);
        self
    }

    /// Current richness for a resource kind (0 when absent).
    pub fn richness(&self, item: &ItemId) -> u32 {
        self.resource_richness.get(item).copied().unwrap_or(0)
    }
}

/// A connection between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEdge {
    /// Origin location.
    pub from: LocationId,
    /// Destination location.
    pub to: LocationId,
    /// Length of the edge.
    #[serde(default = "default_edge_weight")]
    pub distance: f64,
    /// Terrain multiplier.
    #[serde(default = "default_edge_weight")]
    pub difficulty: f64,
    /// Whether the edge can be traversed in both directions.
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

const fn default_edge_weight() -> f64 {
    1.0
}

const fn default_bidirectional() -> bool {
    true
}

impl LocationEdge {
    /// Create a bidirectional edge with unit distance and difficulty.
    pub fn new(from: impl Into<LocationId>, to: impl Into<LocationId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            distance: 1.0,
            difficulty: 1.0,
            bidirectional: true,
        }
    }

    /// Whether this edge joins `from` to `to`, honoring directionality.
    pub fn connects(&self, from: &LocationId, to: &LocationId) -> bool {
        (self.from == *from && self.to == *to)
            || (self.bidirectional && self.from == *to && self.to == *from)
    }
}

/// The world graph: locations plus the edges that join them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationGraph {
    nodes: BTreeMap<LocationId, LocationNode>,
    edges: Vec<LocationEdge>,
    adjacency: BTreeMap<LocationId, Vec<LocationId>>,
}

impl LocationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a location, replacing any existing node with the same id.
    pub fn add_node(&mut self, node: LocationNode) {
        self.adjacency.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert an edge and index it for neighbor lookups.
    pub fn add_edge(&mut self, edge: LocationEdge) {
        self.adjacency
            .entry(edge.from.clone())
            .or_default()
            .push(edge.to.clone());
        if edge.bidirectional {
            self.adjacency
                .entry(edge.to.clone())
                .or_default()
                .push(edge.from.clone());
        }
        self.edges.push(edge);
    }

    /// Locations directly reachable from `location`.
    pub fn neighbors(&self, location: &LocationId) -> &[LocationId] {
        self.adjacency
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Look up a location by id.
    pub fn get_node(&self, location: &LocationId) -> Option<&LocationNode> {
        self.nodes.get(location)
    }

    /// Look up a location mutably.
    pub fn get_node_mut(&mut self, location: &LocationId) -> Option<&mut LocationNode> {
        self.nodes.get_mut(location)
    }

    /// Find the edge joining two locations, honoring directionality.
    pub fn get_edge(&self, from: &LocationId, to: &LocationId) -> Option<&LocationEdge> {
        self.edges.iter().find(|edge| edge.connects(from, to))
    }

    /// Cost of traveling one hop, or `None` when no edge exists.
    ///
    /// `distance * difficulty`, scaled by the destination's access cost
    /// when the destination is a known node.
    pub fn travel_cost(&self, from: &LocationId, to: &LocationId) -> Option<f64> {
        let edge = self.get_edge(from, to)?;
        let base = edge.distance * edge.difficulty;
        Some(match self.get_node(to) {
            Some(dest) => base * dest.access_cost,
            None => base,
        })
    }

    /// Number of locations in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate all locations in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &LocationNode> {
        self.nodes.values()
    }

    /// Iterate all locations mutably, in id order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut LocationNode> {
        self.nodes.values_mut()
    }
}
