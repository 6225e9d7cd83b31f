//! Kinship graph: people and the ground-truth relations between them.
//!
//! - [`KinshipGraph`]: mutable store of people and insert-if-absent labeled edges
//! - [`NamePool`]: collision-free display names per gender
//! - [`simulate`]: seeded family-tree simulation producing a sparse graph
//!
//! All layers share the [`NodeId`] / [`Edge`] data model.

pub mod ancestry;
pub mod names;
pub mod simulate;

use serde::{Deserialize, Serialize};

pub use ancestry::KinshipGraph;
pub use names::NamePool;
pub use simulate::{FamilyConfig, simulate};

/// Dense identifier of a person, allocated sequentially from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position of this node in dense per-node tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered pair of people. The relation label lives in whichever map
/// stores the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    /// The same pair in the opposite direction.
    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    pub fn is_loop(self) -> bool {
        self.from == self.to
    }

    /// Whether `node` is one of the endpoints.
    pub fn touches(self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// Gender of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// The other gender.
    pub fn toggled(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// A person in the kinship graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: NodeId,
    pub gender: Gender,
    pub name: String,
    /// Flip epoch in which this person's gender was last toggled.
    pub flipped_epoch: Option<u64>,
}
