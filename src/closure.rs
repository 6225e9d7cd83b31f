//! Deductive closure of a kinship graph under a relation algebra.
//!
//! The closure is computed as a semi-naive fixpoint over an explicit
//! worklist. Round 0 seeds the closure with the ground-truth edges
//! (canonicalized). Every later round takes the edges that were new in the
//! previous round (the frontier) and proposes:
//!
//! - the inverse and symmetric counterparts of each frontier edge,
//! - "extend right" compositions `(a,b) ∘ (b,y) ⇒ (a,y)`,
//! - "extend left" compositions `(x,a) ∘ (a,b) ⇒ (x,b)`.
//!
//! Frontier edges are evaluated in parallel against the current closure;
//! proposals for the same pair meet in a concurrent staging map that keeps
//! the smallest witness, so a round's result never depends on thread
//! scheduling. Staged edges are then committed insert-if-absent and become
//! the next frontier. Writes are monotonic and bounded by `n²` pairs, so the
//! loop terminates.

use std::collections::BTreeMap;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::algebra::{RelationAlgebra, RelationId};
use crate::error::ClosureError;
use crate::graph::{Edge, KinshipGraph, NodeId};

/// Result type for closure computation.
pub type ClosureResult<T> = std::result::Result<T, ClosureError>;

// ---------------------------------------------------------------------------
// Closure
// ---------------------------------------------------------------------------

/// Dense relation graph: every relation derivable from the ground truth.
///
/// Adjacency is kept in both directions, keyed by ordered node pair, and
/// only grows through [`Closure::insert_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    outgoing: Vec<BTreeMap<NodeId, RelationId>>,
    incoming: Vec<BTreeMap<NodeId, RelationId>>,
    len: usize,
    ground_truth: usize,
    rounds: usize,
}

impl Closure {
    fn with_nodes(node_count: usize) -> Self {
        Self {
            outgoing: vec![BTreeMap::new(); node_count],
            incoming: vec![BTreeMap::new(); node_count],
            len: 0,
            ground_truth: 0,
            rounds: 0,
        }
    }

    /// Insert `edge → relation` unless the pair is already known or is a
    /// self-loop. Returns whether the edge was inserted.
    fn insert_if_absent(&mut self, edge: Edge, relation: RelationId) -> bool {
        if edge.is_loop() || self.contains(edge) {
            return false;
        }
        self.outgoing[edge.from.index()].insert(edge.to, relation);
        self.incoming[edge.to.index()].insert(edge.from, relation);
        self.len += 1;
        true
    }

    /// Relation of an edge, if known.
    pub fn relation(&self, edge: Edge) -> Option<RelationId> {
        self.outgoing
            .get(edge.from.index())
            .and_then(|m| m.get(&edge.to))
            .copied()
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.relation(edge).is_some()
    }

    /// Edges leaving `node`, ordered by target.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = (NodeId, RelationId)> + '_ {
        self.outgoing
            .get(node.index())
            .into_iter()
            .flat_map(|m| m.iter().map(|(n, r)| (*n, *r)))
    }

    /// Edges entering `node`, ordered by source.
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = (NodeId, RelationId)> + '_ {
        self.incoming
            .get(node.index())
            .into_iter()
            .flat_map(|m| m.iter().map(|(n, r)| (*n, *r)))
    }

    /// All edges in `(from, to)` order.
    pub fn edges(&self) -> impl Iterator<Item = (Edge, RelationId)> + '_ {
        self.outgoing.iter().enumerate().flat_map(|(from, m)| {
            m.iter()
                .map(move |(to, r)| (Edge::new(NodeId(from as u32), *to), *r))
        })
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Number of edges taken over from the ground truth.
    pub fn ground_truth_len(&self) -> usize {
        self.ground_truth
    }

    /// Rounds until the fixpoint was reached.
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

// ---------------------------------------------------------------------------
// Closure engine
// ---------------------------------------------------------------------------

/// Why a staged edge was proposed. Ordering decides between competing
/// proposals for the same pair within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Witness {
    Inverse,
    Symmetric,
    /// Composition through the given intermediate node.
    Composed(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    witness: Witness,
    relation: RelationId,
}

/// Computes [`Closure`]s.
pub struct ClosureEngine<'a> {
    algebra: &'a RelationAlgebra,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(algebra: &'a RelationAlgebra) -> Self {
        Self { algebra }
    }

    /// Close `graph` under the algebra.
    ///
    /// Fails if a ground-truth edge carries a label outside the vocabulary.
    pub fn close(&self, graph: &KinshipGraph) -> ClosureResult<Closure> {
        let mut closure = Closure::with_nodes(graph.node_count());
        let mut frontier: Vec<(Edge, RelationId)> = Vec::with_capacity(graph.edge_count());

        for (edge, label) in graph.edges() {
            let relation =
                self.algebra
                    .resolve(label)
                    .ok_or_else(|| ClosureError::UnknownRelation {
                        from: edge.from.0,
                        to: edge.to.0,
                        relation: label.to_string(),
                    })?;
            let relation = self.algebra.canonical_or_self(relation);
            if closure.insert_if_absent(edge, relation) {
                frontier.push((edge, relation));
            }
        }
        closure.ground_truth = closure.len;

        tracing::debug!(
            nodes = graph.node_count(),
            ground_truth = closure.len,
            "closing kinship graph"
        );

        while !frontier.is_empty() {
            closure.rounds += 1;
            let staged: DashMap<Edge, Candidate> = DashMap::new();
            frontier
                .par_iter()
                .for_each(|&(edge, relation)| self.propose(&closure, edge, relation, &staged));

            let mut proposals: Vec<(Edge, Candidate)> = staged.into_iter().collect();
            proposals.sort_unstable_by_key(|(edge, _)| *edge);

            frontier = proposals
                .into_iter()
                .filter_map(|(edge, candidate)| {
                    let relation = self.algebra.canonical_or_self(candidate.relation);
                    closure
                        .insert_if_absent(edge, relation)
                        .then_some((edge, relation))
                })
                .collect();

            tracing::trace!(
                round = closure.rounds,
                derived = frontier.len(),
                "closure round"
            );
        }

        tracing::info!(
            nodes = closure.node_count(),
            ground_truth = closure.ground_truth,
            edges = closure.len,
            rounds = closure.rounds,
            "kinship closure complete"
        );
        Ok(closure)
    }

    /// Stage everything derivable from one frontier edge.
    fn propose(
        &self,
        closure: &Closure,
        edge: Edge,
        relation: RelationId,
        staged: &DashMap<Edge, Candidate>,
    ) {
        let offer = |target: Edge, relation: RelationId, witness: Witness| {
            if target.is_loop() || closure.contains(target) {
                return;
            }
            let candidate = Candidate { witness, relation };
            staged
                .entry(target)
                .and_modify(|existing| {
                    if candidate < *existing {
                        *existing = candidate;
                    }
                })
                .or_insert(candidate);
        };

        if let Some(inverse) = self.algebra.invert(relation) {
            offer(edge.reversed(), inverse, Witness::Inverse);
        }
        if let Some(mirror) = self.algebra.symmetric(relation) {
            offer(edge.reversed(), mirror, Witness::Symmetric);
        }

        // Extend right: (a,b) ∘ (b,y) ⇒ (a,y).
        for (y, next) in closure.outgoing(edge.to) {
            if let Some(derived) = self.algebra.compose(relation, next) {
                offer(Edge::new(edge.from, y), derived, Witness::Composed(edge.to));
            }
        }
        // Extend left: (x,a) ∘ (a,b) ⇒ (x,b).
        for (x, prev) in closure.incoming(edge.from) {
            if let Some(derived) = self.algebra.compose(prev, relation) {
                offer(Edge::new(x, edge.to), derived, Witness::Composed(edge.from));
            }
        }
    }
}
