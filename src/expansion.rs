//! Round-robin catalogue of one-step decompositions.
//!
//! For every closure edge `(x, y)` labeled `r`, lists every `[(x, z), (z, y)]`
//! whose relations compose to `r`. Options are ordered by the algebra's
//! decomposition order, then by ascending bridge node `z`, and handed out
//! cyclically so repeated requests walk through distinct decompositions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::algebra::{RelationAlgebra, RelationId};
use crate::closure::Closure;
use crate::graph::{Edge, NodeId};

#[derive(Debug)]
struct Decompositions {
    options: Vec<[Edge; 2]>,
    cursor: AtomicUsize,
}

/// Per-edge decomposition options served round-robin.
#[derive(Debug, Default)]
pub struct ExpansionIndex {
    entries: HashMap<Edge, Decompositions>,
}

impl ExpansionIndex {
    /// Precompute decompositions for every edge of `closure`.
    pub fn build(closure: &Closure, algebra: &RelationAlgebra) -> Self {
        let rules = canonical_decompositions(algebra);
        let edges: Vec<(Edge, RelationId)> = closure.edges().collect();

        let entries: HashMap<Edge, Decompositions> = edges
            .par_iter()
            .filter_map(|&(edge, relation)| {
                let options = decompose(closure, &rules[relation.index()], edge);
                (!options.is_empty()).then(|| {
                    (
                        edge,
                        Decompositions {
                            options,
                            cursor: AtomicUsize::new(0),
                        },
                    )
                })
            })
            .collect();

        let index = Self { entries };
        tracing::info!(
            edges = closure.len(),
            expandable = index.len(),
            options = index.option_count(),
            "expansion index built"
        );
        index
    }

    /// Next decomposition of `edge`, cycling through its options.
    pub fn next(&self, edge: Edge) -> Option<[Edge; 2]> {
        let entry = self.entries.get(&edge)?;
        let slot = entry.cursor.fetch_add(1, Ordering::Relaxed) % entry.options.len();
        Some(entry.options[slot])
    }

    /// Every decomposition of `edge`, in serving order.
    pub fn options(&self, edge: Edge) -> &[[Edge; 2]] {
        self.entries
            .get(&edge)
            .map(|d| d.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.entries.contains_key(&edge)
    }

    /// Number of edges with at least one decomposition.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total decompositions across all edges.
    pub fn option_count(&self) -> usize {
        self.entries.values().map(|d| d.options.len()).sum()
    }
}

/// Decomposition pairs keyed by canonical result, with canonical components.
///
/// The closure stores canonical labels only, so rules producing an
/// equivalent label must be folded into their canonical form.
fn canonical_decompositions(algebra: &RelationAlgebra) -> Vec<Vec<(RelationId, RelationId)>> {
    let mut out = vec![Vec::new(); algebra.relation_count()];
    for c in algebra.relations() {
        let target = algebra.canonical_or_self(c);
        for &(a, b) in algebra.decompositions(c) {
            let pair = (algebra.canonical_or_self(a), algebra.canonical_or_self(b));
            let slot: &mut Vec<(RelationId, RelationId)> = &mut out[target.index()];
            if !slot.contains(&pair) {
                slot.push(pair);
            }
        }
    }
    out
}

fn decompose(closure: &Closure, rules: &[(RelationId, RelationId)], edge: Edge) -> Vec<[Edge; 2]> {
    let mut options = Vec::new();
    for &(first, second) in rules {
        for (z, relation) in closure.outgoing(edge.from) {
            if relation != first || z == edge.to {
                continue;
            }
            let tail = Edge::new(z, edge.to);
            if closure.relation(tail) == Some(second) {
                options.push([Edge::new(edge.from, z), tail]);
            }
        }
    }
    options
}

/// Bridge node of a decomposition.
pub fn bridge(parts: &[Edge; 2]) -> NodeId {
    parts[0].to
}
