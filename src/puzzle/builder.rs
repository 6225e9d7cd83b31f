//! Backward chaining from a target edge to a story of atomic facts.

use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::algebra::{RelationAlgebra, RelationId};
use crate::closure::Closure;
use crate::error::PuzzleError;
use crate::expansion::{ExpansionIndex, bridge};
use crate::graph::{Edge, KinshipGraph, NodeId};

use super::{
    Fact, FormattedFact, ProofStep, Puzzle, PuzzleBatch, PuzzleIdAllocator, PuzzleResult,
    check_chain,
};

/// Outcome of [`PuzzleBuilder::derive`]: the spliced chain and the
/// decompositions applied, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub story: Vec<Edge>,
    pub steps: Vec<(Edge, [Edge; 2])>,
}

/// Builds puzzles over a shared, read-only closure.
pub struct PuzzleBuilder<'a> {
    pub(super) algebra: &'a RelationAlgebra,
    pub(super) graph: &'a KinshipGraph,
    pub(super) closure: &'a Closure,
    pub(super) index: &'a ExpansionIndex,
    ids: &'a PuzzleIdAllocator,
}

impl<'a> PuzzleBuilder<'a> {
    pub fn new(
        algebra: &'a RelationAlgebra,
        graph: &'a KinshipGraph,
        closure: &'a Closure,
        index: &'a ExpansionIndex,
        ids: &'a PuzzleIdAllocator,
    ) -> Self {
        Self {
            algebra,
            graph,
            closure,
            index,
            ids,
        }
    }

    /// Decompose `target` until the chain holds `length` edges.
    ///
    /// Each step picks a random not-yet-expanded chain edge, takes its next
    /// round-robin decomposition and splices it in. A decomposition is
    /// rejected when either part, or its reverse, was already expanded, or
    /// when its bridge node is already on the chain. Returns `None` when
    /// chaining stalls short of `length`.
    pub fn derive(&self, target: Edge, length: usize, rng: &mut impl Rng) -> Option<Derivation> {
        if length == 0 {
            return None;
        }
        let mut chain = vec![target];
        let mut seen: HashSet<Edge> = HashSet::new();
        let mut steps = Vec::new();
        let mut budget = length - 1;

        while budget > 0 {
            let open: Vec<usize> = (0..chain.len())
                .filter(|&i| !seen.contains(&chain[i]))
                .collect();
            let Some(&pos) = open.choose(rng) else {
                break;
            };
            let edge = chain[pos];
            seen.insert(edge);

            let Some(parts) = self.index.next(edge) else {
                continue;
            };
            let [head, tail] = parts;
            if [head, tail, head.reversed(), tail.reversed()]
                .iter()
                .any(|e| seen.contains(e))
            {
                continue;
            }
            let middle = bridge(&parts);
            if chain.iter().any(|e| e.touches(middle)) {
                continue;
            }

            chain.splice(pos..=pos, parts);
            steps.push((edge, parts));
            budget -= 1;
        }

        (chain.len() == length).then_some(Derivation {
            story: chain,
            steps,
        })
    }

    /// Build one puzzle for `target`, or `None` if no story of `length`
    /// facts can be derived.
    pub fn build_one(
        &self,
        target: Edge,
        length: usize,
        rng: &mut impl Rng,
    ) -> PuzzleResult<Option<Puzzle>> {
        let Some(derivation) = self.derive(target, length, rng) else {
            tracing::trace!(%target, length, "decomposition stalled");
            return Ok(None);
        };
        check_chain(target, &derivation.story)?;

        let story = derivation
            .story
            .iter()
            .map(|e| self.fact(*e))
            .collect::<PuzzleResult<Vec<Fact>>>()?;
        let proof = derivation
            .steps
            .iter()
            .map(|(edge, parts)| -> PuzzleResult<ProofStep> {
                Ok(ProofStep {
                    edge: *edge,
                    parts: *parts,
                    text: self.format(*edge)?,
                    parts_text: [self.format(parts[0])?, self.format(parts[1])?],
                })
            })
            .collect::<PuzzleResult<Vec<_>>>()?;
        let relation_comb = derivation
            .story
            .iter()
            .map(|e| self.format(*e).map(|f| f.relation))
            .collect::<PuzzleResult<Vec<String>>>()?
            .join("-");

        Ok(Some(Puzzle {
            id: self.ids.next_id(),
            target: self.fact(target)?,
            query: self.format(target)?,
            story,
            proof,
            noise: Vec::new(),
            relation_comb,
        }))
    }

    /// Try every closure edge not in `consumed`, in sorted order, as a
    /// target. Accepted targets join `consumed`.
    pub fn build_batch(
        &self,
        length: usize,
        consumed: &mut BTreeSet<Edge>,
        rng: &mut impl Rng,
    ) -> PuzzleResult<PuzzleBatch> {
        let candidates: Vec<Edge> = self
            .closure
            .edges()
            .map(|(e, _)| e)
            .filter(|e| !consumed.contains(e))
            .collect();

        let mut puzzles = Vec::new();
        for &target in &candidates {
            if let Some(puzzle) = self.build_one(target, length, rng)? {
                consumed.insert(target);
                puzzles.push(puzzle);
            }
        }

        if puzzles.is_empty() {
            tracing::warn!(
                candidates = candidates.len(),
                length,
                "no puzzles producible, enlarge the graph"
            );
            return Err(PuzzleError::NoPuzzlesProducible {
                candidates: candidates.len(),
                length,
            });
        }
        tracing::info!(
            candidates = candidates.len(),
            puzzles = puzzles.len(),
            length,
            "puzzle batch built"
        );
        Ok(PuzzleBatch { puzzles })
    }

    /// Closure fact for `edge`.
    pub fn fact(&self, edge: Edge) -> PuzzleResult<Fact> {
        let relation = self.relation(edge)?;
        Ok(Fact {
            from: edge.from,
            to: edge.to,
            relation: self.algebra.label(relation).to_string(),
        })
    }

    /// `edge` rendered with names and the surface word for the `to` person's
    /// gender.
    pub fn format(&self, edge: Edge) -> PuzzleResult<FormattedFact> {
        let relation = self.relation(edge)?;
        let word = match self.graph.person(edge.to) {
            Some(person) => self.algebra.surface(relation, person.gender),
            None => self.algebra.label(relation),
        };
        Ok(FormattedFact {
            from: self.person_name(edge.from),
            relation: word.to_string(),
            to: self.person_name(edge.to),
        })
    }

    fn relation(&self, edge: Edge) -> PuzzleResult<RelationId> {
        self.closure
            .relation(edge)
            .ok_or_else(|| PuzzleError::BrokenChain {
                from: edge.from.0,
                to: edge.to.0,
                detail: format!("edge {edge} is not in the closure"),
            })
    }

    fn person_name(&self, id: NodeId) -> String {
        self.graph
            .person(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
