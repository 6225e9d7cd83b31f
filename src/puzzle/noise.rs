//! Noise injection.
//!
//! Noise facts are closure edges attached to a puzzle in groups, each group
//! constrained by how many nodes it shares with the story:
//!
//! - **supporting**: alternative decompositions of story edges through a
//!   bridge outside the story (shares ≥ 2 nodes)
//! - **irrelevant**: a chain of expansions leaving the story from one
//!   anchor node (shares exactly 1)
//! - **disconnected**: edges between people outside the story (shares 0)
//!
//! Every group is checked against its overlap class before it is attached.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::PuzzleError;
use crate::expansion::bridge;
use crate::graph::{Edge, NodeId};

use super::{Fact, NoiseGroup, NoiseKind, Puzzle, PuzzleBuilder, PuzzleResult};

/// Which noise groups to attach to each puzzle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseConfig {
    #[serde(default)]
    pub supporting: bool,
    #[serde(default)]
    pub irrelevant: bool,
    #[serde(default)]
    pub disconnected: bool,
}

impl NoiseConfig {
    /// Enabled kinds in attachment order.
    pub fn kinds(&self) -> Vec<NoiseKind> {
        [
            (self.supporting, NoiseKind::Supporting),
            (self.irrelevant, NoiseKind::Irrelevant),
            (self.disconnected, NoiseKind::Disconnected),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.supporting || self.irrelevant || self.disconnected
    }
}

impl PuzzleBuilder<'_> {
    /// Attach every noise group enabled in `config`.
    ///
    /// Either all groups are attached or, on error, none are.
    pub fn add_noise(
        &self,
        puzzle: &mut Puzzle,
        config: &NoiseConfig,
        rng: &mut impl Rng,
    ) -> PuzzleResult<()> {
        let mut groups = Vec::new();
        for kind in config.kinds() {
            groups.push(self.noise(puzzle, kind, rng)?);
        }
        puzzle.noise.extend(groups);
        Ok(())
    }

    /// Build one checked noise group of `kind` for `puzzle`.
    pub fn noise(
        &self,
        puzzle: &Puzzle,
        kind: NoiseKind,
        rng: &mut impl Rng,
    ) -> PuzzleResult<NoiseGroup> {
        let story = puzzle.story_nodes();
        let want = group_size(puzzle.story.len(), rng);
        let edges = match kind {
            NoiseKind::Supporting => self.supporting_edges(puzzle, &story, want, rng),
            NoiseKind::Irrelevant => self.irrelevant_edges(puzzle, &story, want, rng),
            NoiseKind::Disconnected => self.disconnected_edges(&story, want, rng),
        };
        if edges.is_empty() {
            tracing::debug!(puzzle = %puzzle.id, %kind, "no noise candidates");
            return Err(PuzzleError::InsufficientNoise {
                kind: kind.to_string(),
                puzzle: puzzle.id.0,
            });
        }

        let facts = edges
            .iter()
            .map(|e| self.fact(*e))
            .collect::<PuzzleResult<Vec<Fact>>>()?;
        check_overlap(kind, &facts, &story)?;
        Ok(NoiseGroup { kind, facts })
    }

    fn supporting_edges(
        &self,
        puzzle: &Puzzle,
        story: &BTreeSet<NodeId>,
        want: usize,
        rng: &mut impl Rng,
    ) -> Vec<Edge> {
        let target = puzzle.target.edge();
        let mut alternatives: Vec<[Edge; 2]> = puzzle
            .story
            .iter()
            .filter_map(|fact| {
                self.next_expansion(fact.edge(), |parts| {
                    !story.contains(&bridge(parts))
                        && !parts
                            .iter()
                            .any(|e| *e == target || e.reversed() == target)
                })
            })
            .collect();
        alternatives.shuffle(rng);

        alternatives
            .iter()
            .take(want)
            .flat_map(|parts| parts.iter().copied())
            .collect()
    }

    /// Expand a story edge, then keep expanding the part that leaves the
    /// story, so the walk touches the story at one anchor node only.
    fn irrelevant_edges(
        &self,
        puzzle: &Puzzle,
        story: &BTreeSet<NodeId>,
        want: usize,
        rng: &mut impl Rng,
    ) -> Vec<Edge> {
        let target = puzzle.target.edge();
        let mut starts: Vec<Edge> = puzzle.story.iter().map(Fact::edge).collect();
        starts.shuffle(rng);

        for start in starts {
            let mut walk: Vec<Edge> = Vec::new();
            let mut anchor: Option<NodeId> = None;
            let mut current = start;
            while walk.len() < want {
                let dangling = |e: &Edge| {
                    if *e == target || e.reversed() == target {
                        return false;
                    }
                    if walk.iter().any(|w| w == e || w.reversed() == *e) {
                        return false;
                    }
                    let inside: Vec<NodeId> =
                        [e.from, e.to].into_iter().filter(|n| story.contains(n)).collect();
                    match (inside.as_slice(), anchor) {
                        ([], anchor) => anchor.is_some(),
                        ([_], None) => true,
                        ([n], Some(a)) => *n == a,
                        _ => false,
                    }
                };
                let Some(parts) =
                    self.next_expansion(current, |parts| parts.iter().any(|e| dangling(e)))
                else {
                    break;
                };
                let Some(part) = parts.iter().copied().find(|e| dangling(e)) else {
                    break;
                };
                if anchor.is_none() {
                    anchor = [part.from, part.to].into_iter().find(|n| story.contains(n));
                }
                walk.push(part);
                current = part;
            }
            if !walk.is_empty() {
                return walk;
            }
        }
        Vec::new()
    }

    /// First round-robin decomposition of `edge` accepted by `keep`, trying
    /// each option at most once.
    fn next_expansion(&self, edge: Edge, keep: impl Fn(&[Edge; 2]) -> bool) -> Option<[Edge; 2]> {
        (0..self.index.options(edge).len())
            .filter_map(|_| self.index.next(edge))
            .find(|parts| keep(parts))
    }

    fn disconnected_edges(
        &self,
        story: &BTreeSet<NodeId>,
        want: usize,
        rng: &mut impl Rng,
    ) -> Vec<Edge> {
        let pool: Vec<Edge> = self
            .closure
            .edges()
            .map(|(e, _)| e)
            .filter(|e| e.from < e.to && !story.contains(&e.from) && !story.contains(&e.to))
            .collect();
        pool.choose_multiple(rng, want).copied().collect()
    }
}

/// Between 1 and half the story length facts (or expansions) per group.
fn group_size(story_len: usize, rng: &mut impl Rng) -> usize {
    rng.gen_range(1..=(story_len / 2).max(1))
}

/// Verify a noise group's overlap with the story nodes.
pub fn check_overlap(kind: NoiseKind, facts: &[Fact], story: &BTreeSet<NodeId>) -> PuzzleResult<()> {
    let shared: BTreeSet<NodeId> = facts
        .iter()
        .flat_map(|f| [f.from, f.to])
        .filter(|n| story.contains(n))
        .collect();
    if kind.admits(shared.len()) {
        Ok(())
    } else {
        Err(PuzzleError::NoiseOverlap {
            kind: kind.to_string(),
            expected: kind.expected().to_string(),
            actual: shared.len(),
        })
    }
}
