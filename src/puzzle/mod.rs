//! Puzzles: a target relation, the story of atomic facts it decomposes into,
//! the proof trace of that decomposition, and optional noise facts.
//!
//! - [`PuzzleBuilder`]: backward chaining from a target edge (`derive`) and batch building
//! - [`noise`]: supporting, irrelevant and disconnected noise injection
//!
//! A puzzle is immutable once it leaves the builder.

pub mod builder;
pub mod noise;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::PuzzleError;
use crate::graph::{Edge, NodeId};

pub use builder::PuzzleBuilder;
pub use noise::NoiseConfig;

/// Result type for puzzle construction.
pub type PuzzleResult<T> = std::result::Result<T, PuzzleError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier of a puzzle within a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PuzzleId(pub u64);

impl std::fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "puzzle:{}", self.0)
    }
}

/// Thread-safe puzzle id allocator.
#[derive(Debug, Default)]
pub struct PuzzleIdAllocator {
    next: AtomicU64,
}

impl PuzzleIdAllocator {
    /// Allocator starting from id 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> PuzzleId {
        PuzzleId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// Facts and proof trace
// ---------------------------------------------------------------------------

/// A relation fact `(from, relation, to)`: `to` is `from`'s `relation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: String,
}

impl Fact {
    pub fn edge(&self) -> Edge {
        Edge::new(self.from, self.to)
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.from, self.relation, self.to)
    }
}

/// A fact rendered with display names and a gendered relation word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedFact {
    pub from: String,
    pub relation: String,
    pub to: String,
}

impl std::fmt::Display for FormattedFact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.from, self.relation, self.to)
    }
}

/// One backward-chaining step: `edge` was replaced by `parts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub edge: Edge,
    pub parts: [Edge; 2],
    pub text: FormattedFact,
    pub parts_text: [FormattedFact; 2],
}

impl std::fmt::Display for ProofStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: [{}, {}]",
            self.text, self.parts_text[0], self.parts_text[1]
        )
    }
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Overlap class of a noise group relative to the story's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    /// Shares at least two nodes with the story.
    Supporting,
    /// Shares exactly one node with the story.
    Irrelevant,
    /// Shares no node with the story.
    Disconnected,
}

impl NoiseKind {
    /// Whether `shared` story nodes satisfy this kind's overlap constraint.
    pub fn admits(self, shared: usize) -> bool {
        match self {
            NoiseKind::Supporting => shared >= 2,
            NoiseKind::Irrelevant => shared == 1,
            NoiseKind::Disconnected => shared == 0,
        }
    }

    pub fn expected(self) -> &'static str {
        match self {
            NoiseKind::Supporting => "at least 2",
            NoiseKind::Irrelevant => "exactly 1",
            NoiseKind::Disconnected => "0",
        }
    }
}

impl std::fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseKind::Supporting => write!(f, "supporting"),
            NoiseKind::Irrelevant => write!(f, "irrelevant"),
            NoiseKind::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Noise facts of one kind attached to a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseGroup {
    pub kind: NoiseKind,
    pub facts: Vec<Fact>,
}

// ---------------------------------------------------------------------------
// Puzzle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: PuzzleId,
    pub target: Fact,
    /// Story facts in path order from `target.from` to `target.to`.
    pub story: Vec<Fact>,
    pub proof: Vec<ProofStep>,
    pub noise: Vec<NoiseGroup>,
    /// Gendered surface words of the story joined with `-`.
    pub relation_comb: String,
    /// Target rendered with names.
    pub query: FormattedFact,
}

impl Puzzle {
    /// Relation-combination signature of the story.
    pub fn relation_comb(&self) -> &str {
        &self.relation_comb
    }

    /// Nodes touched by the story.
    pub fn story_nodes(&self) -> BTreeSet<NodeId> {
        self.story.iter().flat_map(|f| [f.from, f.to]).collect()
    }

    /// Every noise fact, group by group.
    pub fn noise_facts(&self) -> impl Iterator<Item = &Fact> {
        self.noise.iter().flat_map(|g| g.facts.iter())
    }

    /// Noise group of the given kind, if attached.
    pub fn noise_group(&self, kind: NoiseKind) -> Option<&NoiseGroup> {
        self.noise.iter().find(|g| g.kind == kind)
    }

    /// Story followed from `target.from` by matching each fact's `to` to the
    /// next fact's `from`.
    pub fn ordered_story(&self) -> Vec<&Fact> {
        let mut by_source: BTreeMap<NodeId, &Fact> =
            self.story.iter().map(|f| (f.from, f)).collect();
        let mut out = Vec::with_capacity(self.story.len());
        let mut at = self.target.from;
        while let Some(fact) = by_source.remove(&at) {
            at = fact.to;
            out.push(fact);
        }
        out
    }

    /// Story and noise facts shuffled together.
    pub fn full_story(&self, rng: &mut impl Rng) -> Vec<Fact> {
        let mut facts: Vec<Fact> = self
            .story
            .iter()
            .chain(self.noise_facts())
            .cloned()
            .collect();
        facts.shuffle(rng);
        facts
    }

    /// Puzzle-local node numbering in order of first appearance over the
    /// story, then the noise facts.
    pub fn node_mapping(&self) -> BTreeMap<NodeId, usize> {
        let mut mapping = BTreeMap::new();
        for fact in self.story.iter().chain(self.noise_facts()) {
            for node in [fact.from, fact.to] {
                let next = mapping.len();
                mapping.entry(node).or_insert(next);
            }
        }
        mapping
    }
}

/// Puzzles built from one pass over the candidate targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuzzleBatch {
    pub puzzles: Vec<Puzzle>,
}

impl PuzzleBatch {
    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Puzzle> {
        self.puzzles.iter()
    }

    /// Distinct relation-combination signatures, sorted.
    pub fn unique_signatures(&self) -> Vec<String> {
        self.signature_counts().into_keys().collect()
    }

    /// Number of puzzles per relation-combination signature.
    pub fn signature_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for puzzle in &self.puzzles {
            *counts.entry(puzzle.relation_comb.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl IntoIterator for PuzzleBatch {
    type Item = Puzzle;
    type IntoIter = std::vec::IntoIter<Puzzle>;

    fn into_iter(self) -> Self::IntoIter {
        self.puzzles.into_iter()
    }
}

impl FromIterator<Puzzle> for PuzzleBatch {
    fn from_iter<I: IntoIterator<Item = Puzzle>>(iter: I) -> Self {
        Self {
            puzzles: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chain postcondition
// ---------------------------------------------------------------------------

/// Verify that `story` is a simple directed path from `target.from` to
/// `target.to`.
pub fn check_chain(target: Edge, story: &[Edge]) -> PuzzleResult<()> {
    let broken = |detail: String| PuzzleError::BrokenChain {
        from: target.from.0,
        to: target.to.0,
        detail,
    };

    let (Some(first), Some(last)) = (story.first(), story.last()) else {
        return Err(broken("empty story".into()));
    };
    if first.from != target.from || last.to != target.to {
        return Err(broken(format!(
            "story runs {} → {}, target is {target}",
            first.from, last.to
        )));
    }
    if let Some(edge) = story.iter().find(|e| e.is_loop()) {
        return Err(broken(format!("self-loop {edge}")));
    }
    for pair in story.windows(2) {
        if pair[0].to != pair[1].from {
            return Err(broken(format!("{} does not continue {}", pair[1], pair[0])));
        }
    }

    let mut path: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for edge in story {
        path.add_edge(edge.from, edge.to, ());
    }
    if path.node_count() != story.len() + 1 {
        return Err(broken(format!(
            "{} nodes for {} edges, story revisits a node",
            path.node_count(),
            story.len()
        )));
    }
    for node in path.nodes() {
        let out = path.neighbors_directed(node, Direction::Outgoing).count();
        let inc = path.neighbors_directed(node, Direction::Incoming).count();
        if out > 1 || inc > 1 {
            return Err(broken(format!("node {node} branches")));
        }
    }
    if !has_path_connecting(&path, target.from, target.to, None) {
        return Err(broken("target endpoints are not connected".into()));
    }
    Ok(())
}
