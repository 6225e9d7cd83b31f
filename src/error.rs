//! Rich diagnostic error types for the kinpuzzle engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the kinpuzzle engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KinError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Closure(#[from] ClosureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Puzzle(#[from] PuzzleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Relation algebra errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AlgebraError {
    #[error("rule table references unknown relation \"{relation}\" in {table}")]
    #[diagnostic(
        code(kin::algebra::unknown_relation),
        help(
            "Every relation named by a compose, inverse, symmetric or equivalence \
             rule must be listed in the channel's `relations` vocabulary."
        )
    )]
    UnknownRelation { relation: String, table: String },

    #[error(
        "conflicting composition rules: {first} ∘ {second} yields both \"{existing}\" and \"{conflicting}\""
    )]
    #[diagnostic(
        code(kin::algebra::conflicting_rule),
        help(
            "Equivalent labels fold into their canonical form, so rules over \
             equivalent labels must compose to equivalent results."
        )
    )]
    ConflictingRule {
        first: String,
        second: String,
        existing: String,
        conflicting: String,
    },

    #[error("relation channel \"{channel}\" not found in rule store")]
    #[diagnostic(
        code(kin::algebra::unknown_channel),
        help("The engine reads the `family` channel by default. Check the channel name in the config.")
    )]
    UnknownChannel { channel: String },

    #[error("relation vocabulary for channel \"{channel}\" is empty")]
    #[diagnostic(
        code(kin::algebra::empty_vocabulary),
        help("Add at least the ground-truth relations (e.g. \"SO\" and \"child\") to `relations`.")
    )]
    EmptyVocabulary { channel: String },

    #[error("relation vocabulary exceeds {max} labels")]
    #[diagnostic(
        code(kin::algebra::too_many_relations),
        help("Split the vocabulary into separate channels.")
    )]
    TooManyRelations { max: usize },

    #[error("failed to read rule file: {path}")]
    #[diagnostic(
        code(kin::algebra::io),
        help("Ensure the rule file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule table: {message}")]
    #[diagnostic(
        code(kin::algebra::parse),
        help("Check the TOML syntax of the rule file. See the bundled family.toml for the format.")
    )]
    Parse { message: String },
}

// ---------------------------------------------------------------------------
// Kinship graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("person not found: node {node}")]
    #[diagnostic(
        code(kin::graph::node_not_found),
        help("Add the person with `KinshipGraph::add_person` before relating them.")
    )]
    NodeNotFound { node: u32 },

    #[error("self-loop rejected: node {node} cannot be related to itself")]
    #[diagnostic(
        code(kin::graph::self_loop),
        help("Relations always connect two distinct people.")
    )]
    SelfLoop { node: u32 },

    #[error("name pool exhausted: no unused {gender} names left")]
    #[diagnostic(
        code(kin::graph::names_exhausted),
        help(
            "Every name in the pool is already taken. Add more names to the \
             `[names]` section of the config or shrink the family tree."
        )
    )]
    NamesExhausted { gender: String },
}

// ---------------------------------------------------------------------------
// Closure errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClosureError {
    #[error("edge ({from}, {to}) is labeled \"{relation}\", which the rule table does not define")]
    #[diagnostic(
        code(kin::closure::unknown_relation),
        help(
            "The kinship graph and the rule table disagree. Add the relation to \
             the channel's vocabulary or fix the graph simulation's relation names."
        )
    )]
    UnknownRelation { from: u32, to: u32, relation: String },
}

// ---------------------------------------------------------------------------
// Puzzle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PuzzleError {
    #[error("no puzzles of length {length} producible from {candidates} candidate edge(s)")]
    #[diagnostic(
        code(kin::puzzle::none_producible),
        help(
            "No target edge could be decomposed into a story of the requested length. \
             Enlarge the graph (more levels or children) or request a shorter story."
        )
    )]
    NoPuzzlesProducible { candidates: usize, length: usize },

    #[error("story for target ({from}, {to}) is not a connected path: {detail}")]
    #[diagnostic(
        code(kin::puzzle::broken_chain),
        help("Backward chaining produced an invalid story. This is an engine bug; please report it.")
    )]
    BrokenChain { from: u32, to: u32, detail: String },

    #[error("{kind} noise shares {actual} node(s) with the story, expected {expected}")]
    #[diagnostic(
        code(kin::puzzle::noise_overlap),
        help("Noise injection produced facts violating their overlap class. This is an engine bug.")
    )]
    NoiseOverlap {
        kind: String,
        expected: String,
        actual: usize,
    },

    #[error("no qualifying {kind} noise facts for puzzle {puzzle}")]
    #[diagnostic(
        code(kin::puzzle::insufficient_noise),
        help("Drop the puzzle, or disable this noise kind for small graphs.")
    )]
    InsufficientNoise { kind: String, puzzle: u64 },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(kin::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(kin::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(kin::config::invalid), help("Check the generator config fields. {message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning kinpuzzle results.
pub type KinResult<T> = std::result::Result<T, KinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_kin_error() {
        let err = GraphError::SelfLoop { node: 3 };
        let kin: KinError = err.into();
        assert!(matches!(kin, KinError::Graph(GraphError::SelfLoop { node: 3 })));
    }

    #[test]
    fn puzzle_error_converts_to_kin_error() {
        let err = PuzzleError::NoPuzzlesProducible {
            candidates: 12,
            length: 4,
        };
        let kin: KinError = err.into();
        assert!(matches!(
            kin,
            KinError::Puzzle(PuzzleError::NoPuzzlesProducible { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ClosureError::UnknownRelation {
            from: 1,
            to: 2,
            relation: "cousin".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("(1, 2)"));
        assert!(msg.contains("cousin"));
    }
}
