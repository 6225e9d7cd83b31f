// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kinpuzzle
//!
//! A relation-inference and puzzle-construction engine over kinship graphs.
//! Given a family tree and an algebra of relation-composition rules, it
//! computes every derivable pairwise relation, decomposes target relations
//! into stories of atomic facts with a checkable proof trace, and injects
//! structurally constrained noise facts.
//!
//! ## Architecture
//!
//! - **Relation algebra** (`algebra`): composition, inverse, symmetry and equivalence rules from TOML
//! - **Kinship graph** (`graph`): people and ground-truth relations, seeded family simulation
//! - **Closure** (`closure`): parallel worklist fixpoint over all ordered pairs
//! - **Expansion index** (`expansion`): round-robin one-step decompositions per edge
//! - **Puzzles** (`puzzle`): backward chaining, proof traces, noise injection
//! - **Generator** (`generator`): configured end-to-end generation loop
//!
//! ## Library usage
//!
//! ```no_run
//! use kinpuzzle::algebra::RuleStore;
//! use kinpuzzle::generator::{Generator, GeneratorConfig};
//!
//! let mut generator =
//!     Generator::new(GeneratorConfig::default(), &RuleStore::bundled().unwrap()).unwrap();
//! for puzzle in generator.generate().unwrap().iter() {
//!     println!("{}: {}", puzzle.query, puzzle.relation_comb());
//! }
//! ```

pub mod algebra;
pub mod closure;
pub mod error;
pub mod expansion;
pub mod generator;
pub mod graph;
pub mod puzzle;
