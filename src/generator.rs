//! Generation session: one simulated family, its closure and expansion
//! index, and the loop that turns them into puzzles.

use std::collections::BTreeSet;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::algebra::{FAMILY_CHANNEL, RelationAlgebra, RuleStore};
use crate::closure::{Closure, ClosureEngine};
use crate::error::{ConfigError, KinResult, PuzzleError};
use crate::expansion::ExpansionIndex;
use crate::graph::{Edge, FamilyConfig, KinshipGraph, NamePool, simulate};
use crate::puzzle::{NoiseConfig, Puzzle, PuzzleBatch, PuzzleBuilder, PuzzleIdAllocator};

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Generation settings, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Seed for simulation, chaining and noise (default: 42).
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Facts per story (default: 3).
    #[serde(default = "default_story_length")]
    pub story_length: usize,
    /// Puzzles to generate (default: 10).
    #[serde(default = "default_puzzles")]
    pub puzzles: usize,
    /// Upper bound on batch rounds before giving up (default: 16).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Rule channel to reason in (default: "family").
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub family: FamilyConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub names: NamePool,
}

fn default_seed() -> u64 {
    42
}
fn default_story_length() -> usize {
    3
}
fn default_puzzles() -> usize {
    10
}
fn default_max_rounds() -> usize {
    16
}
fn default_channel() -> String {
    FAMILY_CHANNEL.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            story_length: default_story_length(),
            puzzles: default_puzzles(),
            max_rounds: default_max_rounds(),
            channel: default_channel(),
            family: FamilyConfig::default(),
            noise: NoiseConfig::default(),
            names: NamePool::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.story_length == 0 {
            return Err(ConfigError::Invalid {
                message: "story_length must be > 0".into(),
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                message: "max_rounds must be > 0".into(),
            });
        }
        self.family.validate()
    }
}

/// A generation session over one simulated family.
pub struct Generator {
    config: GeneratorConfig,
    algebra: RelationAlgebra,
    graph: KinshipGraph,
    closure: Closure,
    index: ExpansionIndex,
    names: NamePool,
    ids: PuzzleIdAllocator,
    rng: StdRng,
}

impl Generator {
    /// Simulate a family and precompute its closure and expansion index.
    pub fn new(config: GeneratorConfig, rules: &RuleStore) -> KinResult<Self> {
        config.validate()?;
        let algebra = RelationAlgebra::from_store(rules, &config.channel)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut names = config.names.clone();
        let graph = simulate(&config.family, &mut names, &mut rng)?;
        Self::with_graph(config, algebra, graph, names, rng)
    }

    /// Start a session over an existing graph.
    pub fn from_graph(
        config: GeneratorConfig,
        algebra: RelationAlgebra,
        graph: KinshipGraph,
    ) -> KinResult<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        let mut names = config.names.clone();
        names.reserve(graph.people().iter().map(|p| p.name.clone()));
        Self::with_graph(config, algebra, graph, names, rng)
    }

    fn with_graph(
        config: GeneratorConfig,
        algebra: RelationAlgebra,
        graph: KinshipGraph,
        names: NamePool,
        rng: StdRng,
    ) -> KinResult<Self> {
        let closure = ClosureEngine::new(&algebra).close(&graph)?;
        let index = ExpansionIndex::build(&closure, &algebra);
        Ok(Self {
            config,
            algebra,
            graph,
            closure,
            index,
            names,
            ids: PuzzleIdAllocator::new(),
            rng,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn algebra(&self) -> &RelationAlgebra {
        &self.algebra
    }

    pub fn graph(&self) -> &KinshipGraph {
        &self.graph
    }

    pub fn closure(&self) -> &Closure {
        &self.closure
    }

    pub fn index(&self) -> &ExpansionIndex {
        &self.index
    }

    /// Generate `config.puzzles` puzzles.
    ///
    /// Batches are built over the unconsumed closure edges. When a batch
    /// yields nothing, one person's gender is flipped (renaming them) and
    /// the consumed set is cleared so targets are reused with fresh surface
    /// forms. Gives up when a batch right after such a reset yields
    /// nothing, or after `max_rounds` batches.
    pub fn generate(&mut self) -> KinResult<PuzzleBatch> {
        let wanted = self.config.puzzles;
        let length = self.config.story_length;
        let spouse = self.config.family.spouse_relation.clone();
        let mut out: Vec<Puzzle> = Vec::with_capacity(wanted);
        let mut consumed: BTreeSet<Edge> = BTreeSet::new();
        let mut fresh = true;
        let mut dropped = 0usize;

        for round in 0..self.config.max_rounds {
            if out.len() >= wanted {
                break;
            }
            let builder = PuzzleBuilder::new(
                &self.algebra,
                &self.graph,
                &self.closure,
                &self.index,
                &self.ids,
            );
            match builder.build_batch(length, &mut consumed, &mut self.rng) {
                Ok(batch) => {
                    fresh = false;
                    for mut puzzle in batch {
                        if out.len() >= wanted {
                            break;
                        }
                        if self.config.noise.is_enabled() {
                            let noise = &self.config.noise;
                            match builder.add_noise(&mut puzzle, noise, &mut self.rng) {
                                Ok(()) => {}
                                Err(PuzzleError::InsufficientNoise { .. }) => {
                                    dropped += 1;
                                    tracing::debug!(puzzle = %puzzle.id, "dropped puzzle without noise");
                                    continue;
                                }
                                Err(e) => return Err(e.into()),
                            }
                        }
                        out.push(puzzle);
                    }
                }
                Err(e @ PuzzleError::NoPuzzlesProducible { .. }) if fresh => {
                    return Err(e.into());
                }
                Err(PuzzleError::NoPuzzlesProducible { .. }) => {
                    if !self.graph.next_flip(&mut self.rng, &mut self.names, &spouse)? {
                        self.graph.next_flip(&mut self.rng, &mut self.names, &spouse)?;
                    }
                    consumed.clear();
                    fresh = true;
                    tracing::debug!(
                        round,
                        epoch = self.graph.epoch(),
                        "flipped a gender, reusing targets"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        if out.is_empty() {
            return Err(PuzzleError::NoPuzzlesProducible {
                candidates: self.closure.len(),
                length,
            }
            .into());
        }
        if out.len() < wanted {
            tracing::warn!(
                produced = out.len(),
                wanted,
                rounds = self.config.max_rounds,
                "round limit reached before puzzle count"
            );
        }
        tracing::info!(puzzles = out.len(), dropped, length, "generation finished");
        Ok(PuzzleBatch { puzzles: out })
    }
}
