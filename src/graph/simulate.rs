//! Seeded family-tree simulation.
//!
//! Starts from a single male root. Each generation, every parent marries
//! with probability `p_marry`; married couples below the last level get
//! `min_child..=max_child` children related to both parents.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::ancestry::GraphResult;
use super::{Gender, KinshipGraph, NamePool, NodeId};

/// Shape parameters of the simulated family tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Number of generations (default: 3).
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
    #[serde(default = "default_min_child")]
    pub min_child: usize,
    #[serde(default = "default_max_child")]
    pub max_child: usize,
    /// Probability that a parent marries (default: 1.0).
    #[serde(default = "default_p_marry")]
    pub p_marry: f64,
    /// Ground-truth label for spouse edges (default: "SO").
    #[serde(default = "default_spouse_relation")]
    pub spouse_relation: String,
    /// Ground-truth label for parent → child edges (default: "child").
    #[serde(default = "default_child_relation")]
    pub child_relation: String,
}

fn default_max_levels() -> usize {
    3
}
fn default_min_child() -> usize {
    2
}
fn default_max_child() -> usize {
    3
}
fn default_p_marry() -> f64 {
    1.0
}
fn default_spouse_relation() -> String {
    "SO".into()
}
fn default_child_relation() -> String {
    "child".into()
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            max_levels: default_max_levels(),
            min_child: default_min_child(),
            max_child: default_max_child(),
            p_marry: default_p_marry(),
            spouse_relation: default_spouse_relation(),
            child_relation: default_child_relation(),
        }
    }
}

impl FamilyConfig {
    /// Check the shape parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_levels == 0 {
            return Err(ConfigError::Invalid {
                message: "family.max_levels must be > 0".into(),
            });
        }
        if self.min_child > self.max_child {
            return Err(ConfigError::Invalid {
                message: format!(
                    "family.min_child ({}) exceeds family.max_child ({})",
                    self.min_child, self.max_child
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.p_marry) {
            return Err(ConfigError::Invalid {
                message: format!("family.p_marry must be in [0, 1], got {}", self.p_marry),
            });
        }
        Ok(())
    }
}

/// Simulate a family tree.
pub fn simulate(
    config: &FamilyConfig,
    names: &mut NamePool,
    rng: &mut impl Rng,
) -> GraphResult<KinshipGraph> {
    let mut graph = KinshipGraph::new();
    let root_name = names.take(Gender::Male, rng)?;
    let mut parents: Vec<NodeId> = vec![graph.add_person(Gender::Male, root_name)];

    for level in 0..config.max_levels {
        let mut generation = Vec::new();
        for &parent in &parents {
            if !rng.gen_bool(config.p_marry) {
                continue;
            }
            let parent_gender = graph
                .person(parent)
                .map(|p| p.gender)
                .unwrap_or(Gender::Male);
            let spouse_gender = parent_gender.toggled();
            let spouse_name = names.take(spouse_gender, rng)?;
            let spouse = graph.add_person(spouse_gender, spouse_name);
            graph.add_edge(parent, spouse, &config.spouse_relation)?;

            // The last generation stays childless.
            if level + 1 == config.max_levels {
                continue;
            }
            let children = rng.gen_range(config.min_child..=config.max_child);
            for _ in 0..children {
                let gender = if rng.gen_bool(0.5) {
                    Gender::Male
                } else {
                    Gender::Female
                };
                let name = names.take(gender, rng)?;
                let child = graph.add_person(gender, name);
                graph.add_edge(parent, child, &config.child_relation)?;
                graph.add_edge(spouse, child, &config.child_relation)?;
                generation.push(child);
            }
        }
        parents = generation;
    }

    tracing::debug!(
        people = graph.node_count(),
        edges = graph.edge_count(),
        levels = config.max_levels,
        "simulated family tree"
    );
    Ok(graph)
}
