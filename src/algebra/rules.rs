//! Data-driven relation rule tables.
//!
//! Rules are data, not code: they are loaded from TOML (one table per
//! relation channel) or constructed programmatically with the `with_*`
//! builders. The bundled kinship table is compiled into the binary.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AlgebraError;

use super::AlgebraResult;

/// The bundled kinship rule store (`family` channel).
const BUNDLED_FAMILY: &str = include_str!("family.toml");

/// Default relation channel read by the engine.
pub const FAMILY_CHANNEL: &str = "family";

// ---------------------------------------------------------------------------
// Surface words
// ---------------------------------------------------------------------------

/// Gendered surface words for one relation, keyed by the gender of the
/// person the relation points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Rule table for a single relation channel.
///
/// `compose[a][b] = c` reads `(x, a, z) ∧ (z, b, y) ⇒ (x, c, y)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    /// Legal relation labels, in id order.
    #[serde(default)]
    pub relations: Vec<String>,
    #[serde(default)]
    pub compose: BTreeMap<String, BTreeMap<String, String>>,
    /// `(x, r, y) ⇒ (y, inverse[r], x)`.
    #[serde(default)]
    pub inverse: BTreeMap<String, String>,
    /// `(x, r, y)` licenses `(y, symmetric[r], x)`.
    #[serde(default)]
    pub symmetric: BTreeMap<String, String>,
    /// Rewrites `r` to its canonical label.
    #[serde(default)]
    pub equivalence: BTreeMap<String, String>,
    #[serde(default)]
    pub lexicon: BTreeMap<String, Surface>,
}

impl RuleTable {
    /// Register a relation label, keeping the first registration's position.
    pub fn with_relation(mut self, relation: &str) -> Self {
        self.register(relation);
        self
    }

    /// Add a composition rule `a ∘ b = c`, registering all three labels.
    /// Replaces any earlier rule for the same `a ∘ b`.
    pub fn with_compose(mut self, a: &str, b: &str, c: &str) -> Self {
        self.register(a);
        self.register(b);
        self.register(c);
        self.compose
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), c.to_string());
        self
    }

    /// Add an inverse rule `r → r'`.
    pub fn with_inverse(mut self, relation: &str, inverse: &str) -> Self {
        self.register(relation);
        self.register(inverse);
        self.inverse.insert(relation.to_string(), inverse.to_string());
        self
    }

    /// Add a symmetric rule `r → r'`.
    pub fn with_symmetric(mut self, relation: &str, mirror: &str) -> Self {
        self.register(relation);
        self.register(mirror);
        self.symmetric.insert(relation.to_string(), mirror.to_string());
        self
    }

    /// Add an equivalence rule rewriting `r` to `canonical`.
    pub fn with_equivalence(mut self, relation: &str, canonical: &str) -> Self {
        self.register(relation);
        self.register(canonical);
        self.equivalence
            .insert(relation.to_string(), canonical.to_string());
        self
    }

    /// Attach gendered surface words to a relation.
    pub fn with_surface(mut self, relation: &str, male: &str, female: &str) -> Self {
        self.lexicon.insert(
            relation.to_string(),
            Surface {
                male: Some(male.to_string()),
                female: Some(female.to_string()),
            },
        );
        self
    }

    fn register(&mut self, relation: &str) {
        if !self.relations.iter().any(|r| r == relation) {
            self.relations.push(relation.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Rule store
// ---------------------------------------------------------------------------

/// All rule tables, keyed by relation channel (`family`, `work`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleStore {
    pub channels: BTreeMap<String, RuleTable>,
}

impl RuleStore {
    /// The bundled kinship rule store.
    pub fn bundled() -> AlgebraResult<Self> {
        Self::from_toml_str(BUNDLED_FAMILY)
    }

    /// Parse a rule store from TOML text.
    pub fn from_toml_str(text: &str) -> AlgebraResult<Self> {
        toml::from_str(text).map_err(|e| AlgebraError::Parse {
            message: e.to_string(),
        })
    }

    /// Load a rule store from a TOML file.
    pub fn load(path: &Path) -> AlgebraResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AlgebraError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Look up a channel's table.
    pub fn channel(&self, channel: &str) -> AlgebraResult<&RuleTable> {
        self.channels
            .get(channel)
            .ok_or_else(|| AlgebraError::UnknownChannel {
                channel: channel.to_string(),
            })
    }

    /// Wrap a single table as the `family` channel.
    pub fn single(table: RuleTable) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(FAMILY_CHANNEL.to_string(), table);
        Self { channels }
    }
}
