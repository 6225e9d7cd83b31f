//! Relation algebra: immutable lookup structure over a channel's rule table.
//!
//! Relation labels are interned into dense [`RelationId`]s. Composition is a
//! flat `n × n` table, and the inverted composition index ("which `(a, b)`
//! pairs produce `c`") is computed once at construction so decomposition
//! never scans the rule table.

pub mod rules;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AlgebraError;
use crate::graph::Gender;

pub use rules::{FAMILY_CHANNEL, RuleStore, RuleTable, Surface};

/// Result type for relation algebra operations.
pub type AlgebraResult<T> = std::result::Result<T, AlgebraError>;

/// Upper bound on the vocabulary size; keeps the dense composition table small.
pub const MAX_RELATIONS: usize = 1024;

/// Dense identifier of a relation label within one algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelationId(u16);

impl RelationId {
    /// Position of this relation in the vocabulary.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rel:{}", self.0)
    }
}

/// Composition, inversion, symmetry and equivalence of relation labels.
#[derive(Debug, Clone)]
pub struct RelationAlgebra {
    channel: String,
    labels: Vec<String>,
    lookup: HashMap<String, RelationId>,
    /// Row-major `labels.len()²` composition table.
    compose: Vec<Option<RelationId>>,
    inverse: Vec<Option<RelationId>>,
    symmetric: Vec<Option<RelationId>>,
    canonical: Vec<Option<RelationId>>,
    /// `decompositions[c]` lists every `(a, b)` with `a ∘ b = c`.
    decompositions: Vec<Vec<(RelationId, RelationId)>>,
    lexicon: Vec<Surface>,
    composition_count: usize,
}

impl RelationAlgebra {
    /// Build the algebra for one channel of a rule store.
    pub fn from_store(store: &RuleStore, channel: &str) -> AlgebraResult<Self> {
        Self::from_table(channel, store.channel(channel)?)
    }

    /// The bundled kinship algebra.
    pub fn family() -> AlgebraResult<Self> {
        Self::from_store(&RuleStore::bundled()?, FAMILY_CHANNEL)
    }

    /// Build and validate the algebra from a rule table.
    ///
    /// Every label referenced by a rule must be in the table's vocabulary.
    pub fn from_table(channel: &str, table: &RuleTable) -> AlgebraResult<Self> {
        if table.relations.is_empty() {
            return Err(AlgebraError::EmptyVocabulary {
                channel: channel.to_string(),
            });
        }
        if table.relations.len() > MAX_RELATIONS {
            return Err(AlgebraError::TooManyRelations { max: MAX_RELATIONS });
        }

        let mut labels = Vec::with_capacity(table.relations.len());
        let mut lookup = HashMap::with_capacity(table.relations.len());
        for label in &table.relations {
            if lookup.contains_key(label) {
                continue;
            }
            lookup.insert(label.clone(), RelationId(labels.len() as u16));
            labels.push(label.clone());
        }

        let n = labels.len();
        let resolve = |label: &str, table: &str| -> AlgebraResult<RelationId> {
            lookup
                .get(label)
                .copied()
                .ok_or_else(|| AlgebraError::UnknownRelation {
                    relation: label.to_string(),
                    table: table.to_string(),
                })
        };

        let unary = |rules: &std::collections::BTreeMap<String, String>,
                     name: &str|
         -> AlgebraResult<Vec<Option<RelationId>>> {
            let mut out = vec![None; n];
            for (from, to) in rules {
                out[resolve(from, name)?.index()] = Some(resolve(to, name)?);
            }
            Ok(out)
        };
        let inverse = unary(&table.inverse, "inverse")?;
        let symmetric = unary(&table.symmetric, "symmetric")?;
        let canonical = unary(&table.equivalence, "equivalence")?;
        let canon = |r: RelationId| canonical[r.index()].unwrap_or(r);

        let mut compose = vec![None; n * n];
        let mut decompositions = vec![Vec::new(); n];
        let mut folded: HashMap<(RelationId, RelationId), RelationId> = HashMap::new();
        let mut composition_count = 0;
        for (a, row) in &table.compose {
            let a = resolve(a, "compose")?;
            for (b, c) in row {
                let b = resolve(b, "compose")?;
                let c = resolve(c, "compose")?;
                let key = (canon(a), canon(b));
                let existing = *folded.entry(key).or_insert(canon(c));
                if existing != canon(c) {
                    return Err(AlgebraError::ConflictingRule {
                        first: labels[key.0.index()].clone(),
                        second: labels[key.1.index()].clone(),
                        existing: labels[existing.index()].clone(),
                        conflicting: labels[canon(c).index()].clone(),
                    });
                }
                compose[a.index() * n + b.index()] = Some(c);
                decompositions[c.index()].push((a, b));
                composition_count += 1;
            }
        }

        let mut lexicon = vec![Surface::default(); n];
        for (relation, surface) in &table.lexicon {
            lexicon[resolve(relation, "lexicon")?.index()] = surface.clone();
        }

        tracing::debug!(
            channel,
            relations = n,
            compositions = composition_count,
            "relation algebra built"
        );

        Ok(Self {
            channel: channel.to_string(),
            labels,
            lookup,
            compose,
            inverse,
            symmetric,
            canonical,
            decompositions,
            lexicon,
            composition_count,
        })
    }

    /// `a ∘ b`, if a rule defines it.
    pub fn compose(&self, a: RelationId, b: RelationId) -> Option<RelationId> {
        self.compose[a.index() * self.labels.len() + b.index()]
    }

    /// Inverse-equivalence of `r`.
    pub fn invert(&self, r: RelationId) -> Option<RelationId> {
        self.inverse[r.index()]
    }

    /// Symmetric counterpart of `r`.
    pub fn symmetric(&self, r: RelationId) -> Option<RelationId> {
        self.symmetric[r.index()]
    }

    /// Canonical label for `r`, if `r` has an equivalence rule.
    pub fn canonicalize(&self, r: RelationId) -> Option<RelationId> {
        self.canonical[r.index()]
    }

    /// `r` rewritten to its canonical form, or `r` itself.
    pub fn canonical_or_self(&self, r: RelationId) -> RelationId {
        self.canonicalize(r).unwrap_or(r)
    }

    /// Every `(a, b)` with `a ∘ b = c`, in rule-table order.
    pub fn decompositions(&self, c: RelationId) -> &[(RelationId, RelationId)] {
        &self.decompositions[c.index()]
    }

    /// Intern lookup for a label.
    pub fn resolve(&self, label: &str) -> Option<RelationId> {
        self.lookup.get(label).copied()
    }

    /// Label of a relation id.
    pub fn label(&self, r: RelationId) -> &str {
        &self.labels[r.index()]
    }

    /// Gendered surface word for `r` pointing at a person of `gender`,
    /// falling back to the raw label.
    pub fn surface(&self, r: RelationId, gender: Gender) -> &str {
        let surface = &self.lexicon[r.index()];
        let word = match gender {
            Gender::Male => surface.male.as_deref(),
            Gender::Female => surface.female.as_deref(),
        };
        word.unwrap_or_else(|| self.label(r))
    }

    /// All relation ids in vocabulary order.
    pub fn relations(&self) -> impl Iterator<Item = RelationId> + '_ {
        (0..self.labels.len()).map(|i| RelationId(i as u16))
    }

    /// Number of labels in the vocabulary.
    pub fn relation_count(&self) -> usize {
        self.labels.len()
    }

    /// Number of composition rules.
    pub fn composition_count(&self) -> usize {
        self.composition_count
    }

    /// Channel this algebra was built from.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grand_table() -> RuleTable {
        RuleTable::default()
            .with_compose("child", "child", "grand")
            .with_compose("inv-child", "child", "sibling")
            .with_inverse("child", "inv-child")
            .with_symmetric("sibling", "sibling")
            .with_equivalence("kid", "child")
    }

    #[test]
    fn lookups_follow_rule_table() {
        let alg = RelationAlgebra::from_table("family", &grand_table()).unwrap();
        let child = alg.resolve("child").unwrap();
        let grand = alg.resolve("grand").unwrap();
        let inv = alg.resolve("inv-child").unwrap();
        let sibling = alg.resolve("sibling").unwrap();
        let kid = alg.resolve("kid").unwrap();

        assert_eq!(alg.compose(child, child), Some(grand));
        assert_eq!(alg.compose(child, grand), None);
        assert_eq!(alg.invert(child), Some(inv));
        assert_eq!(alg.invert(grand), None);
        assert_eq!(alg.symmetric(sibling), Some(sibling));
        assert_eq!(alg.canonicalize(kid), Some(child));
        assert_eq!(alg.canonical_or_self(grand), grand);
    }

    #[test]
    fn inverted_composition_index() {
        let alg = RelationAlgebra::from_table("family", &grand_table()).unwrap();
        let child = alg.resolve("child").unwrap();
        let grand = alg.resolve("grand").unwrap();
        assert_eq!(alg.decompositions(grand), &[(child, child)]);
        assert!(alg.decompositions(child).is_empty());
        assert_eq!(alg.composition_count(), 2);
    }

    #[test]
    fn unknown_label_in_rule_fails_fast() {
        let mut table = grand_table();
        table.inverse.insert("grand".into(), "inv-grand".into());
        let err = RelationAlgebra::from_table("family", &table).unwrap_err();
        match err {
            AlgebraError::UnknownRelation { relation, table } => {
                assert_eq!(relation, "inv-grand");
                assert_eq!(table, "inverse");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rules_disagreeing_under_equivalence_conflict() {
        let agreeing = grand_table().with_compose("kid", "child", "grand");
        RelationAlgebra::from_table("family", &agreeing).unwrap();

        let table = grand_table().with_compose("kid", "child", "great");
        let err = RelationAlgebra::from_table("family", &table).unwrap_err();
        match err {
            AlgebraError::ConflictingRule {
                first,
                second,
                existing,
                conflicting,
            } => {
                assert_eq!((first.as_str(), second.as_str()), ("child", "child"));
                assert_eq!(existing, "grand");
                assert_eq!(conflicting, "great");
            }
            other => panic!("expected a conflict, got {other}"),
        }
    }

    #[test]
    fn empty_vocabulary_rejected() {
        let err = RelationAlgebra::from_table("family", &RuleTable::default()).unwrap_err();
        assert!(matches!(err, AlgebraError::EmptyVocabulary { .. }));
    }

    #[test]
    fn surface_falls_back_to_label() {
        let table = grand_table().with_surface("child", "son", "daughter");
        let alg = RelationAlgebra::from_table("family", &table).unwrap();
        let child = alg.resolve("child").unwrap();
        let grand = alg.resolve("grand").unwrap();
        assert_eq!(alg.surface(child, Gender::Female), "daughter");
        assert_eq!(alg.surface(grand, Gender::Male), "grand");
    }

    #[test]
    fn bundled_family_algebra_is_consistent() {
        let alg = RelationAlgebra::family().unwrap();
        for r in alg.relations() {
            if let Some(inv) = alg.invert(r) {
                assert_eq!(alg.invert(inv), Some(r), "inverse of {} not involutive", alg.label(r));
            }
        }
        let so = alg.resolve("SO").unwrap();
        let spouse = alg.resolve("spouse").unwrap();
        assert_eq!(alg.canonical_or_self(spouse), so);
    }
}
