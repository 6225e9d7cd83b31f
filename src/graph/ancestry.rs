//! Ground-truth family graph.
//!
//! Edges are keyed by ordered node pair and written insert-if-absent: the
//! first relation recorded for a pair is kept and later writes are ignored.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::GraphError;

use super::{Edge, Gender, NamePool, NodeId, Person};

/// Result type for kinship graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// People plus directed, labeled relations between them.
#[derive(Debug, Clone, Default)]
pub struct KinshipGraph {
    people: Vec<Person>,
    edges: BTreeMap<Edge, String>,
    /// Current gender-flip epoch.
    epoch: u64,
}

impl KinshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a person and return their freshly allocated id.
    pub fn add_person(&mut self, gender: Gender, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.people.len() as u32);
        self.people.push(Person {
            id,
            gender,
            name: name.into(),
            flipped_epoch: None,
        });
        id
    }

    /// Record `(a, b) → relation` unless the pair already has a relation.
    ///
    /// Returns `Ok(true)` if the edge was inserted, `Ok(false)` if the pair
    /// was already present.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, relation: &str) -> GraphResult<bool> {
        self.person_checked(a)?;
        self.person_checked(b)?;
        if a == b {
            return Err(GraphError::SelfLoop { node: a.0 });
        }
        let edge = Edge::new(a, b);
        if self.edges.contains_key(&edge) {
            return Ok(false);
        }
        self.edges.insert(edge, relation.to_string());
        Ok(true)
    }

    /// Relation label of an edge, if present.
    pub fn relation(&self, edge: Edge) -> Option<&str> {
        self.edges.get(&edge).map(String::as_str)
    }

    pub fn person(&self, id: NodeId) -> Option<&Person> {
        self.people.get(id.index())
    }

    fn person_checked(&self, id: NodeId) -> GraphResult<&Person> {
        self.person(id)
            .ok_or(GraphError::NodeNotFound { node: id.0 })
    }

    /// All people in id order.
    pub fn people(&self) -> &[Person] {
        &self.people
    }

    /// All edges in `(from, to)` order.
    pub fn edges(&self) -> impl Iterator<Item = (Edge, &str)> + '_ {
        self.edges.iter().map(|(e, r)| (*e, r.as_str()))
    }

    pub fn node_count(&self) -> usize {
        self.people.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Current gender-flip epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Flip a person's gender in place. Identity and edges are untouched;
    /// refreshing the display name is the caller's job.
    pub fn toggle_gender(&mut self, id: NodeId) -> GraphResult<Gender> {
        let epoch = self.epoch;
        let person = self
            .people
            .get_mut(id.index())
            .ok_or(GraphError::NodeNotFound { node: id.0 })?;
        person.gender = person.gender.toggled();
        person.flipped_epoch = Some(epoch);
        Ok(person.gender)
    }

    /// Replace a person's display name.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> GraphResult<()> {
        let person = self
            .people
            .get_mut(id.index())
            .ok_or(GraphError::NodeNotFound { node: id.0 })?;
        person.name = name.into();
        Ok(())
    }

    /// Spouse of `id` through a `spouse_relation` edge in either direction.
    pub fn spouse_of(&self, id: NodeId, spouse_relation: &str) -> Option<NodeId> {
        self.edges
            .iter()
            .filter(|(_, r)| r.as_str() == spouse_relation)
            .find_map(|(e, _)| {
                if e.from == id {
                    Some(e.to)
                } else if e.to == id {
                    Some(e.from)
                } else {
                    None
                }
            })
    }

    /// Flip one person not yet flipped in the current epoch.
    ///
    /// Married couples flip together and swap names so each keeps a name
    /// matching their new gender; a single person draws a fresh name from
    /// `names`. When everyone has been flipped the epoch advances and
    /// `Ok(false)` is returned.
    pub fn next_flip(
        &mut self,
        rng: &mut impl Rng,
        names: &mut NamePool,
        spouse_relation: &str,
    ) -> GraphResult<bool> {
        let epoch = self.epoch;
        let candidates: Vec<NodeId> = self
            .people
            .iter()
            .filter(|p| p.flipped_epoch != Some(epoch))
            .map(|p| p.id)
            .collect();

        let Some(&node) = candidates.choose(rng) else {
            self.epoch += 1;
            tracing::debug!(epoch = self.epoch, "all people flipped, advancing epoch");
            return Ok(false);
        };

        match self.spouse_of(node, spouse_relation) {
            Some(spouse) => {
                self.toggle_gender(node)?;
                self.toggle_gender(spouse)?;
                let (a, b) = (node.index(), spouse.index());
                let tmp = std::mem::take(&mut self.people[a].name);
                self.people[a].name = std::mem::replace(&mut self.people[b].name, tmp);
            }
            None => {
                let gender = self.toggle_gender(node)?;
                let name = names.take(gender, rng)?;
                self.rename(node, name)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn couple() -> (KinshipGraph, NodeId, NodeId, NodeId) {
        let mut g = KinshipGraph::new();
        let a = g.add_person(Gender::Male, "Adam");
        let b = g.add_person(Gender::Female, "Beth");
        let c = g.add_person(Gender::Male, "Carl");
        g.add_edge(a, b, "SO").unwrap();
        g.add_edge(a, c, "child").unwrap();
        g.add_edge(b, c, "child").unwrap();
        (g, a, b, c)
    }

    #[test]
    fn add_person_allocates_sequential_ids() {
        let (g, a, b, c) = couple();
        assert_eq!((a, b, c), (NodeId(0), NodeId(1), NodeId(2)));
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.person(b).unwrap().name, "Beth");
    }

    #[test]
    fn first_writer_wins() {
        let (mut g, a, b, _) = couple();
        assert!(!g.add_edge(a, b, "sibling").unwrap());
        assert_eq!(g.relation(Edge::new(a, b)), Some("SO"));
        assert_eq!(g.relation(Edge::new(b, a)), None);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn self_loop_and_unknown_node_rejected() {
        let (mut g, a, _, _) = couple();
        assert!(matches!(
            g.add_edge(a, a, "SO"),
            Err(GraphError::SelfLoop { node: 0 })
        ));
        assert!(matches!(
            g.add_edge(a, NodeId(9), "SO"),
            Err(GraphError::NodeNotFound { node: 9 })
        ));
    }

    #[test]
    fn toggle_gender_keeps_identity_and_edges() {
        let (mut g, _, _, c) = couple();
        assert_eq!(g.toggle_gender(c).unwrap(), Gender::Female);
        let p = g.person(c).unwrap();
        assert_eq!(p.id, c);
        assert_eq!(p.name, "Carl");
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn spouse_found_in_either_direction() {
        let (g, a, b, c) = couple();
        assert_eq!(g.spouse_of(a, "SO"), Some(b));
        assert_eq!(g.spouse_of(b, "SO"), Some(a));
        assert_eq!(g.spouse_of(c, "SO"), None);
    }

    #[test]
    fn flips_exhaust_epoch_then_advance() {
        let (mut g, a, b, _) = couple();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut names = NamePool::default();
        names.reserve(["Adam", "Beth", "Carl"]);

        let mut flips = 0;
        while g.next_flip(&mut rng, &mut names, "SO").unwrap() {
            flips += 1;
            assert!(flips <= 3);
        }
        assert_eq!(g.epoch(), 1);
        assert!(g.people().iter().all(|p| p.flipped_epoch == Some(0)));
        // Couples swap names, so each spouse keeps a name from the pair.
        let names_now: Vec<&str> = [a, b].iter().map(|n| g.person(*n).unwrap().name.as_str()).collect();
        assert!(names_now.contains(&"Adam") && names_now.contains(&"Beth"));
    }

    #[test]
    fn single_flip_draws_new_name() {
        let mut g = KinshipGraph::new();
        let solo = g.add_person(Gender::Male, "Adam");
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut names = NamePool::new(vec![], vec!["Zoe".into()]);
        assert!(g.next_flip(&mut rng, &mut names, "SO").unwrap());
        let p = g.person(solo).unwrap();
        assert_eq!(p.gender, Gender::Female);
        assert_eq!(p.name, "Zoe");
    }
}
