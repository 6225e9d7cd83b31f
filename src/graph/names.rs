//! Collision-free display names.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

use super::Gender;
use super::ancestry::GraphResult;

const MALE_NAMES: &[&str] = &[
    "Aaron", "Adam", "Alan", "Albert", "Andrew", "Arthur", "Austin", "Ben", "Bruce", "Carl",
    "Charles", "Daniel", "David", "Dennis", "Donald", "Douglas", "Edward", "Eric", "Frank",
    "Gabriel", "George", "Gregory", "Harold", "Henry", "Jack", "James", "Jason", "Joe", "John",
    "Jordan", "Joseph", "Kevin", "Larry", "Louis", "Mark", "Michael", "Nathan", "Paul", "Peter",
    "Ralph", "Raymond", "Richard", "Robert", "Roger", "Samuel", "Scott", "Steven", "Thomas",
    "Victor", "Walter", "Wayne", "William",
];

const FEMALE_NAMES: &[&str] = &[
    "Alice", "Amanda", "Amy", "Angela", "Anna", "Barbara", "Betty", "Beverly", "Carol",
    "Catherine", "Christine", "Cynthia", "Deborah", "Denise", "Diana", "Donna", "Dorothy", "Emily",
    "Emma", "Evelyn", "Frances", "Gloria", "Grace", "Helen", "Jane", "Janet", "Jean", "Joan",
    "Judith", "Julia", "Karen", "Kathleen", "Laura", "Linda", "Lisa", "Margaret", "Maria",
    "Martha", "Mary", "Megan", "Nancy", "Olivia", "Pamela", "Rachel", "Rose", "Ruth", "Sarah",
    "Sharon", "Sophia", "Susan", "Teresa", "Virginia",
];

/// Pools of first names per gender. Names handed out by [`NamePool::take`]
/// are never handed out again by the same pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamePool {
    #[serde(default = "default_male")]
    pub male: Vec<String>,
    #[serde(default = "default_female")]
    pub female: Vec<String>,
    #[serde(skip)]
    taken: HashSet<String>,
}

fn default_male() -> Vec<String> {
    MALE_NAMES.iter().map(|s| s.to_string()).collect()
}
fn default_female() -> Vec<String> {
    FEMALE_NAMES.iter().map(|s| s.to_string()).collect()
}

impl Default for NamePool {
    fn default() -> Self {
        Self {
            male: default_male(),
            female: default_female(),
            taken: HashSet::new(),
        }
    }
}

impl NamePool {
    /// Build a pool from explicit name lists.
    pub fn new(male: Vec<String>, female: Vec<String>) -> Self {
        Self {
            male,
            female,
            taken: HashSet::new(),
        }
    }

    /// Draw an unused name for `gender`.
    pub fn take(&mut self, gender: Gender, rng: &mut impl Rng) -> GraphResult<String> {
        let names = match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        };
        let free: Vec<&String> = names.iter().filter(|n| !self.taken.contains(*n)).collect();
        let name = free
            .choose(rng)
            .map(|n| (*n).clone())
            .ok_or_else(|| GraphError::NamesExhausted {
                gender: gender.to_string(),
            })?;
        self.taken.insert(name.clone());
        Ok(name)
    }

    /// Mark names as already in use (e.g. names reserved by an earlier graph).
    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taken.extend(names.into_iter().map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn names_are_never_reused() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut pool = NamePool::new(vec!["Al".into(), "Bo".into()], vec!["Cy".into()]);
        let a = pool.take(Gender::Male, &mut rng).unwrap();
        let b = pool.take(Gender::Male, &mut rng).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            pool.take(Gender::Male, &mut rng),
            Err(GraphError::NamesExhausted { .. })
        ));
        assert_eq!(pool.take(Gender::Female, &mut rng).unwrap(), "Cy");
    }

    #[test]
    fn reserve_removes_names_from_circulation() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut pool = NamePool::new(vec!["Al".into()], vec!["Cy".into(), "Di".into()]);
        pool.reserve(["Cy"]);
        assert_eq!(pool.take(Gender::Female, &mut rng).unwrap(), "Di");
        assert!(pool.take(Gender::Female, &mut rng).is_err());
        assert_eq!(pool.take(Gender::Male, &mut rng).unwrap(), "Al");
    }
}
