//! End-to-end integration tests for the kinpuzzle engine.
//!
//! These tests exercise the full pipeline from rule loading and family
//! simulation through closure, expansion, backward chaining and noise
//! injection, validating the invariants every accepted puzzle must hold.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use rand::SeedableRng;

use kinpuzzle::algebra::{RelationAlgebra, RuleStore, RuleTable};
use kinpuzzle::closure::{Closure, ClosureEngine};
use kinpuzzle::error::KinError;
use kinpuzzle::expansion::ExpansionIndex;
use kinpuzzle::generator::{Generator, GeneratorConfig};
use kinpuzzle::graph::{Edge, FamilyConfig, Gender, KinshipGraph, NamePool, NodeId, simulate};
use kinpuzzle::puzzle::{Fact, NoiseConfig, NoiseKind, PuzzleBuilder, PuzzleIdAllocator};

struct Session {
    algebra: RelationAlgebra,
    graph: KinshipGraph,
    closure: Closure,
    index: ExpansionIndex,
    ids: PuzzleIdAllocator,
}

impl Session {
    fn family(seed: u64) -> Self {
        let algebra = RelationAlgebra::family().unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let graph = simulate(&FamilyConfig::default(), &mut NamePool::default(), &mut rng).unwrap();
        Self::new(algebra, graph)
    }

    fn new(algebra: RelationAlgebra, graph: KinshipGraph) -> Self {
        let closure = ClosureEngine::new(&algebra).close(&graph).unwrap();
        let index = ExpansionIndex::build(&closure, &algebra);
        Self {
            algebra,
            graph,
            closure,
            index,
            ids: PuzzleIdAllocator::new(),
        }
    }

    fn builder(&self) -> PuzzleBuilder<'_> {
        PuzzleBuilder::new(&self.algebra, &self.graph, &self.closure, &self.index, &self.ids)
    }
}

fn e(a: u32, b: u32) -> Edge {
    Edge::new(NodeId(a), NodeId(b))
}

#[test]
fn inverse_pair_closes_to_exactly_two_edges() {
    let table = RuleTable::default().with_inverse("child", "inv-child");
    let algebra = RelationAlgebra::from_table("family", &table).unwrap();
    let mut graph = KinshipGraph::new();
    let a = graph.add_person(Gender::Male, "A");
    let b = graph.add_person(Gender::Female, "B");
    graph.add_edge(a, b, "child").unwrap();

    let closure = ClosureEngine::new(&algebra).close(&graph).unwrap();
    let edges: Vec<(Edge, &str)> = closure
        .edges()
        .map(|(edge, r)| (edge, algebra.label(r)))
        .collect();
    assert_eq!(edges, vec![(e(0, 1), "child"), (e(1, 0), "inv-child")]);
}

#[test]
fn grandchild_is_derived_and_decomposed() {
    let table = RuleTable::default().with_compose("child", "child", "grandchild");
    let algebra = RelationAlgebra::from_table("family", &table).unwrap();
    let mut graph = KinshipGraph::new();
    for name in ["A", "B", "C"] {
        graph.add_person(Gender::Male, name);
    }
    graph.add_edge(NodeId(0), NodeId(1), "child").unwrap();
    graph.add_edge(NodeId(1), NodeId(2), "child").unwrap();

    let session = Session::new(algebra, graph);
    assert_eq!(
        session.closure.relation(e(0, 2)),
        session.algebra.resolve("grandchild")
    );
    assert_eq!(session.index.next(e(0, 2)), Some([e(0, 1), e(1, 2)]));

    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let puzzle = session
        .builder()
        .build_one(e(0, 2), 2, &mut rng)
        .unwrap()
        .unwrap();
    assert_eq!(puzzle.target.relation, "grandchild");
    assert_eq!(puzzle.relation_comb(), "child-child");
    assert_eq!(puzzle.query.to_string(), "(A, grandchild, C)");
}

#[test]
fn closure_is_deterministic_fixpoint() {
    let first = Session::family(3);
    let second = Session::family(3);
    assert!(first.closure.edges().eq(second.closure.edges()));

    let mut dense = KinshipGraph::new();
    for person in first.graph.people() {
        dense.add_person(person.gender, person.name.clone());
    }
    for (edge, r) in first.closure.edges() {
        dense
            .add_edge(edge.from, edge.to, first.algebra.label(r))
            .unwrap();
    }
    let reclosed = ClosureEngine::new(&first.algebra).close(&dense).unwrap();
    assert!(reclosed.edges().eq(first.closure.edges()));
    assert_eq!(reclosed.ground_truth_len(), reclosed.len());
}

#[test]
fn accepted_puzzles_are_paths_of_requested_length() {
    let session = Session::family(11);
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);

    for length in 1..=4 {
        let mut consumed = BTreeSet::new();
        let batch = session
            .builder()
            .build_batch(length, &mut consumed, &mut rng)
            .unwrap_or_else(|err| panic!("length {length}: {err}"));
        assert!(!batch.is_empty());
        for puzzle in batch.iter() {
            assert_eq!(puzzle.story.len(), length);
            assert_eq!(puzzle.proof.len(), length - 1);
            assert_eq!(puzzle.story.first().unwrap().from, puzzle.target.from);
            assert_eq!(puzzle.story.last().unwrap().to, puzzle.target.to);
            for pair in puzzle.story.windows(2) {
                assert_eq!(pair[0].to, pair[1].from);
            }
            assert_eq!(puzzle.story_nodes().len(), length + 1);
            assert!(puzzle.story.iter().all(|f| f.from != f.to));
            assert_eq!(
                puzzle.ordered_story().len(),
                length,
                "story of {} is not one path",
                puzzle.id
            );

            // No edge and its reverse are both derivation nodes.
            let derived: HashSet<Edge> = puzzle.proof.iter().map(|s| s.edge).collect();
            for edge in &derived {
                assert!(!derived.contains(&edge.reversed()));
            }
        }
    }
}

#[test]
fn length_one_puzzles_have_empty_proofs() {
    let session = Session::family(5);
    let mut rng = rand::rngs::StdRng::seed_from_u64(5);
    let mut consumed = BTreeSet::new();
    let batch = session
        .builder()
        .build_batch(1, &mut consumed, &mut rng)
        .unwrap();
    assert_eq!(batch.len(), session.closure.len());
    assert!(batch.iter().all(|p| p.proof.is_empty() && p.story.len() == 1));
}

#[test]
fn round_robin_serves_distinct_decompositions() {
    let session = Session::family(2);
    let (edge, options) = session
        .closure
        .edges()
        .map(|(edge, _)| (edge, session.index.options(edge).len()))
        .find(|(_, n)| *n >= 3)
        .expect("family graph has an edge with three decompositions");
    let served: Vec<_> = (0..options).map(|_| session.index.next(edge).unwrap()).collect();
    let distinct: HashSet<_> = served.iter().take(3).collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(session.index.next(edge), Some(served[0]));
}

#[test]
fn noisy_generation_keeps_overlap_invariants() {
    let config = GeneratorConfig {
        seed: 9,
        puzzles: 8,
        story_length: 2,
        noise: NoiseConfig {
            supporting: false,
            irrelevant: true,
            disconnected: true,
        },
        ..Default::default()
    };
    let mut generator = Generator::new(config, &RuleStore::bundled().unwrap()).unwrap();
    let batch = generator.generate().unwrap();
    assert!(!batch.is_empty());

    for puzzle in batch.iter() {
        let story = puzzle.story_nodes();
        assert_eq!(puzzle.noise.len(), 2);
        for group in &puzzle.noise {
            let shared: BTreeSet<NodeId> = group
                .facts
                .iter()
                .flat_map(|f| [f.from, f.to])
                .filter(|n| story.contains(n))
                .collect();
            match group.kind {
                NoiseKind::Supporting => assert!(shared.len() >= 2),
                NoiseKind::Irrelevant => assert_eq!(shared.len(), 1),
                NoiseKind::Disconnected => assert!(shared.is_empty()),
            }
        }
        let mapping = puzzle.node_mapping();
        assert_eq!(mapping.len(), {
            let mut all = story.clone();
            all.extend(puzzle.noise_facts().flat_map(|f| [f.from, f.to]));
            all.len()
        });
    }
}

#[test]
fn rule_file_drives_the_closure() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[family]
relations = ["SO", "child", "stepchild"]

[family.compose.SO]
child = "stepchild"

[family.symmetric]
SO = "SO"
"#
    )
    .unwrap();
    let store = RuleStore::load(file.path()).unwrap();
    let algebra = RelationAlgebra::from_store(&store, "family").unwrap();

    let mut graph = KinshipGraph::new();
    let a = graph.add_person(Gender::Male, "A");
    let b = graph.add_person(Gender::Female, "B");
    let c = graph.add_person(Gender::Male, "C");
    graph.add_edge(a, b, "SO").unwrap();
    graph.add_edge(a, c, "child").unwrap();

    let closure = ClosureEngine::new(&algebra).close(&graph).unwrap();
    // B's stepchild is C: (B, SO, A) then (A, child, C).
    assert_eq!(
        closure.relation(Edge::new(b, c)),
        algebra.resolve("stepchild")
    );
    assert_eq!(closure.len(), 4);
}

#[test]
fn unknown_relation_in_graph_is_a_configuration_error() {
    let config = GeneratorConfig {
        family: FamilyConfig {
            child_relation: "offspring".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    let err = Generator::new(config, &RuleStore::bundled().unwrap())
        .err()
        .expect("unknown label must fail");
    assert!(matches!(err, KinError::Closure(_)));
}

#[test]
fn batch_signatures_summarize_relation_combinations() {
    let config = GeneratorConfig {
        puzzles: 20,
        story_length: 2,
        ..Default::default()
    };
    let mut generator = Generator::new(config, &RuleStore::bundled().unwrap()).unwrap();
    let batch = generator.generate().unwrap();
    let counts = batch.signature_counts();
    assert_eq!(counts.values().sum::<usize>(), batch.len());
    assert_eq!(batch.unique_signatures().len(), counts.len());
    let algebra = generator.algebra();
    let graph = generator.graph();
    let word = |fact: &Fact| {
        let relation = algebra.resolve(&fact.relation).unwrap();
        let gender = graph.person(fact.to).unwrap().gender;
        algebra.surface(relation, gender).to_string()
    };
    for puzzle in batch.iter() {
        let expected = format!("{}-{}", word(&puzzle.story[0]), word(&puzzle.story[1]));
        assert_eq!(puzzle.relation_comb(), expected);
        assert!(counts.contains_key(&expected));
    }
    // The bundled lexicon genders every signature.
    assert!(counts.keys().all(|s| !s.contains("child")));
}
