//! Benchmarks for closure and expansion precomputation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;

use kinpuzzle::algebra::RelationAlgebra;
use kinpuzzle::closure::ClosureEngine;
use kinpuzzle::expansion::ExpansionIndex;
use kinpuzzle::graph::{FamilyConfig, KinshipGraph, NamePool, simulate};

fn family(levels: usize) -> KinshipGraph {
    let config = FamilyConfig {
        max_levels: levels,
        max_child: 2,
        ..Default::default()
    };
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    simulate(&config, &mut NamePool::default(), &mut rng).unwrap()
}

fn bench_closure(c: &mut Criterion) {
    let algebra = RelationAlgebra::family().unwrap();
    let engine = ClosureEngine::new(&algebra);

    for levels in [3, 4] {
        let graph = family(levels);
        c.bench_function(&format!("closure_{levels}_levels"), |bench| {
            bench.iter(|| black_box(engine.close(&graph).unwrap()))
        });
    }
}

fn bench_expansion(c: &mut Criterion) {
    let algebra = RelationAlgebra::family().unwrap();
    let closure = ClosureEngine::new(&algebra).close(&family(4)).unwrap();

    c.bench_function("expansion_4_levels", |bench| {
        bench.iter(|| black_box(ExpansionIndex::build(&closure, &algebra)))
    });
}

criterion_group!(benches, bench_closure, bench_expansion);
criterion_main!(benches);
