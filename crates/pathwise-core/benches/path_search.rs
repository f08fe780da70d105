use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pathwise_core::graph::ConceptGraph;
use pathwise_core::model::{Concept, ConceptId};
use pathwise_core::path::{all_paths, shortest_path, CostModel};

/// `layers` layers of `width` concepts; every concept depends on every
/// concept of the previous layer.
fn layered(layers: usize, width: usize) -> ConceptGraph {
    let id = |layer: usize, i: usize| format!("l{layer:02}_{i:02}");
    let mut concepts = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for i in 0..width {
            let prereqs: Vec<String> = if layer == 0 {
                Vec::new()
            } else {
                (0..width).map(|j| id(layer - 1, j)).collect()
            };
            concepts.push(
                Concept::new(id(layer, i), id(layer, i))
                    .with_complexity(((layer + i) % 5 + 1) as u8)
                    .with_prerequisites(prereqs),
            );
        }
    }
    ConceptGraph::build(concepts).unwrap()
}

fn bench_shortest_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("shortest_path");

    for (layers, width) in [(10, 5), (20, 10)] {
        let graph = layered(layers, width);
        let goal = ConceptId::from(format!("l{:02}_00", layers - 1));
        let frontier = vec![ConceptId::from("l00_00")];
        let mastery: HashMap<ConceptId, f64> = graph
            .concepts()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), (i % 10) as f64 / 10.0))
            .collect();

        group.bench_function(format!("complexity_{layers}x{width}"), |b| {
            b.iter(|| {
                shortest_path(
                    black_box(&graph),
                    black_box(&frontier),
                    black_box(&goal),
                    &CostModel::complexity(),
                )
            })
        });

        let model = CostModel::mastery_weighted(&mastery, 0.01);
        group.bench_function(format!("mastery_weighted_{layers}x{width}"), |b| {
            b.iter(|| shortest_path(black_box(&graph), black_box(&frontier), black_box(&goal), &model))
        });

        group.bench_function(format!("from_roots_{layers}x{width}"), |b| {
            b.iter(|| shortest_path(black_box(&graph), &[], black_box(&goal), &CostModel::uniform()))
        });
    }

    group.finish();
}

fn bench_all_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_paths");

    let graph = layered(8, 4);
    let start = ConceptId::from("l00_00");
    let goal = ConceptId::from("l07_00");
    for limit in [16, 64, 256] {
        group.bench_function(format!("limit_{limit}"), |b| {
            b.iter(|| all_paths(black_box(&graph), &start, &goal, black_box(limit)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_shortest_path, bench_all_paths);
criterion_main!(benches);
