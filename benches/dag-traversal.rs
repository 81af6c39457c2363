use arbor_ir::{mapper, visitor, Builder, Node, NodeKind, NodeStore};
use criterion::{
    criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion,
};

/// `depth` levels of `e = e + e` over a variable: 2^depth paths, `depth`
/// distinct additions.
fn shared_dag(b: &Builder, depth: usize) -> Node {
    let mut e = b.variable(b.int_type());
    for _ in 0..depth {
        e = b.add(e.clone(), e);
    }
    e
}

fn traversal_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("depth-first-once");
    for depth in [16, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(depth),
            &depth,
            |bench, &depth| {
                let store = NodeStore::new();
                let b = Builder::new(&store);
                let root = shared_dag(&b, depth);
                bench.iter(|| {
                    let mut count = 0;
                    visitor::visit_depth_first_once(&root, |_: &Node| {
                        count += 1
                    });
                    count
                })
            },
        );
    }
    group.finish();
}

fn mapper_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("map-variables");
    for depth in [16, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(depth),
            &depth,
            |bench, &depth| {
                bench.iter_batched(
                    || {
                        let store = NodeStore::new();
                        let root = shared_dag(&Builder::new(&store), depth);
                        (store, root)
                    },
                    |(store, root)| {
                        let b = Builder::new(&store);
                        let one = b.int_lit(1);
                        mapper::transform_bottom_up(&store, &root, |n| {
                            if n.kind() == NodeKind::Variable {
                                one.clone()
                            } else {
                                n.clone()
                            }
                        })
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group! {
    name = dag_traversal;
    config = Criterion::default().sample_size(20);
    targets = traversal_bench, mapper_bench
}
criterion_main!(dag_traversal);
