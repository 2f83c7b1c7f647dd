//! Hot path benchmarks for profiling-driven optimization.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! These benchmarks measure what every explored step pays for: extending the
//! execution with its clock vector, finding the races of the last event, inserting
//! sequences in a wakeup tree, and a whole exploration of a small scenario.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stateless_mc::app::Scenario;
use stateless_mc::odpor::{Execution, WakeupTree};
use stateless_mc::transition::{
    Aid, MemOp, MutexOp, MutexTransition, ObjectAccessKind, ObjectAccessTransition, Transition,
    TransitionKind,
};
use stateless_mc::{CheckerConfig, ExplorationContext, InProcessApp, ReductionMode};
use std::sync::Arc;

/// `len` steps spread over `actors` actors, one object access in three
fn workload(actors: u32, len: usize) -> Vec<Arc<Transition>> {
    (0..len)
        .map(|i| {
            let aid = Aid(i as u32 % actors + 1);
            let kind = if i % 3 == 0 {
                TransitionKind::ObjectAccess(ObjectAccessTransition {
                    object: 1,
                    access: ObjectAccessKind::Both,
                    name: "shared".to_string(),
                })
            } else {
                TransitionKind::Mutex(MutexTransition {
                    op: MutexOp::AsyncLock,
                    mutex: (i % 4) as u32,
                    owner: None,
                })
            };
            Arc::new(Transition::new(aid, 0, kind).with_mem_ops(vec![MemOp::read(i as u64)]))
        })
        .collect()
}

/// Benchmark Execution::push_transition - one call per explored step
fn bench_push_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_transition");

    for len in [16, 64, 256] {
        let steps = workload(4, len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &steps, |b, steps| {
            b.iter(|| {
                let mut exec = Execution::new();
                for t in steps {
                    let _ = exec.push_transition(black_box(Arc::clone(t)));
                }
                exec
            })
        });
    }

    group.finish();
}

/// Benchmark Execution::get_racing_events_of on the last event
fn bench_racing_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("racing_events");
    group.throughput(Throughput::Elements(1));

    for actors in [2, 4, 8] {
        let mut exec = Execution::new();
        for t in workload(actors, 128) {
            let _ = exec.push_transition(t);
        }
        let last = exec.size() - 1;
        group.bench_function(format!("actors_{}", actors), |b| {
            b.iter(|| black_box(exec.get_racing_events_of(black_box(last))))
        });
    }

    group.finish();
}

/// Benchmark WakeupTree::insert of sequences sharing prefixes
fn bench_wakeup_tree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("wakeup_tree_insert");

    let steps = workload(4, 32);
    let sequences: Vec<Vec<Arc<Transition>>> = (1..steps.len())
        .map(|end| steps[end / 2..end].to_vec())
        .collect();
    group.throughput(Throughput::Elements(sequences.len() as u64));
    group.bench_function("shared_prefixes", |b| {
        b.iter(|| {
            let mut tree = WakeupTree::new();
            for seq in &sequences {
                tree.insert(black_box(seq));
            }
            tree
        })
    });

    group.finish();
}

/// Benchmark a whole in-process exploration
fn bench_exploration(c: &mut Criterion) {
    let mut group = c.benchmark_group("exploration");
    group.sample_size(20);

    let scenario = Arc::new(
        Scenario::from_toml_str(include_str!("../scenarios/mutex_trio.toml"))
            .expect("bundled scenario parses"),
    );
    for reduction in [ReductionMode::Dpor, ReductionMode::Odpor, ReductionMode::BfsOdpor] {
        group.bench_function(reduction.as_str(), |b| {
            b.iter(|| {
                let mut config = CheckerConfig::test().with_reduction(reduction);
                config.debug_optimality = false;
                let app = InProcessApp::scripted(Arc::clone(&scenario)).expect("scenario starts");
                let mut ctx =
                    ExplorationContext::new(config, Box::new(app)).expect("valid configuration");
                black_box(ctx.run().expect("exploration succeeds"))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_push_transition,
    bench_racing_events,
    bench_wakeup_tree_insert,
    bench_exploration,
);

criterion_main!(benches);
