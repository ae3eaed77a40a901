use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rowflow::prelude::*;
use tokio::runtime::Runtime;

/// Data-grid stage with `rows` sorted keys, each key repeated `run` times
fn sorted_grid(name: &str, rows: usize, run: usize) -> StageSpec {
    let mut config: toml::Table = toml::from_str(
        r#"
        fields = [
            { name = "id", type = "integer" },
            { name = "payload", type = "string" },
        ]
        "#,
    )
    .unwrap();
    let data: Vec<Vec<String>> = (0..rows)
        .map(|i| vec![(i / run.max(1)).to_string(), format!("{}-{}", name, i)])
        .collect();
    config.insert("rows".to_string(), data.into());
    StageSpec::new(name, "data-grid").with_config(config)
}

fn join_pipeline(join_type: &str, rows: usize, run: usize) -> PipelineSpec {
    PipelineSpec::new("bench")
        .with_stage(sorted_grid("a", rows, run))
        .with_stage(sorted_grid("b", rows, run))
        .with_stage(
            StageSpec::new("join", "merge-join")
                .with_setting("step_a", "a")
                .with_setting("step_b", "b")
                .with_setting("keys_a", vec!["id"])
                .with_setting("keys_b", vec!["id"])
                .with_setting("join_type", join_type),
        )
        .with_stage(StageSpec::new("sink", "dummy"))
        .with_hop(HopSpec::new("a", "join"))
        .with_hop(HopSpec::new("b", "join"))
        .with_hop(HopSpec::new("join", "sink"))
}

/// Whole pipeline cost of a join over unique keys, per join type
fn bench_join_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_join_types");
    let runtime = Runtime::new().unwrap();
    let registry = StageRegistry::new();
    let shared: Arc<dyn SharedObjects> = Arc::new(MemorySharedObjects::new());

    for join_type in ["INNER", "LEFT OUTER", "FULL OUTER"] {
        let spec = join_pipeline(join_type, 10_000, 1);
        group.bench_with_input(BenchmarkId::from_parameter(join_type), &spec, |b, spec| {
            b.to_async(&runtime).iter(|| async {
                let result = Pipeline::run(spec, &registry, shared.clone()).await.unwrap();
                black_box(result.totals());
            });
        });
    }

    group.finish();
}

/// Cost of the duplicate-run cross product as runs grow
fn bench_duplicate_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_join_duplicate_runs");
    let runtime = Runtime::new().unwrap();
    let registry = StageRegistry::new();
    let shared: Arc<dyn SharedObjects> = Arc::new(MemorySharedObjects::new());

    for run in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(run), &run, |b, &run| {
            b.to_async(&runtime).iter_batched(
                || join_pipeline("INNER", 4_096, run),
                |spec| {
                    let registry = &registry;
                    let shared = shared.clone();
                    async move {
                        let result = Pipeline::run(&spec, registry, shared).await.unwrap();
                        black_box(result.stage_totals("sink").lines_written);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Channel capacity effect on a linear copy pipeline
fn bench_channel_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_capacity");
    let runtime = Runtime::new().unwrap();
    let registry = StageRegistry::new();
    let shared: Arc<dyn SharedObjects> = Arc::new(MemorySharedObjects::new());

    for capacity in [1usize, 50, 1_000] {
        let spec = PipelineSpec::new("copy")
            .with_capacity(capacity)
            .with_stage(sorted_grid("a", 20_000, 1))
            .with_stage(StageSpec::new("pass", "dummy"))
            .with_stage(StageSpec::new("sink", "dummy"))
            .with_hop(HopSpec::new("a", "pass"))
            .with_hop(HopSpec::new("pass", "sink"));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &spec, |b, spec| {
            b.to_async(&runtime).iter(|| async {
                black_box(Pipeline::run(spec, &registry, shared.clone()).await.unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_join_types,
    bench_duplicate_runs,
    bench_channel_capacity
);
criterion_main!(benches);
