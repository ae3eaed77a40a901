use rowflow::prelude::*;
use std::sync::Arc;
use tokio::runtime::Builder;

/// Merge join hotpath profiling
///
/// Profiles a full pipeline (two sorted sources, a FULL OUTER merge join and a
/// terminal sink) to show where time goes between channel hand-offs, key
/// comparison and lazy value conversion.
///
/// Run with: cargo run --release --bin hotpath_merge_join --features profiling
#[hotpath::main]
fn main() {
    println!("=== Merge Join Hotpath Profile ===");
    println!("Workload: 2 x 500K sorted rows, every 10th key missing on one side");
    println!("Configuration: 4 worker threads, channel capacity 50");
    println!();

    let runtime = match Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Cannot build runtime: {}", e);
            std::process::exit(1);
        }
    };

    println!("Starting profiled execution...");
    println!();

    let result = runtime.block_on(run_join_workload(500_000));
    match result {
        Ok(result) => {
            let totals = result.stage_totals("sink");
            println!("Status: {:?}", result.status);
            println!("Joined rows: {}", totals.lines_read);
        }
        Err(e) => eprintln!("Pipeline error: {}", e),
    }

    println!();
    println!("Profiling complete. Results above show function-level breakdown.");
}

#[hotpath::measure]
fn sorted_side(name: &str, rows: usize, skip_every: usize) -> StageSpec {
    let fields: toml::Value = vec![
        toml::Value::Table(
            [
                ("name".to_string(), toml::Value::from("id")),
                ("type".to_string(), toml::Value::from("integer")),
            ]
            .into_iter()
            .collect(),
        ),
        toml::Value::Table(
            [
                ("name".to_string(), toml::Value::from("payload")),
                ("type".to_string(), toml::Value::from("string")),
            ]
            .into_iter()
            .collect(),
        ),
    ]
    .into();
    let data: Vec<Vec<String>> = (0..rows)
        .filter(|i| i % skip_every != 0)
        .map(|i| vec![i.to_string(), format!("{}{}", name, i)])
        .collect();

    StageSpec::new(name, "data-grid")
        .with_setting("fields", fields)
        .with_setting("rows", data)
}

#[hotpath::measure]
async fn run_join_workload(rows: usize) -> Result<PipelineResult, PipelineError> {
    let spec = PipelineSpec::new("profile")
        .with_stage(sorted_side("a", rows, 10))
        .with_stage(sorted_side("b", rows, 7))
        .with_stage(
            StageSpec::new("join", "merge-join")
                .with_setting("step_a", "a")
                .with_setting("step_b", "b")
                .with_setting("keys_a", vec!["id"])
                .with_setting("keys_b", vec!["id"])
                .with_setting("join_type", "FULL OUTER"),
        )
        .with_stage(StageSpec::new("sink", "dummy"))
        .with_hop(HopSpec::new("a", "join"))
        .with_hop(HopSpec::new("b", "join"))
        .with_hop(HopSpec::new("join", "sink"));

    let shared: Arc<dyn SharedObjects> = Arc::new(MemorySharedObjects::new());
    Pipeline::run(&spec, &StageRegistry::new(), shared).await
}
