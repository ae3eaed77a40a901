//! Example: Join Topology
//!
//! This example joins two sorted CSV files on a key with the merge-join stage
//! and writes the joined rows to a third file. Unparseable lines of the right
//! file go to an error file instead of failing the run.
//!
//! Topology:
//!
//!   left.csv  --> read-left  --\
//!                               merge-join --> write (joined.csv)
//!   right.csv --> read-right --/
//!                     \--(errors)--> write-errors (rejected.csv)
//!
//! Both inputs must be sorted ascending on the key column.
//!
//! Usage:
//!   cargo run --example join_topology -- <left.csv> <right.csv> <out-dir> [join type]
//!
//! Or create test files:
//!   printf "id,name\n1,ann\n2,bob\n4,dan\n" > /tmp/left.csv
//!   printf "id,amount\n1,10.5\n1,3.25\n3,7\nx,oops\n4,1\n" > /tmp/right.csv
//!   cargo run --example join_topology -- /tmp/left.csv /tmp/right.csv /tmp "full outer"

use std::env;
use std::sync::Arc;

use rowflow::prelude::*;
use tracing_subscriber::EnvFilter;

fn input(name: &str, path: &str, fields: &str) -> Result<StageSpec, Box<dyn std::error::Error>> {
    let mut config: toml::Table = toml::from_str(&format!("fields = {}", fields))?;
    config.insert("file".to_string(), path.into());
    Ok(StageSpec::new(name, "csv-input").with_config(config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <left.csv> <right.csv> <out-dir> [join type]", args[0]);
        eprintln!();
        eprintln!("Example with test data:");
        eprintln!("  printf \"id,name\\n1,ann\\n2,bob\\n4,dan\\n\" > /tmp/left.csv");
        eprintln!("  printf \"id,amount\\n1,10.5\\n1,3.25\\n3,7\\nx,oops\\n4,1\\n\" > /tmp/right.csv");
        eprintln!("  {} /tmp/left.csv /tmp/right.csv /tmp \"full outer\"", args[0]);
        std::process::exit(1);
    }
    let join_type = args.get(4).map(String::as_str).unwrap_or("inner");

    eprintln!("=== Join Topology Example ===");
    eprintln!("Joining {} and {} ({})", args[1], args[2], join_type);
    eprintln!();

    // Output files are named relative to a file-location shared object
    let out_dir = SharedObject::new("file-location", "out").with_property("directory", &args[3]);

    let spec = PipelineSpec::new("join-topology")
        .with_shared(out_dir)
        .with_stage(input(
            "read-left",
            &args[1],
            r#"[{ name = "id", type = "integer" }, { name = "name", type = "string" }]"#,
        )?)
        .with_stage(
            input(
                "read-right",
                &args[2],
                r#"[{ name = "id", type = "integer" }, { name = "amount", type = "bignumber" }]"#,
            )?
            .with_setting("lazy_conversion", false)
            .with_error_handling(ErrorHandling::default()),
        )
        .with_stage(
            StageSpec::new("join", "merge-join")
                .with_setting("step_a", "read-left")
                .with_setting("step_b", "read-right")
                .with_setting("keys_a", vec!["id"])
                .with_setting("keys_b", vec!["id"])
                .with_setting("join_type", join_type),
        )
        .with_stage(
            StageSpec::new("write", "csv-output")
                .with_setting("file", "joined.csv")
                .with_setting("location", "out"),
        )
        .with_stage(
            StageSpec::new("write-errors", "csv-output")
                .with_setting("file", "rejected.csv")
                .with_setting("location", "out"),
        )
        .with_hop(HopSpec::new("read-left", "join"))
        .with_hop(HopSpec::new("read-right", "join"))
        .with_hop(HopSpec::error_hop("read-right", "write-errors"))
        .with_hop(HopSpec::new("join", "write"));

    let shared: Arc<dyn SharedObjects> = Arc::new(MemorySharedObjects::new());
    let result = Pipeline::run(&spec, &StageRegistry::new(), shared).await?;

    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    write_summary(&result, stdout).await?;

    eprintln!();
    eprintln!("Run {:?}: {} errors", result.status, result.total_errors());
    if !result.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
