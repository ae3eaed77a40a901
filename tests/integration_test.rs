use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rowflow::prelude::*;
use tempfile::TempDir;
use tokio_test::{assert_pending, assert_ready};

/// Data-grid stage spec with an integer key and a text column
fn grid(name: &str, rows: &[(&str, &str)]) -> StageSpec {
    let rows = rows
        .iter()
        .map(|(k, v)| format!("[\"{}\", \"{}\"]", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    let config: toml::Table = toml::from_str(&format!(
        r#"
        fields = [
            {{ name = "id", type = "integer" }},
            {{ name = "name", type = "string" }},
        ]
        rows = [{}]
        "#,
        rows
    ))
    .unwrap();
    StageSpec::new(name, "data-grid").with_config(config)
}

fn join(join_type: &str) -> StageSpec {
    StageSpec::new("join", "merge-join")
        .with_setting("step_a", "a")
        .with_setting("step_b", "b")
        .with_setting("keys_a", vec!["id"])
        .with_setting("keys_b", vec!["id"])
        .with_setting("join_type", join_type)
}

fn no_shared() -> Arc<dyn SharedObjects> {
    Arc::new(MemorySharedObjects::new())
}

/// Run a join of two grids into a CSV file and return the file content
async fn join_to_csv(join_type: &str, a: &[(&str, &str)], b: &[(&str, &str)]) -> String {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("joined.csv");

    let spec = PipelineSpec::new("join")
        .with_capacity(1)
        .with_stage(grid("a", a))
        .with_stage(grid("b", b))
        .with_stage(join(join_type))
        .with_stage(
            StageSpec::new("write", "csv-output").with_setting("file", out.to_str().unwrap()),
        )
        .with_hop(HopSpec::new("a", "join"))
        .with_hop(HopSpec::new("b", "join"))
        .with_hop(HopSpec::new("join", "write"));

    let result = Pipeline::run(&spec, &StageRegistry::new(), no_shared())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Finished, "{:?}", result.stages);
    assert!(result.succeeded());

    std::fs::read_to_string(&out).unwrap()
}

const A: &[(&str, &str)] = &[("1", "a"), ("2", "b")];
const B: &[(&str, &str)] = &[("1", "x"), ("3", "y")];

#[tokio::test]
async fn inner_join_drops_unmatched_keys() {
    assert_eq!(
        join_to_csv("INNER", A, B).await,
        "id,name,id_1,name_1\n1,a,1,x\n"
    );
}

#[tokio::test]
async fn left_outer_join_pads_missing_b() {
    assert_eq!(
        join_to_csv("LEFT OUTER", A, B).await,
        "id,name,id_1,name_1\n1,a,1,x\n2,b,,\n"
    );
}

#[tokio::test]
async fn full_outer_join_in_key_order() {
    assert_eq!(
        join_to_csv("FULL OUTER", A, B).await,
        "id,name,id_1,name_1\n1,a,1,x\n2,b,,\n,,3,y\n"
    );
}

#[tokio::test]
async fn right_outer_join_pads_empty_side_behind_pass_through() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("joined.csv");

    let spec = PipelineSpec::new("join")
        .with_capacity(1)
        .with_stage(grid("a-src", &[]))
        .with_stage(StageSpec::new("a", "dummy"))
        .with_stage(grid("b", B))
        .with_stage(join("RIGHT OUTER"))
        .with_stage(
            StageSpec::new("write", "csv-output").with_setting("file", out.to_str().unwrap()),
        )
        .with_hop(HopSpec::new("a-src", "a"))
        .with_hop(HopSpec::new("a", "join"))
        .with_hop(HopSpec::new("b", "join"))
        .with_hop(HopSpec::new("join", "write"));

    let result = Pipeline::run(&spec, &StageRegistry::new(), no_shared())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Finished, "{:?}", result.stages);
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "id,name,id_1,name_1\n,,1,x\n,,3,y\n"
    );
}

#[tokio::test]
async fn duplicate_keys_give_cross_product() {
    let out = join_to_csv(
        "INNER",
        &[("1", "a1"), ("1", "a2")],
        &[("1", "x1"), ("1", "x2")],
    )
    .await;

    let mut lines: Vec<&str> = out.lines().skip(1).collect();
    lines.sort();
    assert_eq!(
        lines,
        vec!["1,a1,1,x1", "1,a1,1,x2", "1,a2,1,x1", "1,a2,1,x2"]
    );
}

#[tokio::test]
async fn put_blocks_at_capacity() {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = row_channel(2, cancel);
    let row = || Row::new(vec![Value::Integer(1)]);

    tx.put(row()).await.unwrap();
    tx.put(row()).await.unwrap();
    assert_eq!(tx.buffered(), 2);

    let mut blocked = tokio_test::task::spawn(tx.put(row()));
    assert_pending!(blocked.poll());

    assert!(rx.get().await.is_some());
    assert!(blocked.is_woken());
    assert_ready!(blocked.poll()).unwrap();
    assert_eq!(rx.buffered(), 2);
}

#[tokio::test]
async fn drained_channel_keeps_returning_end_of_stream() {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = row_channel(4, cancel);
    tx.put(Row::new(vec![Value::from("only")])).await.unwrap();
    tx.close();

    assert!(rx.get().await.is_some());
    for _ in 0..3 {
        assert_eq!(rx.get().await, None);
    }
    assert!(rx.is_drained());
}

#[tokio::test]
async fn init_failure_processes_nothing() {
    let spec = PipelineSpec::new("broken")
        .with_stage(StageSpec::new("read", "csv-input").with_config(
            toml::from_str(
                r#"
                file = "/nonexistent/input.csv"
                fields = [{ name = "id", type = "integer" }]
                "#,
            )
            .unwrap(),
        ))
        .with_stage(StageSpec::new("pass", "dummy"))
        .with_hop(HopSpec::new("read", "pass"));

    let result = Pipeline::run(&spec, &StageRegistry::new(), no_shared())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::InitFailed);
    assert!(!result.succeeded());
    let totals = result.totals();
    assert_eq!(totals.lines_read, 0);
    assert_eq!(totals.lines_written, 0);
    assert_eq!(totals.lines_input, 0);

    let read = result.stage("read").unwrap();
    assert_eq!(read.state, StageState::Errored);
    assert!(!read.disposed);

    let pass = result.stage("pass").unwrap();
    assert_eq!(pass.state, StageState::Initialized);
    assert!(pass.disposed);
}

/// Emits increasing integers until stopped
struct Endless {
    schema: Arc<Schema>,
    next: i64,
}

impl Endless {
    fn create(_: &StageSpec, _: &dyn SharedObjects) -> Result<Box<dyn Stage>, StageError> {
        let schema = Schema::from_fields([FieldMeta::new("n", ValueType::Integer)])?;
        Ok(Box::new(Self {
            schema: Arc::new(schema),
            next: 0,
        }))
    }
}

#[async_trait]
impl Stage for Endless {
    fn kind(&self) -> &'static str {
        "endless"
    }

    async fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        ctx.declare_output_schema(&self.schema)
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        self.next += 1;
        ctx.put_row(&self.schema, Row::new(vec![Value::Integer(self.next)]))
            .await?;
        Ok(ProcessOutcome::Continue)
    }
}

/// Takes one row every 50ms
struct Slow;

#[async_trait]
impl Stage for Slow {
    fn kind(&self) -> &'static str {
        "slow"
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        match ctx.get_row().await {
            Some(_) => Ok(ProcessOutcome::Continue),
            None => Ok(ProcessOutcome::Finished),
        }
    }
}

/// Fails on its fifth row
struct Explode {
    seen: u32,
}

#[async_trait]
impl Stage for Explode {
    fn kind(&self) -> &'static str {
        "explode"
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        if ctx.get_row().await.is_none() {
            return Ok(ProcessOutcome::Finished);
        }
        self.seen += 1;
        if self.seen == 5 {
            return Err(StageError::Failed("boom".to_string()));
        }
        Ok(ProcessOutcome::Continue)
    }
}

fn slow(_: &StageSpec, _: &dyn SharedObjects) -> Result<Box<dyn Stage>, StageError> {
    Ok(Box::new(Slow))
}

fn explode(_: &StageSpec, _: &dyn SharedObjects) -> Result<Box<dyn Stage>, StageError> {
    Ok(Box::new(Explode { seen: 0 }))
}

fn test_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry
        .register("endless", Endless::create)
        .register("slow", slow)
        .register("explode", explode);
    registry
}

#[tokio::test]
async fn fatal_error_stops_slow_and_blocked_stages() {
    let spec = PipelineSpec::new("stress")
        .with_capacity(1)
        .with_stage(StageSpec::new("source", "endless").with_distribution(Distribution::Copy))
        .with_stage(StageSpec::new("slow", "slow").with_copies(2))
        .with_stage(StageSpec::new("pass", "dummy"))
        .with_stage(StageSpec::new("explode", "explode"))
        .with_hop(HopSpec::new("source", "slow"))
        .with_hop(HopSpec::new("source", "pass"))
        .with_hop(HopSpec::new("pass", "explode"));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        Pipeline::run(&spec, &test_registry(), no_shared()),
    )
    .await
    .expect("pipeline did not stop")
    .unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.total_errors(), 1);
    assert_eq!(result.stages.len(), 5);
    for stage in &result.stages {
        assert!(
            matches!(stage.state, StageState::Done | StageState::Errored),
            "{} ended {:?}",
            stage.name,
            stage.state
        );
        assert!(stage.disposed, "{} not disposed", stage.name);
    }
    assert_eq!(result.stage("explode").unwrap().state, StageState::Errored);
    assert_eq!(
        result.stage("explode").unwrap().error.as_deref(),
        Some("boom")
    );
}

#[tokio::test]
async fn external_stop_ends_endless_pipeline() {
    let spec = PipelineSpec::new("endless")
        .with_capacity(2)
        .with_stage(StageSpec::new("source", "endless"))
        .with_stage(StageSpec::new("slow", "slow"))
        .with_hop(HopSpec::new("source", "slow"));

    let running = Pipeline::prepare(&spec, &test_registry(), no_shared())
        .unwrap()
        .start()
        .await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    running.stop();

    let result = tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .expect("pipeline did not stop");
    assert_eq!(result.status, RunStatus::Stopped);
    assert!(result.succeeded());
    assert!(result.stage_totals("slow").lines_read >= 1);
}

#[tokio::test]
async fn toml_pipeline_reads_joins_and_writes() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("customers.csv"),
        "id;name\n1;ann\n2;bob\n3;cy\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("orders.csv"),
        "order;customer;total\n10;1;9.50\n11;3;1.25\n12;3;4.00\noops\n",
    )
    .unwrap();

    let spec = PipelineSpec::from_toml_str(&format!(
        r#"
        name = "orders-per-customer"
        channel_capacity = 2

        [[shared]]
        type = "file-location"
        name = "landing"
        properties = {{ directory = "{dir}" }}

        [[stages]]
        name = "customers"
        kind = "csv-input"
        [stages.config]
        file = "customers.csv"
        location = "landing"
        delimiter = ";"
        fields = [
            {{ name = "id", type = "integer" }},
            {{ name = "name", type = "string" }},
        ]

        [[stages]]
        name = "orders"
        kind = "csv-input"
        [stages.error_handling]
        enabled = true
        [stages.config]
        file = "orders.csv"
        location = "landing"
        delimiter = ";"
        fields = [
            {{ name = "order", type = "integer" }},
            {{ name = "customer", type = "integer" }},
            {{ name = "total", type = "bignumber" }},
        ]

        [[stages]]
        name = "join"
        kind = "merge-join"
        [stages.config]
        step_a = "customers"
        step_b = "orders"
        keys_a = ["id"]
        keys_b = ["customer"]
        join_type = "left outer"

        [[stages]]
        name = "write"
        kind = "csv-output"
        [stages.config]
        file = "{out}"

        [[stages]]
        name = "rejects"
        kind = "csv-output"
        [stages.config]
        file = "{rejects}"

        [[hops]]
        from = "customers"
        to = "join"

        [[hops]]
        from = "orders"
        to = "join"

        [[hops]]
        from = "orders"
        to = "rejects"
        error = true

        [[hops]]
        from = "join"
        to = "write"
        "#,
        dir = dir.path().display(),
        out = dir.path().join("joined.csv").display(),
        rejects = dir.path().join("rejects.csv").display(),
    ))
    .unwrap();

    let result = Pipeline::run(&spec, &StageRegistry::new(), no_shared())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Finished, "{:?}", result.stages);
    assert_eq!(result.stage_totals("orders").lines_rejected, 1);
    assert_eq!(result.stage_totals("write").lines_output, 4);

    let joined = std::fs::read_to_string(dir.path().join("joined.csv")).unwrap();
    assert_eq!(
        joined,
        "id,name,order,customer,total\n\
         1,ann,10,1,9.50\n\
         2,bob,,,\n\
         3,cy,11,3,1.25\n\
         3,cy,12,3,4.00\n"
    );

    let rejects = std::fs::read_to_string(dir.path().join("rejects.csv")).unwrap();
    assert!(rejects.lines().nth(1).unwrap().starts_with("oops,,,1,"));
    assert!(rejects.contains("CSV001"));
}
