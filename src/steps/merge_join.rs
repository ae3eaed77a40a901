use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Row, Schema, compare_keys};
use crate::engine::{ProcessOutcome, Stage, StageContext, StageError};
use crate::storage::SharedObjects;
use crate::streaming::StageSpec;

/// Which unmatched rows a merge join keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinType {
    /// Rows of A without a partner in B are kept
    pub fn b_optional(self) -> bool {
        matches!(self, JoinType::LeftOuter | JoinType::FullOuter)
    }

    /// Rows of B without a partner in A are kept
    pub fn a_optional(self) -> bool {
        matches!(self, JoinType::RightOuter | JoinType::FullOuter)
    }
}

impl FromStr for JoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        match normalized.as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT OUTER" => Ok(JoinType::LeftOuter),
            "RIGHT OUTER" => Ok(JoinType::RightOuter),
            "FULL OUTER" => Ok(JoinType::FullOuter),
            _ => Err(format!("unknown join type '{}'", s)),
        }
    }
}

impl TryFrom<String> for JoinType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Inner => "INNER",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeJoinConfig {
    /// Upstream stage feeding side A
    pub step_a: String,
    /// Upstream stage feeding side B
    pub step_b: String,
    pub keys_a: Vec<String>,
    pub keys_b: Vec<String>,
    #[serde(default)]
    pub join_type: JoinType,
}

/// Schemas and key positions, fixed on the first iteration
struct Layout {
    a: Option<Arc<Schema>>,
    b: Option<Arc<Schema>>,
    keys_a: Vec<usize>,
    keys_b: Vec<usize>,
    output: Option<Arc<Schema>>,
}

/// Sort-merge join of two inputs sorted ascending on their keys.
///
/// One comparison step runs per `process_one` call. Runs of equal keys on
/// either side are buffered whole and emitted as a cross product, so memory
/// grows with the longest duplicate run.
pub struct MergeJoin {
    config: MergeJoinConfig,
    layout: Option<Layout>,
    one: Option<Row>,
    two: Option<Row>,
}

impl MergeJoin {
    pub fn new(config: MergeJoinConfig) -> Self {
        Self {
            config,
            layout: None,
            one: None,
            two: None,
        }
    }

    /// Registry constructor
    pub fn create(
        spec: &StageSpec,
        _shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(Self::new(spec.config_as()?)))
    }

    pub fn config(&self) -> &MergeJoinConfig {
        &self.config
    }

    async fn first_iteration(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        self.one = ctx.get_row_from(&self.config.step_a).await;
        self.two = ctx.get_row_from(&self.config.step_b).await;

        let a = ctx.input_schema(&self.config.step_a);
        let b = ctx.input_schema(&self.config.step_b);

        let keys_a = match &a {
            Some(schema) => key_positions(schema, &self.config.keys_a, &self.config.step_a)?,
            None => Vec::new(),
        };
        let keys_b = match &b {
            Some(schema) => key_positions(schema, &self.config.keys_b, &self.config.step_b)?,
            None => Vec::new(),
        };

        let output = match (&a, &b) {
            (Some(a), Some(b)) => {
                for (&ia, &ib) in keys_a.iter().zip(&keys_b) {
                    let (fa, fb) = (&a.fields()[ia], &b.fields()[ib]);
                    if fa.value_type != fb.value_type {
                        return Err(StageError::Config(format!(
                            "key '{}' is {} but '{}' is {}",
                            fa.name, fa.value_type, fb.name, fb.value_type
                        )));
                    }
                }
                let output = Arc::new(a.merge(b));
                ctx.declare_output_schema(&output)?;
                debug!(stage = %ctx.name(), fields = output.len(), "Output schema fixed");
                Some(output)
            }
            _ => None,
        };

        self.layout = Some(Layout {
            a,
            b,
            keys_a,
            keys_b,
            output,
        });
        Ok(())
    }

    /// Read both inputs to the end so no producer stays blocked
    async fn drain(&mut self, ctx: &mut StageContext) {
        while self.one.is_some() && !ctx.is_stopped() {
            self.one = ctx.get_row_from(&self.config.step_a).await;
        }
        while self.two.is_some() && !ctx.is_stopped() {
            self.two = ctx.get_row_from(&self.config.step_b).await;
        }
    }

    async fn emit(
        &self,
        ctx: &mut StageContext,
        a: Option<&Row>,
        b: Option<&Row>,
    ) -> Result<(), StageError> {
        let layout = self.layout()?;
        let (Some(output), Some(schema_a), Some(schema_b)) = (&layout.output, &layout.a, &layout.b)
        else {
            return Err(self.unknown_schema(layout));
        };

        let dummy_a;
        let dummy_b;
        let a = match a {
            Some(row) => row,
            None => {
                dummy_a = Row::nulls(schema_a.len());
                &dummy_a
            }
        };
        let b = match b {
            Some(row) => row,
            None => {
                dummy_b = Row::nulls(schema_b.len());
                &dummy_b
            }
        };
        ctx.put_row(output, Row::concat(a, b)).await
    }

    fn unknown_schema(&self, layout: &Layout) -> StageError {
        let missing = if layout.a.is_none() {
            &self.config.step_a
        } else {
            &self.config.step_b
        };
        StageError::UnknownSchema(missing.clone())
    }

    fn layout(&self) -> Result<&Layout, StageError> {
        self.layout
            .as_ref()
            .ok_or_else(|| StageError::Failed("merge join layout not initialised".to_string()))
    }

    fn compare_a_b(&self, one: &Row, two: &Row) -> Result<Ordering, StageError> {
        let layout = self.layout()?;
        let (Some(a), Some(b)) = (&layout.a, &layout.b) else {
            return Err(self.unknown_schema(layout));
        };
        Ok(compare_keys(a, one, &layout.keys_a, b, two, &layout.keys_b)?)
    }

    fn same_key_a(&self, x: &Row, y: &Row) -> Result<bool, StageError> {
        let layout = self.layout()?;
        match &layout.a {
            Some(a) => Ok(a.compare_rows(x, y, &layout.keys_a)? == Ordering::Equal),
            None => Ok(false),
        }
    }

    fn same_key_b(&self, x: &Row, y: &Row) -> Result<bool, StageError> {
        let layout = self.layout()?;
        match &layout.b {
            Some(b) => Ok(b.compare_rows(x, y, &layout.keys_b)? == Ordering::Equal),
            None => Ok(false),
        }
    }

    /// Both current rows share a key: emit the pair, or the cross product of
    /// both duplicate runs
    async fn join_equal(
        &mut self,
        ctx: &mut StageContext,
        one: Row,
        two: Row,
    ) -> Result<(), StageError> {
        let one_next = ctx.get_row_from(&self.config.step_a).await;
        let two_next = ctx.get_row_from(&self.config.step_b).await;

        let dup_a = match &one_next {
            Some(next) => self.same_key_a(&one, next)?,
            None => false,
        };
        let dup_b = match &two_next {
            Some(next) => self.same_key_b(&two, next)?,
            None => false,
        };

        if !dup_a && !dup_b {
            self.emit(ctx, Some(&one), Some(&two)).await?;
            self.one = one_next;
            self.two = two_next;
            return Ok(());
        }

        let mut group_a = vec![one];
        if dup_a {
            group_a.extend(one_next);
            self.one = None;
            while let Some(row) = ctx.get_row_from(&self.config.step_a).await {
                if self.same_key_a(&group_a[0], &row)? {
                    group_a.push(row);
                } else {
                    self.one = Some(row);
                    break;
                }
            }
        } else {
            self.one = one_next;
        }

        let mut group_b = vec![two];
        if dup_b {
            group_b.extend(two_next);
            self.two = None;
            while let Some(row) = ctx.get_row_from(&self.config.step_b).await {
                if self.same_key_b(&group_b[0], &row)? {
                    group_b.push(row);
                } else {
                    self.two = Some(row);
                    break;
                }
            }
        } else {
            self.two = two_next;
        }

        for a in &group_a {
            for b in &group_b {
                self.emit(ctx, Some(a), Some(b)).await?;
            }
        }
        Ok(())
    }
}

fn key_positions(schema: &Schema, keys: &[String], step: &str) -> Result<Vec<usize>, StageError> {
    schema
        .indexes_of(keys)
        .map_err(|e| StageError::Config(format!("input '{}': {}", step, e)))
}

#[async_trait]
impl Stage for MergeJoin {
    fn kind(&self) -> &'static str {
        "merge-join"
    }

    async fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let config = &self.config;
        for step in [&config.step_a, &config.step_b] {
            if !ctx.has_input(step) {
                return Err(StageError::MissingInput(step.clone()));
            }
        }
        if config.step_a == config.step_b {
            return Err(StageError::Config(
                "step_a and step_b must be different stages".to_string(),
            ));
        }
        if config.keys_a.is_empty() || config.keys_b.is_empty() {
            return Err(StageError::Config("join keys must not be empty".to_string()));
        }
        if config.keys_a.len() != config.keys_b.len() {
            return Err(StageError::Config(format!(
                "keys_a has {} fields but keys_b has {}",
                config.keys_a.len(),
                config.keys_b.len()
            )));
        }
        debug!(stage = %ctx.name(), join_type = %config.join_type, "Merge join ready");
        Ok(())
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        if self.layout.is_none() {
            self.first_iteration(ctx).await?;
        }

        let a_optional = self.config.join_type.a_optional();
        let b_optional = self.config.join_type.b_optional();

        let finished = (self.one.is_none() && self.two.is_none())
            || (self.one.is_none() && !a_optional)
            || (self.two.is_none() && !b_optional);
        if finished {
            self.drain(ctx).await;
            return Ok(ProcessOutcome::Finished);
        }

        let cmp = match (&self.one, &self.two) {
            (None, _) => Ordering::Greater,
            (_, None) => Ordering::Less,
            (Some(one), Some(two)) => self.compare_a_b(one, two)?,
        };

        match cmp {
            Ordering::Equal => {
                if let (Some(one), Some(two)) = (self.one.take(), self.two.take()) {
                    self.join_equal(ctx, one, two).await?;
                }
            }
            Ordering::Less => {
                if b_optional {
                    self.emit(ctx, self.one.as_ref(), None).await?;
                }
                self.one = ctx.get_row_from(&self.config.step_a).await;
            }
            Ordering::Greater => {
                if a_optional {
                    self.emit(ctx, None, self.two.as_ref()).await?;
                }
                self.two = ctx.get_row_from(&self.config.step_b).await;
            }
        }
        Ok(ProcessOutcome::Continue)
    }
}
