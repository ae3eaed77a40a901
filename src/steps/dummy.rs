use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Schema;
use crate::engine::{ProcessOutcome, Stage, StageContext, StageError};
use crate::storage::SharedObjects;
use crate::streaming::StageSpec;

/// Passes every input row through unchanged
#[derive(Default)]
pub struct Dummy {
    schema: Option<Arc<Schema>>,
}

impl Dummy {
    pub fn create(
        _spec: &StageSpec,
        _shared: &dyn SharedObjects,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(Self::default()))
    }
}

#[async_trait]
impl Stage for Dummy {
    fn kind(&self) -> &'static str {
        "dummy"
    }

    async fn process_one(&mut self, ctx: &mut StageContext) -> Result<ProcessOutcome, StageError> {
        let Some(row) = ctx.get_row().await else {
            // downstream still needs the layout when no row came through
            if let Some(schema) = ctx.any_input_schema() {
                ctx.declare_output_schema(&schema)?;
            }
            return Ok(ProcessOutcome::Finished);
        };

        if self.schema.is_none() {
            self.schema = ctx.any_input_schema();
        }
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| StageError::UnknownSchema(ctx.name().to_string()))?;
        ctx.put_row(&schema, row).await?;
        Ok(ProcessOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::row_channel;
    use crate::domain::{FieldMeta, Row, Value, ValueType};
    use crate::streaming::run_stage;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn passes_rows_through_with_schema() {
        let schema =
            Arc::new(Schema::from_fields([FieldMeta::new("n", ValueType::Integer)]).unwrap());
        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("pass", 0, cancel.clone());
        let (tx_in, rx_in) = row_channel(4, cancel.clone());
        let (tx_out, mut rx_out) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx_in);
        ctx.add_output("sink", tx_out);

        tx_in.declare_schema(&schema).unwrap();
        tx_in.put(Row::new(vec![Value::Integer(1)])).await.unwrap();
        tx_in.put(Row::new(vec![Value::Integer(2)])).await.unwrap();
        drop(tx_in);

        let result = run_stage(Box::new(Dummy::default()), ctx).await;

        assert_eq!(result.counters.lines_read, 2);
        assert_eq!(result.counters.lines_written, 2);
        assert_eq!(rx_out.schema().as_deref(), Some(&*schema));
        assert_eq!(rx_out.get().await, Some(Row::new(vec![Value::Integer(1)])));
        assert_eq!(rx_out.get().await, Some(Row::new(vec![Value::Integer(2)])));
        assert_eq!(rx_out.get().await, None);
    }

    #[tokio::test]
    async fn empty_input_still_declares_schema() {
        let schema =
            Arc::new(Schema::from_fields([FieldMeta::new("n", ValueType::Integer)]).unwrap());
        let cancel = CancellationToken::new();
        let mut ctx = StageContext::new("pass", 0, cancel.clone());
        let (tx_in, rx_in) = row_channel(4, cancel.clone());
        let (tx_out, mut rx_out) = row_channel(4, cancel.clone());
        ctx.add_input("src", rx_in);
        ctx.add_output("sink", tx_out);

        tx_in.declare_schema(&schema).unwrap();
        drop(tx_in);

        let result = run_stage(Box::new(Dummy::default()), ctx).await;

        assert_eq!(result.counters.lines_written, 0);
        assert_eq!(rx_out.schema().as_deref(), Some(&*schema));
        assert_eq!(rx_out.get().await, None);
    }
}
