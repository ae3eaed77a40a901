use std::collections::HashMap;

use super::error::PipelineError;
use super::spec::PipelineSpec;

/// One channel to create: a producer copy feeding a consumer copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    pub from: usize,
    pub from_copy: usize,
    pub to: usize,
    pub to_copy: usize,
    pub error: bool,
}

/// Check the graph and list the channels it needs.
///
/// Stage indexes in the plan refer to `spec.stages`. Equal copy counts are
/// wired pairwise, a single copy on either side is wired to every copy of
/// the other side, anything else is refused.
pub fn plan_channels(spec: &PipelineSpec) -> Result<Vec<ChannelPlan>, PipelineError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, stage) in spec.stages.iter().enumerate() {
        if index.insert(stage.name.as_str(), i).is_some() {
            return Err(PipelineError::DuplicateStage(stage.name.clone()));
        }
        if stage.copies == 0 {
            return Err(PipelineError::ZeroCopies(stage.name.clone()));
        }
    }

    let mut error_hops: Vec<usize> = Vec::new();
    let mut plans = Vec::new();

    for hop in &spec.hops {
        let lookup = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| PipelineError::UnknownStage {
                    from: hop.from.clone(),
                    to: hop.to.clone(),
                    missing: name.to_string(),
                })
        };
        let from = lookup(&hop.from)?;
        let to = lookup(&hop.to)?;
        let producer = &spec.stages[from];
        let consumer = &spec.stages[to];

        if hop.error {
            if producer.error_handling.as_ref().is_none_or(|h| !h.enabled) {
                return Err(PipelineError::MissingErrorHandling(producer.name.clone()));
            }
            if error_hops.contains(&from) {
                return Err(PipelineError::DuplicateErrorHop(producer.name.clone()));
            }
            error_hops.push(from);
        }

        let mismatch = || PipelineError::CopyMismatch {
            from: producer.name.clone(),
            from_copies: producer.copies,
            to: consumer.name.clone(),
            to_copies: consumer.copies,
        };

        let pairs: Vec<(usize, usize)> = if producer.copies == consumer.copies {
            (0..producer.copies).map(|c| (c, c)).collect()
        } else if producer.copies == 1 || consumer.copies == 1 {
            // an error hop feeds one error channel per producer copy
            if hop.error && consumer.copies > 1 {
                return Err(mismatch());
            }
            (0..producer.copies)
                .flat_map(|f| (0..consumer.copies).map(move |t| (f, t)))
                .collect()
        } else {
            return Err(mismatch());
        };

        plans.extend(pairs.into_iter().map(|(from_copy, to_copy)| ChannelPlan {
            from,
            from_copy,
            to,
            to_copy,
            error: hop.error,
        }));
    }

    check_for_loops(spec, &index)?;
    Ok(plans)
}

fn check_for_loops(spec: &PipelineSpec, index: &HashMap<&str, usize>) -> Result<(), PipelineError> {
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); spec.stages.len()];
    for hop in &spec.hops {
        if let (Some(&from), Some(&to)) = (index.get(hop.from.as_str()), index.get(hop.to.as_str())) {
            successors[from].push(to);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Finished,
    }

    fn visit(
        node: usize,
        successors: &[Vec<usize>],
        marks: &mut [Mark],
    ) -> Option<usize> {
        marks[node] = Mark::Active;
        for &next in &successors[node] {
            match marks[next] {
                Mark::Active => return Some(next),
                Mark::New => {
                    if let Some(found) = visit(next, successors, marks) {
                        return Some(found);
                    }
                }
                Mark::Finished => {}
            }
        }
        marks[node] = Mark::Finished;
        None
    }

    let mut marks = vec![Mark::New; spec.stages.len()];
    for start in 0..spec.stages.len() {
        if marks[start] == Mark::New
            && let Some(node) = visit(start, &successors, &mut marks)
        {
            return Err(PipelineError::Loop(spec.stages[node].name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorHandling;
    use crate::streaming::spec::{HopSpec, StageSpec};

    fn spec(stages: &[(&str, usize)], hops: &[(&str, &str)]) -> PipelineSpec {
        let mut spec = PipelineSpec::new("test");
        for (name, copies) in stages {
            spec = spec.with_stage(StageSpec::new(*name, "dummy").with_copies(*copies));
        }
        for (from, to) in hops {
            spec = spec.with_hop(HopSpec::new(*from, *to));
        }
        spec
    }

    fn pairs(plans: &[ChannelPlan]) -> Vec<(usize, usize)> {
        plans.iter().map(|p| (p.from_copy, p.to_copy)).collect()
    }

    #[test]
    fn equal_copies_are_wired_pairwise() {
        let plans = plan_channels(&spec(&[("a", 3), ("b", 3)], &[("a", "b")])).unwrap();
        assert_eq!(pairs(&plans), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn single_copy_is_wired_to_every_copy() {
        let fan_out = plan_channels(&spec(&[("a", 1), ("b", 2)], &[("a", "b")])).unwrap();
        assert_eq!(pairs(&fan_out), vec![(0, 0), (0, 1)]);

        let fan_in = plan_channels(&spec(&[("a", 2), ("b", 1)], &[("a", "b")])).unwrap();
        assert_eq!(pairs(&fan_in), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn mismatched_copies_are_refused() {
        assert!(matches!(
            plan_channels(&spec(&[("a", 2), ("b", 3)], &[("a", "b")])),
            Err(PipelineError::CopyMismatch { .. })
        ));
    }

    #[test]
    fn refuses_bad_definitions() {
        assert!(matches!(
            plan_channels(&spec(&[("a", 1), ("a", 1)], &[])),
            Err(PipelineError::DuplicateStage(_))
        ));
        assert!(matches!(
            plan_channels(&spec(&[("a", 0)], &[])),
            Err(PipelineError::ZeroCopies(_))
        ));
        assert!(matches!(
            plan_channels(&spec(&[("a", 1)], &[("a", "ghost")])),
            Err(PipelineError::UnknownStage { .. })
        ));
        assert!(matches!(
            plan_channels(&spec(&[("a", 1), ("b", 1)], &[("a", "b"), ("b", "a")])),
            Err(PipelineError::Loop(_))
        ));
    }

    #[test]
    fn error_hops_need_error_handling() {
        let without = spec(&[("a", 1), ("err", 1)], &[])
            .with_hop(HopSpec::error_hop("a", "err"));
        assert!(matches!(
            plan_channels(&without),
            Err(PipelineError::MissingErrorHandling(_))
        ));

        let mut with = without.clone();
        with.stages[0].error_handling = Some(ErrorHandling::default());
        let plans = plan_channels(&with).unwrap();
        assert!(plans[0].error);

        let twice = with.with_hop(HopSpec::error_hop("a", "err"));
        assert!(matches!(
            plan_channels(&twice),
            Err(PipelineError::DuplicateErrorHop(_))
        ));
    }
}
