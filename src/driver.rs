//! # Iteration Driver
//!
//! Runs one selection-and-merge round per source entity.
//!
//! The source at position `i` of the run's list reads slot `i` of every
//! item's score vector. This positional coupling is the contract with the
//! upstream score producer: reordering the sources changes which column each
//! round reads.
//!
//! ## Round anatomy
//!
//! ```text
//!   partitions ──rayon──▶ LocalSelector × P ──group by id──▶ channel ──▶ GlobalMerge
//!                                                                          │
//!                                                                   OutputSink[i]
//! ```
//!
//! Every round builds its own selectors, channel and merge; nothing survives
//! from one round to the next.

use crate::config::defaults::DEFAULT_MERGE_QUEUE_CAPACITY;
use crate::error::{ExtractError, Result};
use crate::input::PartitionedInput;
use crate::merge::GlobalMerge;
use crate::model::{Candidate, RoundContext, TopResult};
use crate::output::OutputSink;
use crate::selector::select_partition;
use crate::shuffle::{deliver, group_by_id, merge_channel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// How rounds for different sources are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundScheduling {
    /// One round at a time, in source order
    #[default]
    Sequential,
    /// All rounds concurrently; outputs are committed only once every round
    /// has succeeded and staged its output
    Parallel,
}

/// Validated run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    sources: Vec<u32>,
    capacity: usize,
    pub scheduling: RoundScheduling,
    /// Check vector lengths and id uniqueness before the first round
    pub validate_input: bool,
    pub merge_queue_capacity: usize,
}

impl RunPlan {
    /// Fails on an empty source list or a zero capacity.
    pub fn new(sources: Vec<u32>, capacity: usize) -> Result<Self> {
        if sources.is_empty() {
            return Err(ExtractError::Config("source list is empty".to_string()));
        }
        if capacity == 0 {
            return Err(ExtractError::Config(
                "top-N capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            sources,
            capacity,
            scheduling: RoundScheduling::Sequential,
            validate_input: true,
            merge_queue_capacity: DEFAULT_MERGE_QUEUE_CAPACITY,
        })
    }

    pub fn with_scheduling(mut self, scheduling: RoundScheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn with_validation(mut self, validate_input: bool) -> Self {
        self.validate_input = validate_input;
        self
    }

    pub fn with_merge_queue_capacity(mut self, capacity: usize) -> Self {
        self.merge_queue_capacity = capacity;
        self
    }

    pub fn sources(&self) -> &[u32] {
        &self.sources
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Round context for each source, in list order
    pub fn contexts(&self) -> Vec<RoundContext> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, &source)| RoundContext::new(source, i, self.capacity))
            .collect()
    }
}

/// Driver lifecycle.
///
/// Sequential: `ConfiguringRound(i) → Executing(i) → Completed(i)` per
/// source. Parallel: `ConfiguringRound(i)` for every source, then
/// `ExecutingConcurrently(rounds)`, then `Completed(i)` as each round's output
/// is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    ConfiguringRound(usize),
    Executing(usize),
    /// All configured rounds in flight at once
    ExecutingConcurrently(usize),
    Completed(usize),
    Failed(usize),
    Done,
}

/// Outcome of one completed round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub context: RoundContext,
    pub results: Vec<TopResult>,
    pub elapsed: Duration,
    pub partitions: usize,
    /// Candidates that reached the merge stage, summed over partitions
    pub candidates: usize,
}

/// Execute a single round: parallel local selection, shuffle, single merge.
#[instrument(skip(input), fields(source = ctx.source_id, index = ctx.iteration_index), level = "debug")]
pub fn run_round(
    ctx: RoundContext,
    input: &PartitionedInput,
    merge_queue_capacity: usize,
) -> Result<RoundReport> {
    let start = Instant::now();

    let local: Vec<Vec<Candidate>> = input
        .partitions()
        .par_iter()
        .enumerate()
        .map(|(partition, items)| select_partition(partition, &ctx, items))
        .collect::<Result<_>>()?;
    let candidates: usize = local.iter().map(Vec::len).sum();

    let groups = group_by_id(local);
    let (tx, rx) = merge_channel(merge_queue_capacity);
    let results = std::thread::scope(|s| {
        s.spawn(move || deliver(groups, tx));
        GlobalMerge::run(ctx, rx)
    })?;

    Ok(RoundReport {
        context: ctx,
        results,
        elapsed: start.elapsed(),
        partitions: input.partition_count(),
        candidates,
    })
}

/// Sequences rounds over a shared, read-only partitioned input.
pub struct IterationDriver<'a> {
    plan: RunPlan,
    input: &'a PartitionedInput,
    state: DriverState,
    history: Vec<DriverState>,
}

impl<'a> IterationDriver<'a> {
    pub fn new(plan: RunPlan, input: &'a PartitionedInput) -> Self {
        Self {
            plan,
            input,
            state: DriverState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Every state entered so far, oldest first
    pub fn transitions(&self) -> &[DriverState] {
        &self.history
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    fn transition(&mut self, next: DriverState) {
        debug!(from = ?self.state, to = ?next, "driver transition");
        self.state = next;
        self.history.push(next);
    }

    /// Run every round and hand each completed result to `sink`.
    ///
    /// Stops at the first failing round and reports its index and source.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<Vec<RoundReport>> {
        info!(
            input_partitions = self.input.partition_count(),
            records = self.input.record_count(),
            top = self.plan.capacity,
            sources = ?self.plan.sources,
            scheduling = ?self.plan.scheduling,
            "starting extraction"
        );

        if self.plan.validate_input {
            self.input.validate(self.plan.sources.len())?;
        }

        match self.plan.scheduling {
            RoundScheduling::Sequential => self.run_sequential(sink),
            RoundScheduling::Parallel => self.run_parallel(sink),
        }
    }

    fn run_sequential(&mut self, sink: &mut dyn OutputSink) -> Result<Vec<RoundReport>> {
        let mut reports = Vec::with_capacity(self.plan.sources.len());
        for ctx in self.plan.contexts() {
            let index = ctx.iteration_index;
            self.transition(DriverState::ConfiguringRound(index));
            info!(source = ctx.source_id, index, "starting round");

            self.transition(DriverState::Executing(index));
            let report = run_round(ctx, self.input, self.plan.merge_queue_capacity)
                .and_then(|report| {
                    sink.write_round(&ctx, &report.results)?;
                    Ok(report)
                })
                .map_err(|cause| self.fail(ctx, cause))?;

            info!(
                source = ctx.source_id,
                index,
                results = report.results.len(),
                "round finished in {:.3} seconds",
                report.elapsed.as_secs_f64()
            );
            self.transition(DriverState::Completed(index));
            reports.push(report);
        }
        self.transition(DriverState::Done);
        Ok(reports)
    }

    /// Rounds run concurrently. Outputs are staged in source order and
    /// committed only after every round succeeded and staged cleanly.
    ///
    /// A failure while committing (a rename) leaves the rounds committed
    /// before it in place, the same as a sequential run failing there.
    fn run_parallel(&mut self, sink: &mut dyn OutputSink) -> Result<Vec<RoundReport>> {
        let contexts = self.plan.contexts();
        for ctx in &contexts {
            self.transition(DriverState::ConfiguringRound(ctx.iteration_index));
            info!(source = ctx.source_id, index = ctx.iteration_index, "starting round");
        }
        self.transition(DriverState::ExecutingConcurrently(contexts.len()));

        let input = self.input;
        let queue = self.plan.merge_queue_capacity;
        let outcomes: Vec<(RoundContext, Result<RoundReport>)> = contexts
            .into_par_iter()
            .map(|ctx| (ctx, run_round(ctx, input, queue)))
            .collect();

        // Outcomes keep source order, so the first error is the lowest failing index
        let mut reports = Vec::with_capacity(outcomes.len());
        for (ctx, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(cause) => return Err(self.fail(ctx, cause)),
            }
        }

        for report in &reports {
            let ctx = report.context;
            if let Err(cause) = sink.stage_round(&ctx, &report.results) {
                sink.discard_staged();
                return Err(self.fail(ctx, cause));
            }
        }

        for report in &reports {
            let ctx = report.context;
            if let Err(cause) = sink.commit_round(ctx.iteration_index) {
                sink.discard_staged();
                return Err(self.fail(ctx, cause));
            }
            info!(
                source = ctx.source_id,
                index = ctx.iteration_index,
                results = report.results.len(),
                "round finished in {:.3} seconds",
                report.elapsed.as_secs_f64()
            );
            self.transition(DriverState::Completed(ctx.iteration_index));
        }
        self.transition(DriverState::Done);
        Ok(reports)
    }

    fn fail(&mut self, ctx: RoundContext, cause: ExtractError) -> ExtractError {
        warn!(
            source = ctx.source_id,
            index = ctx.iteration_index,
            error = %cause,
            "round failed, aborting remaining sources"
        );
        self.transition(DriverState::Failed(ctx.iteration_index));
        ExtractError::RoundFailed {
            iteration_index: ctx.iteration_index,
            source_id: ctx.source_id,
            cause: Box::new(cause),
        }
    }
}
