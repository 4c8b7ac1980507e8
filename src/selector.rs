//! # Local Selection
//!
//! Partition-local first stage of a round. Each partition owns its selector
//! and ranked set exclusively, so partitions run in parallel without locks.

use crate::error::{ExtractError, Result};
use crate::model::{Candidate, RoundContext, ScoredItem};
use crate::ranked::BoundedRankedSet;
use tracing::{debug, instrument};

/// Streams one partition's records into a partition-local ranked set.
#[derive(Debug)]
pub struct LocalSelector {
    partition: usize,
    index: usize,
    ranked: BoundedRankedSet,
    observed: u64,
}

impl LocalSelector {
    pub fn new(partition: usize, ctx: &RoundContext) -> Self {
        Self {
            partition,
            index: ctx.iteration_index,
            ranked: BoundedRankedSet::new(ctx.capacity),
            observed: 0,
        }
    }

    /// Feed one record. A record without a usable score at the extraction
    /// index aborts the partition.
    #[inline]
    pub fn observe(&mut self, item: &ScoredItem) -> Result<()> {
        let score = item
            .score_at(self.index)
            .ok_or_else(|| ExtractError::MalformedRecord {
                partition: self.partition,
                id: item.id,
                index: self.index,
                len: item.scores.len(),
            })?;
        if score.is_nan() {
            return Err(ExtractError::NonFiniteScore {
                partition: self.partition,
                id: item.id,
                index: self.index,
            });
        }
        self.ranked.insert(item.id, score);
        self.observed += 1;
        Ok(())
    }

    /// Number of records observed so far
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// End of partition: emit every retained candidate.
    pub fn finish(mut self) -> Vec<Candidate> {
        self.ranked.extract_all_sorted_descending()
    }
}

/// Run local selection over a whole partition.
#[instrument(skip(ctx, items), fields(index = ctx.iteration_index), level = "debug")]
pub fn select_partition<'a, I>(partition: usize, ctx: &RoundContext, items: I) -> Result<Vec<Candidate>>
where
    I: IntoIterator<Item = &'a ScoredItem>,
{
    let mut selector = LocalSelector::new(partition, ctx);
    for item in items {
        selector.observe(item)?;
    }
    let observed = selector.observed();
    let candidates = selector.finish();
    debug!(
        partition,
        observed,
        retained = candidates.len(),
        "local selection finished"
    );
    Ok(candidates)
}
