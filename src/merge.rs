//! # Global Merge
//!
//! Single-owner aggregator for one round. It is the only task that touches
//! the round's global ranked set, so no locking is involved.
//!
//! For every delivered group the merge checks that exactly one candidate
//! arrived (item ids are unique across partitions and each selector emits an
//! id at most once) and re-ranks with the same capacity as the local stage.
//!
//! Ranking stays on the log scale, the same key the local stage used. `exp`
//! preserves order but f32 probabilities collapse distinct log scores
//! (underflow below roughly -104, signed zeros), and ranking on the collapsed
//! value would let partitioning decide which tied item survives. Conversion to
//! linear probability happens when the result is emitted.

use crate::error::{ExtractError, Result};
use crate::model::{RoundContext, TopResult};
use crate::ranked::BoundedRankedSet;
use crate::shuffle::CandidateGroup;
use crossbeam_channel::Receiver;
use tracing::{debug, instrument};

/// `exp` of a stored natural-log probability.
#[inline]
pub fn log_to_probability(logged: f32) -> f32 {
    (logged as f64).exp() as f32
}

#[derive(Debug)]
pub struct GlobalMerge {
    ctx: RoundContext,
    ranked: BoundedRankedSet,
    groups: u64,
}

impl GlobalMerge {
    pub fn new(ctx: RoundContext) -> Self {
        Self {
            ctx,
            ranked: BoundedRankedSet::new(ctx.capacity),
            groups: 0,
        }
    }

    /// Fold one key group into the global ranking.
    pub fn accept(&mut self, group: CandidateGroup) -> Result<()> {
        let logged = match group.scores.as_slice() {
            [only] => *only,
            other => {
                return Err(ExtractError::DuplicateCandidate {
                    id: group.id,
                    count: other.len(),
                })
            }
        };
        self.ranked.insert(group.id, logged);
        self.groups += 1;
        Ok(())
    }

    /// Number of groups merged so far
    pub fn groups(&self) -> u64 {
        self.groups
    }

    /// End of stream: the round's final top-N, highest probability first.
    pub fn finish(mut self) -> Vec<TopResult> {
        let results: Vec<TopResult> = self
            .ranked
            .extract_all_sorted_descending()
            .into_iter()
            .map(|c| TopResult {
                id: c.id,
                probability: log_to_probability(c.score),
            })
            .collect();
        debug!(
            source = self.ctx.source_id,
            groups = self.groups,
            results = results.len(),
            "global merge finished"
        );
        results
    }

    /// Merge an in-memory sequence of groups.
    pub fn merge_groups<I>(ctx: RoundContext, groups: I) -> Result<Vec<TopResult>>
    where
        I: IntoIterator<Item = CandidateGroup>,
    {
        let mut merge = Self::new(ctx);
        for group in groups {
            merge.accept(group)?;
        }
        Ok(merge.finish())
    }

    /// Drain the shuffle channel until every sender is gone.
    ///
    /// On error the receiver is dropped immediately, which stops the producer.
    #[instrument(skip(rx), fields(source = ctx.source_id, index = ctx.iteration_index), level = "debug")]
    pub fn run(ctx: RoundContext, rx: Receiver<CandidateGroup>) -> Result<Vec<TopResult>> {
        let mut merge = Self::new(ctx);
        for group in rx.iter() {
            merge.accept(group)?;
        }
        Ok(merge.finish())
    }
}
