//! # Shuffle
//!
//! In-process stand-in for the execution substrate's key-grouped routing:
//! candidates from every partition are grouped by item id and handed to the
//! single merge stage over a bounded channel.
//!
//! ```text
//!  Partition 0   Partition 1   Partition N
//!      │             │             │
//!      └──────┬──────┴──────┬──────┘
//!             ▼             ▼
//!        group by id (FxHashMap)
//!                   │
//!          bounded channel
//!                   ▼
//!             Global Merge
//! ```
//!
//! Delivery order of groups is unspecified (hash order).

use crate::model::{Candidate, ItemId};
use crossbeam_channel::{bounded, Receiver, Sender};
use rustc_hash::FxHashMap;

/// Every candidate score delivered for one item id.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub id: ItemId,
    pub scores: Vec<f32>,
}

impl CandidateGroup {
    pub fn single(id: ItemId, score: f32) -> Self {
        Self {
            id,
            scores: vec![score],
        }
    }
}

/// Group partition outputs by item id.
pub fn group_by_id<I>(partition_outputs: I) -> Vec<CandidateGroup>
where
    I: IntoIterator<Item = Vec<Candidate>>,
{
    let mut groups: FxHashMap<ItemId, Vec<f32>> = FxHashMap::default();
    for output in partition_outputs {
        for candidate in output {
            groups.entry(candidate.id).or_default().push(candidate.score);
        }
    }
    groups
        .into_iter()
        .map(|(id, scores)| CandidateGroup { id, scores })
        .collect()
}

/// Channel between the shuffle and the merge stage.
pub fn merge_channel(capacity: usize) -> (Sender<CandidateGroup>, Receiver<CandidateGroup>) {
    bounded(capacity.max(1))
}

/// Push groups into the merge channel. Stops early, returning the number
/// sent, once the merge side has hung up.
pub fn deliver(groups: Vec<CandidateGroup>, tx: Sender<CandidateGroup>) -> usize {
    let mut sent = 0;
    for group in groups {
        if tx.send(group).is_err() {
            break;
        }
        sent += 1;
    }
    sent
}
