//! # Data Model
//!
//! Records flowing through a round: upstream score rows, per-partition
//! candidates, and the final ranked results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a scored item (a graph node upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the upstream score table.
///
/// `scores[i]` is the natural-log probability of this item for the source at
/// position `i` of the run's source list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub id: ItemId,
    pub scores: Vec<f32>,
}

impl ScoredItem {
    pub fn new(id: u32, scores: Vec<f32>) -> Self {
        Self {
            id: ItemId(id),
            scores,
        }
    }

    /// Score for the given extraction index, if the vector is long enough
    #[inline]
    pub fn score_at(&self, index: usize) -> Option<f32> {
        self.scores.get(index).copied()
    }
}

/// A retained entry emitted by a local selector (log scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ItemId,
    pub score: f32,
}

impl Candidate {
    pub fn new(id: ItemId, score: f32) -> Self {
        Self { id, score }
    }
}

/// A final top-N entry for one source (linear probability scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopResult {
    pub id: ItemId,
    pub probability: f32,
}

/// Round-scoped parameters, built once per source by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundContext {
    /// The source entity this round ranks for
    pub source_id: u32,
    /// Position of the source in the run's list; also the score-vector slot read
    pub iteration_index: usize,
    /// Capacity of both the local and the global ranked sets
    pub capacity: usize,
}

impl RoundContext {
    pub fn new(source_id: u32, iteration_index: usize, capacity: usize) -> Self {
        Self {
            source_id,
            iteration_index,
            capacity,
        }
    }
}
