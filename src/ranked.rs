//! # Bounded Ranked Set
//!
//! Fixed-capacity container holding the `N` highest-ranked entries seen so far.
//!
//! Entries are ranked by a total order: higher score first, and on equal
//! score the lower item id first. Because the order is total, the retained
//! set never depends on insertion order, which is what lets the merge stage
//! consume candidate groups in whatever order the shuffle delivers them.
//!
//! Scores compare with [`f32::total_cmp`] after folding `-0.0` into `0.0`;
//! callers reject NaN before insertion. Item ids are assumed distinct across
//! insertions into one set.

use crate::model::{Candidate, ItemId};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Ranked {
    score: f32,
    id: ItemId,
}

impl Ranked {
    #[inline]
    fn new(id: ItemId, score: f32) -> Self {
        // total_cmp orders -0.0 below 0.0
        let score = if score == 0.0 { 0.0 } else { score };
        Self { score, id }
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Min-heap of at most `capacity` entries; the root is the weakest retained entry.
#[derive(Debug, Clone)]
pub struct BoundedRankedSet {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl BoundedRankedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // +1 so the push-before-pop path never reallocates
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1 << 16)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Weakest retained entry, the one evicted next
    pub fn min_entry(&self) -> Option<Candidate> {
        self.heap
            .peek()
            .map(|Reverse(entry)| Candidate::new(entry.id, entry.score))
    }

    /// Offer an entry. Returns whether it is retained.
    ///
    /// Below capacity every entry is kept. At capacity the entry replaces the
    /// current minimum only if it strictly outranks it; an equal score with a
    /// higher id is discarded.
    #[inline]
    pub fn insert(&mut self, id: ItemId, score: f32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let entry = Ranked::new(id, score);
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(min)) if entry > *min => {
                self.heap.pop();
                self.heap.push(Reverse(entry));
                true
            }
            _ => false,
        }
    }

    /// Drain all entries, highest score first, ties by ascending id.
    ///
    /// One-shot: the set is empty afterwards and can be reused.
    pub fn extract_all_sorted_descending(&mut self) -> Vec<Candidate> {
        // Ascending order of Reverse<Ranked> is descending rank.
        std::mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(entry)| Candidate::new(entry.id, entry.score))
            .collect()
    }
}
