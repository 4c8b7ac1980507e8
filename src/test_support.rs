use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use topn_extract::{ItemId, ScoredItem, TopResult};

#[derive(Debug, Clone)]
pub struct GeneratedTable {
    pub items: Vec<ScoredItem>,
    #[allow(dead_code)]
    pub sources: usize,
}

/// Shape of the generated log-probabilities.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreProfile {
    /// Uniform in `[-20, 0)`.
    Continuous,
    /// A handful of levels, so equal scores straddle the top-N boundary.
    TieHeavy,
    /// Signed zeros and scores far below `ln(f32::MIN_POSITIVE)`, which all
    /// map to the same `f32` probability.
    Collapsing,
}

impl ScoreProfile {
    fn draw(self, rng: &mut StdRng) -> f32 {
        match self {
            ScoreProfile::Continuous => rng.random_range(-20.0f32..0.0),
            ScoreProfile::TieHeavy => -(rng.random_range(0..8) as f32) * 0.5,
            ScoreProfile::Collapsing => match rng.random_range(0..8) {
                0 => 0.0,
                1 => -0.0,
                2 => f32::NEG_INFINITY,
                3 | 4 => -110.0 - (rng.random_range(0..4) as f32) * 10.0,
                _ => rng.random_range(-200.0f32..-105.0),
            },
        }
    }
}

/// Random score table: `count` items with `sources` log-probability slots each.
pub fn generate_table(count: u32, sources: usize, profile: ScoreProfile, seed: u64) -> GeneratedTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut items = Vec::with_capacity(count as usize);
    for id in 0..count {
        let scores = (0..sources).map(|_| profile.draw(&mut rng)).collect();
        items.push(ScoredItem::new(id * 3 + 1, scores));
    }
    GeneratedTable { items, sources }
}

/// Unbounded reference: sort everything on the log scale and keep the first `n`.
#[allow(dead_code)]
pub fn reference_top_n(items: &[ScoredItem], slot: usize, n: usize) -> Vec<TopResult> {
    let mut all: Vec<(f32, ItemId)> = items
        .iter()
        .map(|item| {
            let logged = item.scores[slot];
            (if logged == 0.0 { 0.0 } else { logged }, item.id)
        })
        .collect();
    all.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    all.truncate(n);
    all.into_iter()
        .map(|(logged, id)| TopResult {
            id,
            probability: topn_extract::log_to_probability(logged),
        })
        .collect()
}

#[allow(dead_code)]
pub fn ids(results: &[TopResult]) -> Vec<ItemId> {
    results.iter().map(|r| r.id).collect()
}
