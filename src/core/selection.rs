/// Selection — recency tracking and the strategies that pick one fragment
/// from a scored candidate set.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::scoring::ScoringResult;
use crate::schema::fragment::DialogueFragment;

pub const DEFAULT_RECENCY_WINDOW: usize = 5;
pub const DEFAULT_RECENCY_PENALTY: f32 = 0.5;

/// Usage history plus the seeded random source shared by every
/// randomized selection decision.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    use_counts: FxHashMap<String, u32>,
    recent: VecDeque<String>,
    recency_window: usize,
    rng: StdRng,
}

impl SelectionContext {
    /// A `seed` of 0 draws the generator from OS entropy; pass a nonzero
    /// seed for reproducible runs.
    pub fn new(recency_window: usize, seed: u64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Self {
            use_counts: FxHashMap::default(),
            recent: VecDeque::with_capacity(recency_window + 1),
            recency_window,
            rng,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(DEFAULT_RECENCY_WINDOW, seed)
    }

    pub fn mark_used(&mut self, content_id: &str) {
        *self.use_counts.entry(content_id.to_string()).or_insert(0) += 1;
        self.recent.push_back(content_id.to_string());
        while self.recent.len() > self.recency_window {
            self.recent.pop_front();
        }
    }

    pub fn is_recent(&self, content_id: &str) -> bool {
        self.recent.iter().any(|id| id == content_id)
    }

    pub fn use_count(&self, content_id: &str) -> u32 {
        self.use_counts.get(content_id).copied().unwrap_or(0)
    }

    /// Recently used ids, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    pub fn recency_window(&self) -> usize {
        self.recency_window
    }

    /// Forget usage history. The random source keeps its state.
    pub fn reset(&mut self) {
        self.use_counts.clear();
        self.recent.clear();
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// A fragment paired with its (valid) scoring result.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub fragment: &'a DialogueFragment,
    pub result: &'a ScoringResult,
}

impl<'a> ScoredCandidate<'a> {
    pub fn new(fragment: &'a DialogueFragment, result: &'a ScoringResult) -> Self {
        Self { fragment, result }
    }

    pub fn score(&self) -> f32 {
        self.result.score
    }
}

/// Policy choosing one fragment from pre-filtered, valid candidates.
/// Returns `None` only when `candidates` is empty.
pub trait SelectionStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn select<'a>(
        &self,
        candidates: &[ScoredCandidate<'a>],
        ctx: &mut SelectionContext,
    ) -> Option<&'a DialogueFragment>;
}

/// Built-in strategies, nameable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StrategyKind {
    WeightedRandom,
    HighestScore,
    LeastRecent,
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::WeightedRandom
    }
}

impl StrategyKind {
    pub fn build(&self, recency_penalty: f32) -> Box<dyn SelectionStrategy> {
        match self {
            Self::WeightedRandom => Box::new(WeightedRandomStrategy::new(recency_penalty)),
            Self::HighestScore => Box::new(HighestScoreStrategy),
            Self::LeastRecent => Box::new(LeastRecentStrategy),
        }
    }
}

/// First candidate with the maximum score; earlier candidates win ties.
fn highest<'a, 'c>(candidates: impl Iterator<Item = &'c ScoredCandidate<'a>>) -> Option<&'a DialogueFragment>
where
    'a: 'c,
{
    let mut best: Option<&ScoredCandidate<'a>> = None;
    for candidate in candidates {
        match best {
            Some(b) if candidate.score() <= b.score() => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|c| c.fragment)
}

/// Deterministic argmax. Ties go to the earliest candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighestScoreStrategy;

impl SelectionStrategy for HighestScoreStrategy {
    fn name(&self) -> &str {
        "highest_score"
    }

    fn select<'a>(
        &self,
        candidates: &[ScoredCandidate<'a>],
        _ctx: &mut SelectionContext,
    ) -> Option<&'a DialogueFragment> {
        highest(candidates.iter())
    }
}

/// Highest score among candidates not recently used; when every candidate
/// is recent, highest score overall.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecentStrategy;

impl SelectionStrategy for LeastRecentStrategy {
    fn name(&self) -> &str {
        "least_recent"
    }

    fn select<'a>(
        &self,
        candidates: &[ScoredCandidate<'a>],
        ctx: &mut SelectionContext,
    ) -> Option<&'a DialogueFragment> {
        let fresh = highest(candidates.iter().filter(|c| !ctx.is_recent(&c.fragment.id)));
        fresh.or_else(|| highest(candidates.iter()))
    }
}

/// Score-proportional sampling. Recently used candidates have their weight
/// multiplied by `recency_penalty`.
#[derive(Debug, Clone, Copy)]
pub struct WeightedRandomStrategy {
    pub recency_penalty: f32,
}

impl Default for WeightedRandomStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RECENCY_PENALTY)
    }
}

impl WeightedRandomStrategy {
    pub fn new(recency_penalty: f32) -> Self {
        Self { recency_penalty }
    }
}

impl SelectionStrategy for WeightedRandomStrategy {
    fn name(&self) -> &str {
        "weighted_random"
    }

    fn select<'a>(
        &self,
        candidates: &[ScoredCandidate<'a>],
        ctx: &mut SelectionContext,
    ) -> Option<&'a DialogueFragment> {
        let first = candidates.first()?;

        let weights: Vec<f32> = candidates
            .iter()
            .map(|c| {
                let w = c.score().max(0.0);
                if ctx.is_recent(&c.fragment.id) {
                    w * self.recency_penalty
                } else {
                    w
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();

        if total <= 0.0 || !total.is_finite() {
            // Nothing to weigh by; fall back to the first candidate.
            return Some(first.fragment);
        }

        let roll = ctx.rng().gen::<f32>() * total;
        let mut cumulative = 0.0;
        for (candidate, weight) in candidates.iter().zip(&weights) {
            cumulative += weight;
            if roll < cumulative {
                return Some(candidate.fragment);
            }
        }

        // Float rounding can leave roll == total; take the last weighted one.
        candidates
            .iter()
            .zip(&weights)
            .rev()
            .find(|(_, w)| **w > 0.0)
            .map(|(c, _)| c.fragment)
    }
}
