/// Fragment scoring — trait gating, affinity bonuses and relationship
/// multipliers, with a human-readable explanation of every step.

use std::collections::{HashMap, HashSet};

use crate::core::relationships::RelationshipStore;
use crate::schema::character::Character;
use crate::schema::fragment::DialogueFragment;

/// Score every valid fragment starts from.
pub const BASE_SCORE: f32 = 1.0;
/// Sentinel score of a fragment that failed a hard requirement.
pub const INVALID_SCORE: f32 = -1.0;

/// Everything a fragment is scored against. Built fresh per call.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub speaker: &'a Character,
    pub target: Option<&'a Character>,
    pub relationships: &'a RelationshipStore,
}

impl<'a> ScoringContext<'a> {
    pub fn new(speaker: &'a Character, target: Option<&'a Character>, relationships: &'a RelationshipStore) -> Self {
        Self {
            speaker,
            target,
            relationships,
        }
    }

    fn cache_key(&self, fragment_id: &str) -> ScoreKey {
        (
            fragment_id.to_string(),
            self.speaker.id.clone(),
            self.target.map(|t| t.id.clone()).unwrap_or_default(),
        )
    }
}

/// A score plus the reasoning that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringResult {
    pub score: f32,
    pub explanation: String,
}

impl ScoringResult {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            explanation: String::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.score >= 0.0
    }

    /// Append one line to the explanation.
    pub fn note(&mut self, line: impl AsRef<str>) {
        if !self.explanation.is_empty() {
            self.explanation.push('\n');
        }
        self.explanation.push_str(line.as_ref());
    }

    pub fn mark_invalid(&mut self, reason: impl AsRef<str>) {
        self.score = INVALID_SCORE;
        self.note(format!("INVALID: {}", reason.as_ref()));
    }
}

type ScoreKey = (String, String, String);

/// Scores fragments and memoizes results by (fragment, speaker, target).
///
/// The cache is never invalidated on its own: relationship changes are
/// not observed, so callers clear it according to their own policy.
#[derive(Debug, Default)]
pub struct FragmentScorer {
    cache: HashMap<ScoreKey, ScoringResult>,
}

impl FragmentScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&mut self, fragment: &DialogueFragment, ctx: &ScoringContext<'_>) -> ScoringResult {
        let key = ctx.cache_key(&fragment.id);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let result = compute_score(fragment, ctx);
        self.cache.insert(key, result.clone());
        result
    }

    /// Score each fragment in order. Results line up with the input.
    /// A fragment whose id already appeared earlier in the batch is scored
    /// fresh, so it never reuses another fragment's cached result.
    pub fn score_batch(&mut self, fragments: &[DialogueFragment], ctx: &ScoringContext<'_>) -> Vec<ScoringResult> {
        let mut seen = HashSet::new();
        fragments
            .iter()
            .map(|f| {
                if seen.insert(f.id.as_str()) {
                    self.score(f, ctx)
                } else {
                    compute_score(f, ctx)
                }
            })
            .collect()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn compute_score(fragment: &DialogueFragment, ctx: &ScoringContext<'_>) -> ScoringResult {
    let speaker = ctx.speaker;
    let mut result = ScoringResult::new(BASE_SCORE);
    result.note(format!(
        "Scoring '{}' for speaker '{}'{}",
        fragment.id,
        speaker.id,
        ctx.target
            .map(|t| format!(" -> target '{}'", t.id))
            .unwrap_or_default()
    ));

    for required in &fragment.required_traits {
        if !speaker.has_trait(required) {
            result.mark_invalid(format!("speaker lacks required trait '{}'", required));
            return result;
        }
    }

    for forbidden in &fragment.forbidden_traits {
        if speaker.has_trait(forbidden) {
            result.mark_invalid(format!("speaker has forbidden trait '{}'", forbidden));
            return result;
        }
    }

    result.note(format!("base score {:.2}", BASE_SCORE));

    // Sorted so the explanation reads the same on every run.
    let mut affinities: Vec<(&String, &f32)> = fragment.trait_affinities.iter().collect();
    affinities.sort_by(|a, b| a.0.cmp(b.0));
    for (trait_id, weight) in affinities {
        if speaker.has_trait(trait_id) {
            let before = result.score;
            result.score += weight;
            let line = format!(
                "trait affinity '{}' {:+.2}: {:.2} -> {:.2}",
                trait_id, weight, before, result.score
            );
            result.note(line);
        }
    }

    if let Some(target) = ctx.target {
        for modifier in &fragment.relationship_modifiers {
            let value = ctx
                .relationships
                .get_relationship(&speaker.id, &target.id, &modifier.relationship_type);
            if value >= modifier.threshold {
                let before = result.score;
                result.score *= modifier.multiplier;
                let line = format!(
                    "relationship '{}' {:.1} >= {:.1}, x{:.2}: {:.2} -> {:.2}",
                    modifier.relationship_type,
                    value,
                    modifier.threshold,
                    modifier.multiplier,
                    before,
                    result.score
                );
                result.note(line);
            }
        }
    }

    result.note(format!("final score {:.2}", result.score));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(traits: &[&str]) -> Character {
        Character::new("alice", "Alice").with_traits(traits)
    }

    #[test]
    fn base_score_without_modifiers() {
        let store = RelationshipStore::default();
        let alice = speaker(&[]);
        let ctx = ScoringContext::new(&alice, None, &store);
        let result = FragmentScorer::new().score(&DialogueFragment::new("f", "hi"), &ctx);
        assert_eq!(result.score, BASE_SCORE);
        assert!(result.is_valid());
    }

    #[test]
    fn missing_required_trait_invalidates() {
        let store = RelationshipStore::default();
        let alice = speaker(&["kind"]);
        let fragment = DialogueFragment::new("f", "hi")
            .requires("brave")
            .affinity("kind", 10.0);
        let ctx = ScoringContext::new(&alice, None, &store);
        let result = FragmentScorer::new().score(&fragment, &ctx);
        assert!(!result.is_valid());
        assert_eq!(result.score, INVALID_SCORE);
        assert!(result.explanation.contains("brave"));
        // Short-circuited before affinities were considered.
        assert!(!result.explanation.contains("affinity"));
    }

    #[test]
    fn forbidden_trait_invalidates_regardless_of_bonuses() {
        let store = RelationshipStore::default();
        let alice = speaker(&["rude", "witty"]);
        let bob = Character::new("bob", "Bob");
        store.set_relationship("alice", "bob", "trust", 100.0);
        let fragment = DialogueFragment::new("f", "hi")
            .forbids("rude")
            .affinity("witty", 5.0)
            .relationship_modifier("trust", 0.0, 3.0);
        let ctx = ScoringContext::new(&alice, Some(&bob), &store);
        let result = FragmentScorer::new().score(&fragment, &ctx);
        assert!(!result.is_valid());
        assert!(result.explanation.contains("rude"));
    }

    #[test]
    fn affinity_is_additive_and_monotonic() {
        let store = RelationshipStore::default();
        let fragment = DialogueFragment::new("f", "hi")
            .affinity("witty", 0.5)
            .affinity("warm", 0.25);
        let with = speaker(&["witty", "warm"]);
        let without = speaker(&["warm"]);
        let mut scorer = FragmentScorer::new();
        let a = scorer.score(&fragment, &ScoringContext::new(&with, None, &store));
        scorer.clear_cache();
        let b = scorer.score(&fragment, &ScoringContext::new(&without, None, &store));
        assert!((a.score - 1.75).abs() < 1e-6);
        assert!((b.score - 1.25).abs() < 1e-6);
        assert!(a.score > b.score);
    }

    #[test]
    fn relationship_modifier_multiplies_when_threshold_met() {
        let store = RelationshipStore::default();
        let alice = speaker(&["witty"]);
        let bob = Character::new("bob", "Bob");
        store.set_relationship("alice", "bob", "friendship", 75.0);
        let fragment = DialogueFragment::new("f", "hi")
            .affinity("witty", 1.0)
            .relationship_modifier("friendship", 70.0, 2.0)
            .relationship_modifier("rivalry", 60.0, 10.0);
        let ctx = ScoringContext::new(&alice, Some(&bob), &store);
        let result = FragmentScorer::new().score(&fragment, &ctx);
        // (1 + 1) * 2; rivalry reads the default 50 and is skipped.
        assert!((result.score - 4.0).abs() < 1e-6);
        assert!(result.explanation.contains("friendship"));
        assert!(!result.explanation.contains("rivalry"));
    }

    #[test]
    fn relationship_modifiers_ignored_without_target() {
        let store = RelationshipStore::default();
        let alice = speaker(&[]);
        let fragment = DialogueFragment::new("f", "hi").relationship_modifier("trust", 0.0, 5.0);
        let ctx = ScoringContext::new(&alice, None, &store);
        assert_eq!(FragmentScorer::new().score(&fragment, &ctx).score, BASE_SCORE);
    }

    #[test]
    fn results_are_cached_until_cleared() {
        let store = RelationshipStore::default();
        let alice = speaker(&[]);
        let bob = Character::new("bob", "Bob");
        let fragment = DialogueFragment::new("f", "hi").relationship_modifier("trust", 60.0, 2.0);
        let mut scorer = FragmentScorer::new();

        let first = scorer.score(&fragment, &ScoringContext::new(&alice, Some(&bob), &store));
        assert_eq!(first.score, 1.0);
        assert_eq!(scorer.cache_len(), 1);

        store.set_relationship("alice", "bob", "trust", 90.0);
        let stale = scorer.score(&fragment, &ScoringContext::new(&alice, Some(&bob), &store));
        assert_eq!(stale.score, 1.0);

        scorer.clear_cache();
        let fresh = scorer.score(&fragment, &ScoringContext::new(&alice, Some(&bob), &store));
        assert_eq!(fresh.score, 2.0);
    }

    #[test]
    fn cache_key_includes_target() {
        let store = RelationshipStore::default();
        let alice = speaker(&[]);
        let bob = Character::new("bob", "Bob");
        let fragment = DialogueFragment::new("f", "hi");
        let mut scorer = FragmentScorer::new();
        scorer.score(&fragment, &ScoringContext::new(&alice, None, &store));
        scorer.score(&fragment, &ScoringContext::new(&alice, Some(&bob), &store));
        assert_eq!(scorer.cache_len(), 2);
    }

    #[test]
    fn batch_preserves_order() {
        let store = RelationshipStore::default();
        let alice = speaker(&["witty"]);
        let fragments = vec![
            DialogueFragment::new("a", "a").affinity("witty", 2.0),
            DialogueFragment::new("b", "b").requires("brave"),
            DialogueFragment::new("c", "c"),
        ];
        let ctx = ScoringContext::new(&alice, None, &store);
        let results = FragmentScorer::new().score_batch(&fragments, &ctx);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].score, 3.0);
        assert!(!results[1].is_valid());
        assert_eq!(results[2].score, 1.0);
    }

    #[test]
    fn repeated_ids_in_a_batch_are_scored_separately() {
        let store = RelationshipStore::default();
        let alice = speaker(&["kind"]);
        let fragments = vec![
            DialogueFragment::new("dup", "hi").requires("brave"),
            DialogueFragment::new("dup", "hello").affinity("kind", 2.0),
        ];
        let ctx = ScoringContext::new(&alice, None, &store);
        let mut scorer = FragmentScorer::new();
        for _ in 0..2 {
            let results = scorer.score_batch(&fragments, &ctx);
            assert!(!results[0].is_valid());
            assert!((results[1].score - 3.0).abs() < 1e-6);
        }
        assert_eq!(scorer.cache_len(), 1);
    }

    #[test]
    fn mark_invalid_sets_sentinel() {
        let mut r = ScoringResult::new(5.0);
        r.mark_invalid("nope");
        assert_eq!(r.score, INVALID_SCORE);
        assert!(r.explanation.contains("nope"));
    }
}
