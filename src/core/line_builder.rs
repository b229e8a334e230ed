/// Dialogue line builder — score, select, assemble, then apply side effects.

use std::sync::Arc;

use crate::core::assembler::TextAssembler;
use crate::core::modifiers::RelationshipModifierApplier;
use crate::core::relationships::RelationshipStore;
use crate::core::scoring::{FragmentScorer, ScoringContext, ScoringResult};
use crate::core::selection::{ScoredCandidate, SelectionContext, SelectionStrategy};
use crate::schema::character::Character;
use crate::schema::event::{DialogueEvent, EventSink};
use crate::schema::fragment::DialogueFragment;

/// A finished line together with what produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltLine {
    pub text: String,
    pub fragment_id: String,
    pub scoring: ScoringResult,
}

pub struct DialogueLineBuilder {
    scorer: FragmentScorer,
    strategy: Box<dyn SelectionStrategy>,
    selection: SelectionContext,
    assembler: TextAssembler,
    modifiers: RelationshipModifierApplier,
    relationships: Arc<RelationshipStore>,
    events: Arc<dyn EventSink>,
}

impl DialogueLineBuilder {
    pub fn new(
        relationships: Arc<RelationshipStore>,
        strategy: Box<dyn SelectionStrategy>,
        selection: SelectionContext,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            scorer: FragmentScorer::new(),
            strategy,
            selection,
            assembler: TextAssembler::new(),
            modifiers: RelationshipModifierApplier::new(relationships.clone()),
            relationships,
            events,
        }
    }

    pub fn build_line(
        &mut self,
        candidates: &[DialogueFragment],
        speaker: Option<&Character>,
        target: Option<&Character>,
        apply_relationship_modifiers: bool,
    ) -> Option<String> {
        self.build_line_with_details(candidates, speaker, target, apply_relationship_modifiers)
            .map(|line| line.text)
    }

    pub fn build_line_with_details(
        &mut self,
        candidates: &[DialogueFragment],
        speaker: Option<&Character>,
        target: Option<&Character>,
        apply_relationship_modifiers: bool,
    ) -> Option<BuiltLine> {
        if candidates.is_empty() {
            tracing::error!("no candidate fragments supplied");
            return None;
        }
        let Some(speaker) = speaker else {
            tracing::error!("cannot build a line without a speaker");
            return None;
        };

        let ctx = ScoringContext::new(speaker, target, &self.relationships);
        let results = self.scorer.score_batch(candidates, &ctx);
        let valid: Vec<ScoredCandidate<'_>> = candidates
            .iter()
            .zip(results.iter())
            .filter(|(_, result)| result.is_valid())
            .map(|(fragment, result)| ScoredCandidate::new(fragment, result))
            .collect();

        if valid.is_empty() {
            tracing::warn!(
                speaker = %speaker.id,
                candidates = candidates.len(),
                "no valid fragments for speaker"
            );
            return None;
        }

        let fragment = self.strategy.select(&valid, &mut self.selection)?;
        let scoring = valid
            .iter()
            .find(|c| std::ptr::eq(c.fragment, fragment))
            .map(|c| c.result.clone())?;
        self.selection.mark_used(&fragment.id);

        let text = self.assembler.assemble(&fragment.text, speaker, target);
        tracing::debug!(
            fragment = %fragment.id,
            speaker = %speaker.id,
            strategy = self.strategy.name(),
            score = scoring.score,
            "fragment selected"
        );

        if apply_relationship_modifiers {
            match target {
                Some(target) => self.modifiers.apply_modifiers(fragment, speaker, target),
                None if !fragment.relationship_modifiers.is_empty() => {
                    tracing::debug!(fragment = %fragment.id, "no target, relationship modifiers skipped");
                }
                None => {}
            }
        }

        self.events.publish(DialogueEvent::LinePrepared {
            fragment_id: fragment.id.clone(),
            speaker_id: speaker.id.clone(),
            target_id: target.map(|t| t.id.clone()),
            text: text.clone(),
            score: scoring.score,
        });

        Some(BuiltLine {
            text,
            fragment_id: fragment.id.clone(),
            scoring,
        })
    }

    pub fn assembler(&self) -> &TextAssembler {
        &self.assembler
    }

    pub fn assembler_mut(&mut self) -> &mut TextAssembler {
        &mut self.assembler
    }

    pub fn selection(&self) -> &SelectionContext {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionContext {
        &mut self.selection
    }

    pub fn scorer_mut(&mut self) -> &mut FragmentScorer {
        &mut self.scorer
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn set_strategy(&mut self, strategy: Box<dyn SelectionStrategy>) {
        self.strategy = strategy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::{HighestScoreStrategy, WeightedRandomStrategy};
    use crate::schema::character::Pronouns;
    use crate::schema::event::{EventLog, NullEventSink};

    fn builder(store: Arc<RelationshipStore>) -> DialogueLineBuilder {
        DialogueLineBuilder::new(
            store,
            Box::new(HighestScoreStrategy),
            SelectionContext::with_seed(42),
            Arc::new(NullEventSink),
        )
    }

    fn knight() -> Character {
        Character::new("k", "Kay").with_pronouns(Pronouns::HeHim).with_traits(&["loyal"])
    }

    #[test]
    fn required_trait_missing_yields_no_line() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        let fragments = vec![DialogueFragment::new("charge", "Charge!").requires("brave")];
        assert_eq!(b.build_line(&fragments, Some(&knight()), None, true), None);
    }

    #[test]
    fn duplicate_ids_report_the_chosen_fragment() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        let fragments = vec![
            DialogueFragment::new("greet", "Charge!").requires("brave"),
            DialogueFragment::new("greet", "At your service.").affinity("loyal", 1.5),
        ];
        let line = b
            .build_line_with_details(&fragments, Some(&knight()), None, false)
            .unwrap();
        assert_eq!(line.text, "At your service.");
        assert!(line.scoring.is_valid());
        assert!((line.scoring.score - 2.5).abs() < 1e-6);
        assert!(line.scoring.explanation.contains("loyal"));
    }

    #[test]
    fn strategy_can_be_swapped() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        assert_eq!(b.strategy_name(), "highest_score");
        b.set_strategy(Box::new(WeightedRandomStrategy::default()));
        assert_eq!(b.strategy_name(), "weighted_random");
        let fragments = vec![DialogueFragment::new("only", "Hello.")];
        let line = b.build_line(&fragments, Some(&knight()), None, false).unwrap();
        assert_eq!(line, "Hello.");
    }

    #[test]
    fn missing_speaker_or_candidates() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        let fragments = vec![DialogueFragment::new("a", "Hello.")];
        assert_eq!(b.build_line(&fragments, None, None, false), None);
        assert_eq!(b.build_line(&[], Some(&knight()), None, false), None);
    }

    #[test]
    fn picks_best_and_assembles() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        let target = Character::new("g", "Gawain").with_pronouns(Pronouns::HeHim);
        let fragments = vec![
            DialogueFragment::new("plain", "Good day."),
            DialogueFragment::new("loyal", "{speaker.name} bows to {target.name}.").affinity("loyal", 2.0),
        ];
        let line = b
            .build_line_with_details(&fragments, Some(&knight()), Some(&target), false)
            .unwrap();
        assert_eq!(line.fragment_id, "loyal");
        assert_eq!(line.text, "Kay bows to Gawain.");
        assert!(line.scoring.score > 1.0);
        assert!(b.selection().is_recent("loyal"));
        assert_eq!(b.selection().use_count("loyal"), 1);
    }

    #[test]
    fn applies_relationship_modifiers_only_when_asked() {
        let store = Arc::new(RelationshipStore::default());
        let mut b = builder(store.clone());
        let target = Character::new("g", "Gawain");
        let fragments = vec![DialogueFragment::new("praise", "Well fought.").relationship_modifier("respect", 0.0, 1.2)];

        b.build_line(&fragments, Some(&knight()), Some(&target), false);
        assert_eq!(store.get_relationship("k", "g", "respect"), 50.0);

        b.build_line(&fragments, Some(&knight()), Some(&target), true);
        assert!((store.get_relationship("k", "g", "respect") - 60.0).abs() < 1e-4);
    }

    #[test]
    fn modifiers_without_target_are_skipped() {
        let store = Arc::new(RelationshipStore::default());
        let mut b = builder(store.clone());
        let fragments = vec![DialogueFragment::new("praise", "Well fought.").relationship_modifier("respect", 0.0, 1.2)];
        assert_eq!(
            b.build_line(&fragments, Some(&knight()), None, true).as_deref(),
            Some("Well fought.")
        );
        assert!(store.relationships_from("k").is_empty());
    }

    #[test]
    fn publishes_line_prepared() {
        let log = Arc::new(EventLog::new());
        let mut b = DialogueLineBuilder::new(
            Arc::new(RelationshipStore::default()),
            Box::new(HighestScoreStrategy),
            SelectionContext::with_seed(1),
            log.clone(),
        );
        let fragments = vec![DialogueFragment::new("a", "{speaker.pronoun.Subject} nods.")];
        b.build_line(&fragments, Some(&knight()), None, false);
        assert_eq!(
            log.events(),
            vec![DialogueEvent::LinePrepared {
                fragment_id: "a".to_string(),
                speaker_id: "k".to_string(),
                target_id: None,
                text: "He nods.".to_string(),
                score: 1.0,
            }]
        );
    }

    #[test]
    fn variables_flow_through_assembler() {
        let mut b = builder(Arc::new(RelationshipStore::default()));
        b.assembler_mut().set_variable("place", "Camelot");
        let fragments = vec![DialogueFragment::new("a", "To {var:place}!")];
        assert_eq!(
            b.build_line(&fragments, Some(&knight()), None, false).as_deref(),
            Some("To Camelot!")
        );
    }

    #[test]
    fn weighted_random_is_reproducible() {
        let fragments: Vec<DialogueFragment> = (0..6)
            .map(|i| DialogueFragment::new(format!("f{i}"), format!("line {i}")))
            .collect();
        let run = || {
            let mut b = DialogueLineBuilder::new(
                Arc::new(RelationshipStore::default()),
                Box::new(WeightedRandomStrategy::default()),
                SelectionContext::with_seed(1234),
                Arc::new(NullEventSink),
            );
            (0..20)
                .filter_map(|_| b.build_line(&fragments, Some(&knight()), None, false))
                .collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first.len(), 20);
        assert_eq!(first, run());
    }
}
