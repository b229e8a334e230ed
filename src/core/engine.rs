/// The Calliope engine: one place that owns the shared stores and wires
/// casting, orchestration and line building together.
///
/// Built via `Calliope::builder()`.

use std::sync::Arc;
use thiserror::Error;

use crate::config::{CachePolicy, CalliopeConfig, ConfigError};
use crate::core::casting::{Cast, CharacterCaster};
use crate::core::library::{ContentError, ContentLibrary};
use crate::core::line_builder::DialogueLineBuilder;
use crate::core::modifiers::ContextModifierApplier;
use crate::core::orchestrator::SceneOrchestrator;
use crate::core::relationships::RelationshipStore;
use crate::core::scene_context::SceneContext;
use crate::core::selection::SelectionContext;
use crate::schema::character::Character;
use crate::schema::event::{EventSink, NullEventSink};

/// Offset between the selection seed and the caster seed, so the two
/// generators never share a stream.
const CASTER_SEED_OFFSET: u64 = 7919;

#[derive(Debug, Error)]
pub enum CalliopeError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("no content library was provided")]
    MissingLibrary,
}

/// One beat's worth of output.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatLine {
    pub beat_id: String,
    pub speaker_id: String,
    pub target_id: Option<String>,
    pub fragment_id: String,
    pub text: String,
    pub score: f32,
}

pub struct Calliope {
    config: CalliopeConfig,
    library: Arc<dyn ContentLibrary>,
    relationships: Arc<RelationshipStore>,
    context: Arc<SceneContext>,
    caster: CharacterCaster,
    orchestrator: SceneOrchestrator,
    lines: DialogueLineBuilder,
    context_modifiers: ContextModifierApplier,
}

pub struct CalliopeBuilder {
    seed: Option<u64>,
    config: Option<CalliopeConfig>,
    library: Option<Arc<dyn ContentLibrary>>,
    events: Option<Arc<dyn EventSink>>,
}

impl Calliope {
    pub fn builder() -> CalliopeBuilder {
        CalliopeBuilder {
            seed: None,
            config: None,
            library: None,
            events: None,
        }
    }

    pub fn config(&self) -> &CalliopeConfig {
        &self.config
    }

    pub fn library(&self) -> &dyn ContentLibrary {
        self.library.as_ref()
    }

    pub fn relationships(&self) -> &Arc<RelationshipStore> {
        &self.relationships
    }

    pub fn scene_context(&self) -> &Arc<SceneContext> {
        &self.context
    }

    pub fn orchestrator(&self) -> &SceneOrchestrator {
        &self.orchestrator
    }

    pub fn line_builder_mut(&mut self) -> &mut DialogueLineBuilder {
        &mut self.lines
    }

    /// Set a `{var:key}` value for every subsequent line.
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.lines.assembler_mut().set_variable(key, value);
    }

    /// Cast the named template's roles from `characters`.
    pub fn cast_scene(&mut self, template_id: &str, characters: &[Character]) -> Option<Cast> {
        let Some(template) = self.library.scene_template(template_id) else {
            tracing::error!(scene = template_id, "unknown scene template");
            return None;
        };
        self.caster.cast_scene(&template.roles, characters)
    }

    pub fn start_scene(&mut self, template_id: &str, cast: Cast) -> bool {
        let Some(template) = self.library.scene_template(template_id) else {
            tracing::error!(scene = template_id, "unknown scene template");
            return false;
        };
        let started = self.orchestrator.start_scene(template, cast);
        if started && self.config.scoring.cache_policy != CachePolicy::Keep {
            self.lines.scorer_mut().clear_cache();
        }
        started
    }

    pub fn cast_and_start(&mut self, template_id: &str, characters: &[Character]) -> bool {
        match self.cast_scene(template_id, characters) {
            Some(cast) => self.start_scene(template_id, cast),
            None => false,
        }
    }

    /// Build the line for the current beat: resolve its speaker and target
    /// roles, draw from its variation set, apply the chosen fragment's
    /// side effects and record the visit in the scene context.
    pub fn play_current_beat(&mut self) -> Option<BeatLine> {
        let beat = self.orchestrator.current_beat()?.clone();
        let Some(speaker) = self.orchestrator.cast_member(&beat.speaker_role) else {
            tracing::error!(beat = %beat.id, role = %beat.speaker_role, "speaker role is not cast");
            return None;
        };
        let target = match &beat.target_role {
            Some(role) => {
                let found = self.orchestrator.cast_member(role);
                if found.is_none() {
                    tracing::warn!(beat = %beat.id, role = %role, "target role is not cast, speaking without target");
                }
                found
            }
            None => None,
        };
        let Some(candidates) = self.library.variation_set(&beat.variation_set) else {
            tracing::error!(beat = %beat.id, set = %beat.variation_set, "unknown variation set");
            return None;
        };

        let built = self.lines.build_line_with_details(
            candidates,
            Some(speaker),
            target,
            self.config.lines.apply_relationship_modifiers,
        );

        let Some(built) = built else {
            self.context.mark_beat_visited(&beat.id, None, Some(&speaker.id));
            return None;
        };

        if self.config.lines.apply_context_modifiers {
            if let Some(fragment) = candidates.iter().find(|f| f.id == built.fragment_id) {
                self.context_modifiers.apply_modifiers(fragment, &self.context);
            }
        }
        self.context
            .mark_beat_visited(&beat.id, Some(&built.fragment_id), Some(&speaker.id));

        let line = BeatLine {
            beat_id: beat.id.clone(),
            speaker_id: speaker.id.clone(),
            target_id: target.map(|t| t.id.clone()),
            fragment_id: built.fragment_id,
            text: built.text,
            score: built.scoring.score,
        };

        if self.config.scoring.cache_policy == CachePolicy::ClearPerLine {
            self.lines.scorer_mut().clear_cache();
        }
        Some(line)
    }

    pub fn advance(&mut self) -> bool {
        let advanced = self.orchestrator.advance_to_next_beat();
        if advanced && self.config.scoring.cache_policy == CachePolicy::ClearPerBeat {
            self.lines.scorer_mut().clear_cache();
        }
        advanced
    }

    /// Play and advance until the scene ends or `max_beats` beats have
    /// been played. A scene cut short by the limit is ended.
    pub fn run_scene(&mut self, max_beats: usize) -> Vec<BeatLine> {
        let mut lines = Vec::new();
        let mut played = 0;
        while self.orchestrator.is_scene_active() {
            if played == max_beats {
                tracing::warn!(max_beats, "beat limit reached, ending scene");
                self.orchestrator.end_scene();
                break;
            }
            if let Some(line) = self.play_current_beat() {
                lines.push(line);
            }
            played += 1;
            if !self.advance() {
                break;
            }
        }
        lines
    }

    pub fn end_scene(&mut self) {
        self.orchestrator.end_scene();
    }

    /// Forget everything learned this session: relationships, scene
    /// context, selection history and cached scores.
    pub fn reset_session(&mut self) {
        self.orchestrator.end_scene();
        self.relationships.clear_all_relationships();
        self.context.clear();
        self.lines.selection_mut().reset();
        self.lines.scorer_mut().clear_cache();
        tracing::info!("session reset");
    }
}

impl CalliopeBuilder {
    /// Overrides the config's seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(mut self, config: CalliopeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn library(mut self, library: impl ContentLibrary + 'static) -> Self {
        self.library = Some(Arc::new(library));
        self
    }

    pub fn shared_library(mut self, library: Arc<dyn ContentLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<Calliope, CalliopeError> {
        let library = self.library.ok_or(CalliopeError::MissingLibrary)?;
        let mut config = self.config.unwrap_or_default();
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        let events: Arc<dyn EventSink> = match self.events {
            Some(events) => events,
            None => Arc::new(NullEventSink),
        };

        let relationships = Arc::new(RelationshipStore::new(events.clone()));
        let context = Arc::new(SceneContext::new());

        let caster_seed = if config.seed == 0 {
            0
        } else {
            config.seed.wrapping_add(CASTER_SEED_OFFSET)
        };
        let selection = SelectionContext::new(config.selection.recency_window, config.seed);
        let strategy = config.selection.strategy.build(config.selection.recency_penalty);

        tracing::debug!(
            seed = config.seed,
            strategy = ?config.selection.strategy,
            cache_policy = ?config.scoring.cache_policy,
            "engine built"
        );

        Ok(Calliope {
            caster: CharacterCaster::new(caster_seed),
            orchestrator: SceneOrchestrator::new(relationships.clone(), context.clone(), events.clone()),
            lines: DialogueLineBuilder::new(relationships.clone(), strategy, selection, events),
            context_modifiers: ContextModifierApplier,
            library,
            relationships,
            context,
            config,
        })
    }
}
