/// Scene orchestrator — the beat-graph state machine.
///
/// Idle until `start_scene` succeeds, Active while a beat is current, and
/// back to Idle on `end_scene` or when no branch can be taken.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::casting::Cast;
use crate::core::relationships::RelationshipStore;
use crate::core::scene_context::SceneContext;
use crate::schema::character::Character;
use crate::schema::event::{DialogueEvent, EventSink};
use crate::schema::scene::{BeatBranch, BranchCondition, SceneBeat, SceneTemplate};

/// Everything a branch condition may look at.
pub struct ConditionEnv<'a> {
    pub cast: &'a Cast,
    pub relationships: &'a RelationshipStore,
    pub context: &'a SceneContext,
    pub visited: &'a HashSet<String>,
}

impl ConditionEnv<'_> {
    fn role(&self, role: &str) -> Option<&Character> {
        let found = self.cast.get(role);
        if found.is_none() {
            tracing::debug!(role, "condition names a role missing from the cast");
        }
        found
    }

    fn relationship(&self, from_role: &str, to_role: &str, relationship_type: &str) -> Option<f32> {
        let from = self.role(from_role)?;
        let to = self.role(to_role)?;
        Some(self.relationships.get_relationship(&from.id, &to.id, relationship_type))
    }

    pub fn evaluate(&self, condition: &BranchCondition) -> bool {
        match condition {
            BranchCondition::RelationshipAtLeast {
                from_role,
                to_role,
                relationship_type,
                threshold,
            } => self
                .relationship(from_role, to_role, relationship_type)
                .is_some_and(|v| v >= *threshold),
            BranchCondition::RelationshipBelow {
                from_role,
                to_role,
                relationship_type,
                threshold,
            } => self
                .relationship(from_role, to_role, relationship_type)
                .is_some_and(|v| v < *threshold),
            BranchCondition::RoleHasTrait { role, trait_id } => {
                self.role(role).is_some_and(|c| c.has_trait(trait_id))
            }
            BranchCondition::RoleLacksTrait { role, trait_id } => {
                self.role(role).is_some_and(|c| !c.has_trait(trait_id))
            }
            BranchCondition::ContextFlag { key, expected } => {
                self.context.get_or(key, false) == *expected
            }
            BranchCondition::ContextCompare { key, comparison, value } => self
                .context
                .get(key)
                .and_then(|v| v.as_f64())
                .is_some_and(|current| comparison.holds(current, *value)),
            BranchCondition::BeatVisited { beat_id } => self.visited.contains(beat_id),
            BranchCondition::BeatNotVisited { beat_id } => !self.visited.contains(beat_id),
        }
    }

    /// All conditions hold (short-circuits); an empty list always holds.
    pub fn branch_matches(&self, branch: &BeatBranch) -> bool {
        branch.conditions.iter().all(|c| self.evaluate(c))
    }

    /// First branch, in declared order, whose conditions hold.
    pub fn select_branch<'b>(&self, branches: &'b [BeatBranch]) -> Option<&'b BeatBranch> {
        branches.iter().find(|b| self.branch_matches(b))
    }
}

struct ActiveScene {
    template: SceneTemplate,
    cast: Cast,
    current_beat: String,
    visited: HashSet<String>,
}

pub struct SceneOrchestrator {
    relationships: Arc<RelationshipStore>,
    context: Arc<SceneContext>,
    events: Arc<dyn EventSink>,
    active: Option<ActiveScene>,
}

impl SceneOrchestrator {
    pub fn new(relationships: Arc<RelationshipStore>, context: Arc<SceneContext>, events: Arc<dyn EventSink>) -> Self {
        Self {
            relationships,
            context,
            events,
            active: None,
        }
    }

    pub fn start_scene(&mut self, template: &SceneTemplate, cast: Cast) -> bool {
        if cast.is_empty() {
            tracing::error!(scene = %template.id, "cannot start scene with an empty cast");
            self.active = None;
            return false;
        }
        if template.starting_beat.is_empty() {
            tracing::error!(scene = %template.id, "scene has no starting beat");
            self.active = None;
            return false;
        }
        if !template.beats.contains_key(&template.starting_beat) {
            tracing::error!(
                scene = %template.id,
                beat = %template.starting_beat,
                "starting beat not found in scene"
            );
            self.active = None;
            return false;
        }
        if let Some(previous) = &self.active {
            tracing::warn!(
                previous = %previous.template.id,
                next = %template.id,
                "starting a scene while another is active; replacing it"
            );
        }

        let mut cast_pairs: Vec<(String, String)> = cast
            .iter()
            .map(|(role, character)| (role.clone(), character.id.clone()))
            .collect();
        cast_pairs.sort();

        let starting = template.starting_beat.clone();
        self.active = Some(ActiveScene {
            template: template.clone(),
            cast,
            current_beat: starting.clone(),
            visited: HashSet::from([starting.clone()]),
        });

        tracing::info!(scene = %template.id, beat = %starting, "scene started");
        self.events.publish(DialogueEvent::SceneCast {
            scene_id: template.id.clone(),
            cast: cast_pairs,
        });
        true
    }

    pub fn is_scene_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_scene(&self) -> Option<&SceneTemplate> {
        self.active.as_ref().map(|a| &a.template)
    }

    pub fn current_cast(&self) -> Option<&Cast> {
        self.active.as_ref().map(|a| &a.cast)
    }

    pub fn cast_member(&self, role: &str) -> Option<&Character> {
        self.active.as_ref().and_then(|a| a.cast.get(role))
    }

    pub fn current_beat_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.current_beat.as_str())
    }

    pub fn current_beat(&self) -> Option<&SceneBeat> {
        let Some(active) = &self.active else {
            tracing::warn!("no active scene");
            return None;
        };
        let beat = active.template.beat(&active.current_beat);
        if beat.is_none() {
            tracing::error!(
                scene = %active.template.id,
                beat = %active.current_beat,
                "current beat id not found in scene"
            );
        }
        beat
    }

    pub fn has_visited(&self, beat_id: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.visited.contains(beat_id))
    }

    /// Visited beat ids, sorted.
    pub fn visited_beats(&self) -> Vec<String> {
        let mut visited: Vec<String> = self
            .active
            .as_ref()
            .map(|a| a.visited.iter().cloned().collect())
            .unwrap_or_default();
        visited.sort();
        visited
    }

    /// Move to the target of the first branch whose conditions hold.
    /// Returns false, and ends the scene, when the current beat has no
    /// branches or none of them match.
    ///
    /// Only branches drive advancement; `default_next_beat` and
    /// `is_end_beat` are not consulted here.
    pub fn advance_to_next_beat(&mut self) -> bool {
        let next = {
            let Some(active) = &self.active else {
                tracing::warn!("advance requested with no active scene");
                return false;
            };
            let Some(beat) = active.template.beat(&active.current_beat) else {
                tracing::error!(beat = %active.current_beat, "current beat id not found in scene");
                self.end_scene();
                return false;
            };
            if beat.branches.is_empty() {
                tracing::info!(beat = %beat.id, "beat has no branches, scene complete");
                None
            } else {
                let env = ConditionEnv {
                    cast: &active.cast,
                    relationships: &self.relationships,
                    context: &self.context,
                    visited: &active.visited,
                };
                let chosen = env.select_branch(&beat.branches).map(|b| b.target_beat.clone());
                if chosen.is_none() {
                    tracing::warn!(beat = %beat.id, "no branch conditions satisfied");
                }
                chosen
            }
        };

        let Some(next) = next else {
            self.end_scene();
            return false;
        };

        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let from_beat = std::mem::replace(&mut active.current_beat, next.clone());
        active.visited.insert(next.clone());
        tracing::info!(scene = %active.template.id, from = %from_beat, to = %next, "advanced to beat");
        self.events.publish(DialogueEvent::BeatAdvanced {
            scene_id: active.template.id.clone(),
            from_beat,
            to_beat: next,
        });
        true
    }

    /// Clear all active-scene state. Safe to call when idle.
    pub fn end_scene(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(scene = %active.template.id, "scene ended");
            self.events.publish(DialogueEvent::SceneEnded {
                scene_id: active.template.id,
            });
        }
    }
}
