/// Post-selection side effects: relationship deltas and scene-context
/// mutations declared by the chosen fragment.

use std::sync::Arc;

use crate::core::relationships::RelationshipStore;
use crate::core::scene_context::SceneContext;
use crate::schema::character::Character;
use crate::schema::fragment::{ContextOperation, DialogueFragment, RelationshipModifier};
use crate::schema::value::Value;

/// Changes smaller than this are not applied.
pub const MIN_RELATIONSHIP_DELTA: f32 = 0.01;

/// A relationship change that has been executed and can be rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipCommand {
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub old_value: f32,
    pub new_value: f32,
}

impl RelationshipCommand {
    /// Write `new_value` (again) to the store.
    pub fn execute(&self, store: &RelationshipStore) {
        store.set_relationship(&self.from, &self.to, &self.relationship_type, self.new_value);
    }

    /// Restore the value seen before the command ran.
    pub fn undo(&self, store: &RelationshipStore) {
        store.set_relationship(&self.from, &self.to, &self.relationship_type, self.old_value);
    }

    pub fn delta(&self) -> f32 {
        self.new_value - self.old_value
    }
}

/// Undo a batch of commands, newest first.
pub fn undo_all(commands: &[RelationshipCommand], store: &RelationshipStore) {
    for command in commands.iter().rev() {
        command.undo(store);
    }
}

/// Applies a fragment's relationship modifiers speaker→target once the
/// fragment has been spoken.
#[derive(Debug, Clone)]
pub struct RelationshipModifierApplier {
    store: Arc<RelationshipStore>,
}

impl RelationshipModifierApplier {
    pub fn new(store: Arc<RelationshipStore>) -> Self {
        Self { store }
    }

    /// The delta a modifier would apply right now, or `None` when it is
    /// below threshold or inside the dead zone.
    fn planned_delta(&self, modifier: &RelationshipModifier, speaker: &Character, target: &Character) -> Option<f32> {
        let current = self
            .store
            .get_relationship(&speaker.id, &target.id, &modifier.relationship_type);
        if current < modifier.threshold {
            tracing::debug!(
                relationship_type = %modifier.relationship_type,
                current,
                threshold = modifier.threshold,
                "relationship modifier below threshold, skipped"
            );
            return None;
        }
        let delta = current * (modifier.multiplier - 1.0);
        if delta.abs() < MIN_RELATIONSHIP_DELTA {
            tracing::debug!(
                relationship_type = %modifier.relationship_type,
                delta,
                "relationship delta too small, skipped"
            );
            return None;
        }
        Some(delta)
    }

    pub fn apply_modifiers(&self, fragment: &DialogueFragment, speaker: &Character, target: &Character) {
        for modifier in &fragment.relationship_modifiers {
            if let Some(delta) = self.planned_delta(modifier, speaker, target) {
                let new_value = self.store.modify_relationship(
                    &speaker.id,
                    &target.id,
                    &modifier.relationship_type,
                    delta,
                );
                tracing::info!(
                    fragment = %fragment.id,
                    from = %speaker.id,
                    to = %target.id,
                    relationship_type = %modifier.relationship_type,
                    delta,
                    new_value,
                    "relationship modifier applied"
                );
            }
        }
    }

    /// Same as [`apply_modifiers`](Self::apply_modifiers), returning each
    /// executed change so it can be undone.
    pub fn apply_modifiers_as_commands(
        &self,
        fragment: &DialogueFragment,
        speaker: &Character,
        target: &Character,
    ) -> Vec<RelationshipCommand> {
        let mut executed = Vec::new();
        for modifier in &fragment.relationship_modifiers {
            let Some(delta) = self.planned_delta(modifier, speaker, target) else {
                continue;
            };
            if let Some((old_value, new_value)) = self.store.modify_relationship_tracked(
                &speaker.id,
                &target.id,
                &modifier.relationship_type,
                delta,
            ) {
                executed.push(RelationshipCommand {
                    from: speaker.id.clone(),
                    to: target.id.clone(),
                    relationship_type: modifier.relationship_type.clone(),
                    old_value,
                    new_value,
                });
            }
        }
        executed
    }
}

/// Applies a fragment's context modifiers to the scene context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextModifierApplier;

impl ContextModifierApplier {
    pub fn apply_modifiers(&self, fragment: &DialogueFragment, context: &SceneContext) {
        for modifier in &fragment.context_modifiers {
            if modifier.key.is_empty() {
                continue;
            }
            let key = modifier.key.as_str();
            let amount = modifier.value.as_f64().unwrap_or(0.0);
            match modifier.operation {
                ContextOperation::Set => context.set(key, modifier.value.clone()),
                ContextOperation::Increment => {
                    context.increment(key, amount);
                }
                ContextOperation::Decrement => {
                    context.increment(key, -amount);
                }
                ContextOperation::SetTrue => context.set(key, true),
                ContextOperation::SetFalse => context.set(key, false),
                ContextOperation::Multiply => {
                    let current: f64 = context.get_or(key, 1.0);
                    context.set(key, Value::Float(current * amount));
                }
                ContextOperation::Max => {
                    let current: f64 = context.get_or(key, f64::NEG_INFINITY);
                    context.set(key, Value::Float(current.max(amount)));
                }
                ContextOperation::Min => {
                    let current: f64 = context.get_or(key, f64::INFINITY);
                    context.set(key, Value::Float(current.min(amount)));
                }
            }
            tracing::debug!(fragment = %fragment.id, key, operation = ?modifier.operation, "context modifier applied");
        }
    }
}
