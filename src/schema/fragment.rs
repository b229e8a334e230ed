use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::value::Value;

/// Scales a fragment's score (at scoring time) or a relationship value
/// (after selection) when the speaker→target relationship of the given
/// type is at or above `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipModifier {
    pub relationship_type: String,
    pub threshold: f32,
    pub multiplier: f32,
}

/// How a context modifier combines its value with the current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextOperation {
    Set,
    Increment,
    Decrement,
    SetTrue,
    SetFalse,
    Multiply,
    Max,
    Min,
}

/// A scene-context mutation applied when a fragment is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextModifier {
    pub key: String,
    pub operation: ContextOperation,
    #[serde(default = "default_modifier_value")]
    pub value: Value,
}

fn default_modifier_value() -> Value {
    Value::Float(0.0)
}

/// A candidate line of dialogue with trait and relationship gating.
///
/// `text` is a template for the text assembler; see
/// [`crate::core::assembler`] for the placeholder syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueFragment {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub required_traits: Vec<String>,
    #[serde(default)]
    pub forbidden_traits: Vec<String>,
    #[serde(default)]
    pub trait_affinities: HashMap<String, f32>,
    #[serde(default)]
    pub relationship_modifiers: Vec<RelationshipModifier>,
    #[serde(default)]
    pub context_modifiers: Vec<ContextModifier>,
}

impl DialogueFragment {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            required_traits: Vec::new(),
            forbidden_traits: Vec::new(),
            trait_affinities: HashMap::new(),
            relationship_modifiers: Vec::new(),
            context_modifiers: Vec::new(),
        }
    }

    pub fn requires(mut self, trait_id: &str) -> Self {
        self.required_traits.push(trait_id.to_string());
        self
    }

    pub fn forbids(mut self, trait_id: &str) -> Self {
        self.forbidden_traits.push(trait_id.to_string());
        self
    }

    pub fn affinity(mut self, trait_id: &str, weight: f32) -> Self {
        self.trait_affinities.insert(trait_id.to_string(), weight);
        self
    }

    pub fn relationship_modifier(mut self, relationship_type: &str, threshold: f32, multiplier: f32) -> Self {
        self.relationship_modifiers.push(RelationshipModifier {
            relationship_type: relationship_type.to_string(),
            threshold,
            multiplier,
        });
        self
    }

    pub fn context_modifier(mut self, key: &str, operation: ContextOperation, value: impl Into<Value>) -> Self {
        self.context_modifiers.push(ContextModifier {
            key: key.to_string(),
            operation,
            value: value.into(),
        });
        self
    }
}

/// A named pool of fragments that a beat draws its candidates from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationSet {
    pub id: String,
    pub fragments: Vec<DialogueFragment>,
}
