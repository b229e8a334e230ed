/// Directed, typed relationship graph between characters.
///
/// Values live in `from → to → type` maps, are clamped to
/// [`MIN_RELATIONSHIP`, `MAX_RELATIONSHIP`] on write and read as
/// [`DEFAULT_RELATIONSHIP`] when unset. A→B is independent of B→A.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::schema::event::{DialogueEvent, EventSink, NullEventSink};

pub const DEFAULT_RELATIONSHIP: f32 = 50.0;
pub const MIN_RELATIONSHIP: f32 = 0.0;
pub const MAX_RELATIONSHIP: f32 = 100.0;

type RelationshipMap = HashMap<String, HashMap<String, HashMap<String, f32>>>;

/// One stored relationship value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub from: String,
    pub to: String,
    pub relationship_type: String,
    pub value: f32,
}

/// Serialisable copy of the whole store, for save/load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSnapshot {
    pub entries: Vec<RelationshipEntry>,
}

/// Thread-safe relationship store. Every operation takes the same lock.
pub struct RelationshipStore {
    values: Mutex<RelationshipMap>,
    events: Arc<dyn EventSink>,
}

impl Default for RelationshipStore {
    fn default() -> Self {
        Self::new(Arc::new(NullEventSink))
    }
}

impl std::fmt::Debug for RelationshipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipStore")
            .field("values", &*self.lock())
            .finish()
    }
}

impl RelationshipStore {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelationshipMap> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of `from`'s relationship of `relationship_type`
    /// towards `to`, or the default if never set.
    pub fn get_relationship(&self, from: &str, to: &str, relationship_type: &str) -> f32 {
        self.lock()
            .get(from)
            .and_then(|targets| targets.get(to))
            .and_then(|types| types.get(relationship_type))
            .copied()
            .unwrap_or(DEFAULT_RELATIONSHIP)
    }

    pub fn has_relationship(&self, from: &str, to: &str, relationship_type: &str) -> bool {
        self.lock()
            .get(from)
            .and_then(|targets| targets.get(to))
            .is_some_and(|types| types.contains_key(relationship_type))
    }

    /// Store a clamped value and publish the change. NaN is rejected.
    pub fn set_relationship(&self, from: &str, to: &str, relationship_type: &str, value: f32) {
        self.update(from, to, relationship_type, |_| value);
    }

    /// Add `delta` to the current value and store the clamped result,
    /// returning the new value. The read and write happen under one lock.
    pub fn modify_relationship(&self, from: &str, to: &str, relationship_type: &str, delta: f32) -> f32 {
        match self.update(from, to, relationship_type, |current| current + delta) {
            Some((_, new_value)) => new_value,
            None => self.get_relationship(from, to, relationship_type),
        }
    }

    /// Like [`modify_relationship`](Self::modify_relationship), returning
    /// the `(old, new)` pair read and written under the same lock. `None`
    /// when the change was rejected.
    pub fn modify_relationship_tracked(
        &self,
        from: &str,
        to: &str,
        relationship_type: &str,
        delta: f32,
    ) -> Option<(f32, f32)> {
        self.update(from, to, relationship_type, |current| current + delta)
    }

    fn update<F>(&self, from: &str, to: &str, relationship_type: &str, compute: F) -> Option<(f32, f32)>
    where
        F: FnOnce(f32) -> f32,
    {
        let (old_value, new_value) = {
            let mut values = self.lock();
            let slot = values
                .entry(from.to_string())
                .or_default()
                .entry(to.to_string())
                .or_default();
            let old_value = slot
                .get(relationship_type)
                .copied()
                .unwrap_or(DEFAULT_RELATIONSHIP);
            let value = compute(old_value);
            if value.is_nan() {
                tracing::warn!(from, to, relationship_type, "ignoring NaN relationship value");
                return None;
            }
            let new_value = value.clamp(MIN_RELATIONSHIP, MAX_RELATIONSHIP);
            slot.insert(relationship_type.to_string(), new_value);
            (old_value, new_value)
        };

        tracing::debug!(
            from,
            to,
            relationship_type,
            old_value,
            new_value,
            "relationship updated"
        );

        // Published outside the lock so sinks may read the store.
        self.events.publish(DialogueEvent::RelationshipChanged {
            from: from.to_string(),
            to: to.to_string(),
            relationship_type: relationship_type.to_string(),
            old_value,
            new_value,
        });
        Some((old_value, new_value))
    }

    /// Every stored relationship originating at `from`.
    pub fn relationships_from(&self, from: &str) -> Vec<RelationshipEntry> {
        let values = self.lock();
        let mut entries: Vec<RelationshipEntry> = values
            .get(from)
            .into_iter()
            .flat_map(|targets| {
                targets.iter().flat_map(move |(to, types)| {
                    types.iter().map(move |(rel_type, value)| RelationshipEntry {
                        from: from.to_string(),
                        to: to.clone(),
                        relationship_type: rel_type.clone(),
                        value: *value,
                    })
                })
            })
            .collect();
        entries.sort_by(|a, b| (&a.to, &a.relationship_type).cmp(&(&b.to, &b.relationship_type)));
        entries
    }

    pub fn clear_all_relationships(&self) {
        self.lock().clear();
        tracing::info!("all relationships cleared");
    }

    pub fn snapshot(&self) -> RelationshipSnapshot {
        let values = self.lock();
        let mut entries = Vec::new();
        for (from, targets) in values.iter() {
            for (to, types) in targets {
                for (rel_type, value) in types {
                    entries.push(RelationshipEntry {
                        from: from.clone(),
                        to: to.clone(),
                        relationship_type: rel_type.clone(),
                        value: *value,
                    });
                }
            }
        }
        entries.sort_by(|a, b| {
            (&a.from, &a.to, &a.relationship_type).cmp(&(&b.from, &b.to, &b.relationship_type))
        });
        RelationshipSnapshot { entries }
    }

    /// Replace the store's contents with a snapshot. No events are published.
    pub fn restore(&self, snapshot: &RelationshipSnapshot) {
        let mut values = self.lock();
        values.clear();
        for entry in &snapshot.entries {
            if entry.value.is_nan() {
                continue;
            }
            values
                .entry(entry.from.clone())
                .or_default()
                .entry(entry.to.clone())
                .or_default()
                .insert(
                    entry.relationship_type.clone(),
                    entry.value.clamp(MIN_RELATIONSHIP, MAX_RELATIONSHIP),
                );
        }
    }
}
