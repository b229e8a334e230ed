//! Scene context — thread-safe scratch space of scene-local facts.
//!
//! Conditions and context modifiers read and write plain string keys.
//! Beat bookkeeping uses `beat.{id}.visited`, `beat.{id}.fragment` and
//! `beat.{id}.speaker`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schema::value::{FromValue, Value};

const BEAT_PREFIX: &str = "beat.";
const VISITED_SUFFIX: &str = ".visited";

pub fn beat_visited_key(beat_id: &str) -> String {
    format!("beat.{}.visited", beat_id)
}

pub fn beat_fragment_key(beat_id: &str) -> String {
    format!("beat.{}.fragment", beat_id)
}

pub fn beat_speaker_key(beat_id: &str) -> String {
    format!("beat.{}.speaker", beat_id)
}

/// `amount` as an `i64` when it is whole and in range.
fn whole_amount(amount: f64) -> Option<i64> {
    if amount.fract() != 0.0 || amount < i64::MIN as f64 || amount >= i64::MAX as f64 {
        return None;
    }
    Some(amount as i64)
}

#[derive(Debug, Default)]
pub struct SceneContext {
    values: Mutex<HashMap<String, Value>>,
}

impl SceneContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        tracing::trace!(key, %value, "context set");
        self.lock().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Read `key` coerced to `T`, falling back to `default` when the key
    /// is missing or can't be coerced.
    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.lock()
            .get(key)
            .and_then(T::from_value)
            .unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Add `amount` to a numeric entry (missing or non-numeric reads as 0)
    /// and return the new value. Integer entries stay integers when the
    /// amount is whole.
    pub fn increment(&self, key: &str, amount: f64) -> f64 {
        let mut values = self.lock();
        let next = match values.get(key) {
            Some(Value::Int(i)) => match whole_amount(amount).and_then(|step| i.checked_add(step)) {
                Some(sum) => Value::Int(sum),
                None => Value::Float(*i as f64 + amount),
            },
            Some(existing) => Value::Float(existing.as_f64().unwrap_or(0.0) + amount),
            None => Value::Float(amount),
        };
        let result = next.as_f64().unwrap_or(0.0);
        values.insert(key.to_string(), next);
        result
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// All entries whose key starts with `prefix`, sorted by key.
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .lock()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries_with_prefix(prefix)
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Record that a beat was played, optionally with the fragment chosen
    /// and the speaking character.
    pub fn mark_beat_visited(&self, beat_id: &str, fragment_id: Option<&str>, speaker_id: Option<&str>) {
        let mut values = self.lock();
        values.insert(beat_visited_key(beat_id), Value::Bool(true));
        if let Some(fragment_id) = fragment_id {
            values.insert(beat_fragment_key(beat_id), Value::from(fragment_id));
        }
        if let Some(speaker_id) = speaker_id {
            values.insert(beat_speaker_key(beat_id), Value::from(speaker_id));
        }
    }

    pub fn was_beat_visited(&self, beat_id: &str) -> bool {
        self.get_or(&beat_visited_key(beat_id), false)
    }

    pub fn beat_fragment(&self, beat_id: &str) -> Option<String> {
        self.get(&beat_fragment_key(beat_id)).map(|v| v.to_string())
    }

    pub fn beat_speaker(&self, beat_id: &str) -> Option<String> {
        self.get(&beat_speaker_key(beat_id)).map(|v| v.to_string())
    }

    /// Ids of every beat marked visited, sorted.
    pub fn visited_beats(&self) -> Vec<String> {
        self.entries_with_prefix(BEAT_PREFIX)
            .into_iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .filter_map(|(k, _)| {
                k.strip_prefix(BEAT_PREFIX)
                    .and_then(|rest| rest.strip_suffix(VISITED_SUFFIX))
                    .map(str::to_string)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_with_coercion() {
        let ctx = SceneContext::new();
        ctx.set("gold", 12i64);
        ctx.set("mood", "tense");
        ctx.set("door_open", true);

        assert_eq!(ctx.get_or("gold", 0.0f64), 12.0);
        assert_eq!(ctx.get_or("gold", 0i64), 12);
        assert_eq!(ctx.get_or("door_open", 0.0f64), 1.0);
        assert_eq!(ctx.get_or("mood", String::new()), "tense");
        // Not coercible, so the default wins.
        assert_eq!(ctx.get_or("mood", 3.5f64), 3.5);
        assert_eq!(ctx.get_or("missing", 7i64), 7);
        assert!(ctx.get_or("missing", true));
    }

    #[test]
    fn increment_counters() {
        let ctx = SceneContext::new();
        assert_eq!(ctx.increment("toasts", 1.0), 1.0);
        assert_eq!(ctx.increment("toasts", 2.0), 3.0);

        ctx.set("lies", 2i64);
        assert_eq!(ctx.increment("lies", 1.0), 3.0);
        assert_eq!(ctx.get("lies"), Some(Value::Int(3)));

        ctx.set("word", "x");
        assert_eq!(ctx.increment("word", 1.0), 1.0);
    }

    #[test]
    fn increment_past_integer_range_becomes_float() {
        let ctx = SceneContext::new();
        ctx.set("gold", i64::MAX - 1);
        let result = ctx.increment("gold", 10.0);
        assert!(result > 9.0e18);
        assert!(matches!(ctx.get("gold"), Some(Value::Float(_))));

        ctx.set("debt", i64::MIN + 1);
        ctx.increment("debt", -10.0);
        assert!(matches!(ctx.get("debt"), Some(Value::Float(_))));

        ctx.set("coins", 5i64);
        ctx.increment("coins", 1.0e300);
        assert!(matches!(ctx.get("coins"), Some(Value::Float(_))));

        ctx.set("coins", 5i64);
        ctx.increment("coins", f64::NAN);
        assert!(matches!(ctx.get("coins"), Some(Value::Float(_))));
    }

    #[test]
    fn remove_and_clear() {
        let ctx = SceneContext::new();
        ctx.set("a", 1i64);
        ctx.set("b", 2i64);
        assert_eq!(ctx.remove("a"), Some(Value::Int(1)));
        assert!(!ctx.has("a"));
        assert_eq!(ctx.len(), 1);
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn prefix_query_is_sorted() {
        let ctx = SceneContext::new();
        ctx.set("quest.b", 1i64);
        ctx.set("quest.a", 2i64);
        ctx.set("other", 3i64);
        assert_eq!(ctx.keys_with_prefix("quest."), vec!["quest.a", "quest.b"]);
    }

    #[test]
    fn beat_visit_helpers() {
        let ctx = SceneContext::new();
        assert!(!ctx.was_beat_visited("intro"));
        ctx.mark_beat_visited("intro", Some("greet_01"), Some("margaret"));
        ctx.mark_beat_visited("toast", None, None);

        assert!(ctx.was_beat_visited("intro"));
        assert_eq!(ctx.get("beat.intro.visited"), Some(Value::Bool(true)));
        assert_eq!(ctx.beat_fragment("intro").as_deref(), Some("greet_01"));
        assert_eq!(ctx.beat_speaker("intro").as_deref(), Some("margaret"));
        assert_eq!(ctx.beat_fragment("toast"), None);
        assert_eq!(ctx.visited_beats(), vec!["intro", "toast"]);
    }
}
