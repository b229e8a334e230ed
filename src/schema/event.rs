use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// A domain event published by the engine. Nothing in the engine depends
/// on whether anyone is listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialogueEvent {
    RelationshipChanged {
        from: String,
        to: String,
        relationship_type: String,
        old_value: f32,
        new_value: f32,
    },
    /// A scene started with the given role → character assignments,
    /// sorted by role id.
    SceneCast {
        scene_id: String,
        cast: Vec<(String, String)>,
    },
    BeatAdvanced {
        scene_id: String,
        from_beat: String,
        to_beat: String,
    },
    SceneEnded {
        scene_id: String,
    },
    LinePrepared {
        fragment_id: String,
        speaker_id: String,
        target_id: Option<String>,
        text: String,
        score: f32,
    },
}

impl DialogueEvent {
    /// Short kind name, handy for filtering and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RelationshipChanged { .. } => "relationship_changed",
            Self::SceneCast { .. } => "scene_cast",
            Self::BeatAdvanced { .. } => "beat_advanced",
            Self::SceneEnded { .. } => "scene_ended",
            Self::LinePrepared { .. } => "line_prepared",
        }
    }
}

/// Receiver for published domain events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DialogueEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: DialogueEvent) {}
}

/// Writes every event to the `tracing` debug stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: DialogueEvent) {
        tracing::debug!(kind = event.kind(), ?event, "dialogue event");
    }
}

/// Append-only in-memory event log.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<DialogueEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far.
    pub fn events(&self) -> Vec<DialogueEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take everything published so far, leaving the log empty.
    pub fn drain(&self) -> Vec<DialogueEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of logged events of the given kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: DialogueEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_collects_and_drains() {
        let log = EventLog::new();
        assert!(log.is_empty());
        log.publish(DialogueEvent::SceneEnded {
            scene_id: "dinner".to_string(),
        });
        log.publish(DialogueEvent::BeatAdvanced {
            scene_id: "dinner".to_string(),
            from_beat: "a".to_string(),
            to_beat: "b".to_string(),
        });
        assert_eq!(log.len(), 2);
        assert_eq!(log.count_kind("scene_ended"), 1);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn null_sink_accepts_events() {
        NullEventSink.publish(DialogueEvent::SceneEnded {
            scene_id: "x".to_string(),
        });
    }

    #[test]
    fn kind_names() {
        let e = DialogueEvent::LinePrepared {
            fragment_id: "f".to_string(),
            speaker_id: "s".to_string(),
            target_id: None,
            text: "hi".to_string(),
            score: 1.0,
        };
        assert_eq!(e.kind(), "line_prepared");
    }
}
