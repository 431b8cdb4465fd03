//! Pipeline event bus: trait for emitting lifecycle events from any stage.
//!
//! Engines accept an `Arc<dyn EventSink>` and emit one event per state change
//! worth observing (content generated, QA flagged, channel published, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BatchStarted,
    ContentGenerated,
    ContentGenerationFailed,
    QaPassed,
    QaFlagged,
    ContentReviewed,
    ChannelPublished,
    ChannelScheduled,
    ChannelFailed,
    BatchCompleted,
    BatchFailed,
}

/// A single lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub batch_id: Option<Uuid>,
    pub content_id: Option<Uuid>,
    pub channel: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Trait for emitting pipeline events. Implementations may forward to a
/// message bus, a webhook, or an analytics store.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// No-op sink for callers that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: PipelineEvent) {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .push(event);
    }
}

/// Convenience builder for creating a `PipelineEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    batch_id: Option<Uuid>,
    content_id: Option<Uuid>,
) -> PipelineEvent {
    PipelineEvent {
        event_id: Uuid::new_v4(),
        event_type,
        batch_id,
        content_id,
        channel: None,
        detail: None,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
