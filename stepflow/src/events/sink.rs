//! Where run events go.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::Level;

/// Receives run and step events.
///
/// Sinks observe a run; they cannot fail it.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers an event.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Delivers an event from synchronous code. The interpreter uses this
    /// so a slow sink never delays a step.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to `tracing`.
///
/// `run_id`, `step` and `component_id` from the payload become structured
/// fields. Failure events (`*.failed`) are always logged at
/// `WARN`, whatever the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::info()
    }
}

impl LoggingEventSink {
    /// Logs at the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs at `DEBUG`.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Logs at `INFO`.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn level_for(&self, event_type: &str) -> Level {
        if event_type.ends_with(".failed") {
            Level::WARN
        } else {
            self.level
        }
    }

    fn record(&self, event_type: &str, data: Option<&Value>) {
        let text = |key: &str| data.and_then(|d| d.get(key)).and_then(Value::as_str).unwrap_or("");
        let (run_id, step, component_id) = (text("run_id"), text("step"), text("component_id"));

        macro_rules! log_at {
            ($level:expr) => {
                tracing::event!(
                    $level,
                    event_type,
                    run_id,
                    step,
                    component_id,
                    data = ?data,
                    "{event_type}"
                )
            };
        }

        let level = self.level_for(event_type);
        if level == Level::ERROR {
            log_at!(Level::ERROR);
        } else if level == Level::WARN {
            log_at!(Level::WARN);
        } else if level == Level::INFO {
            log_at!(Level::INFO);
        } else if level == Level::DEBUG {
            log_at!(Level::DEBUG);
        } else {
            log_at!(Level::TRACE);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }
}

/// One event held by a [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedEvent {
    /// Event type, e.g. `step.completed`.
    pub event_type: String,
    /// Payload, if any.
    pub data: Option<Value>,
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<CollectedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<CollectedEvent> {
        self.events.read().clone()
    }

    /// Number of events so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Forgets every event.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events whose type starts with `prefix`, e.g. `checkpoint.`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<CollectedEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of events of exactly this type.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    fn push(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push(CollectedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }
}
