//! Custom tracing layer that forwards engine log events to the host.
//!
//! The embedding editor runs the engine in-process and wants to surface
//! noteworthy engine activity (replacements, transport failures) in its
//! own UI. This layer captures tracing events into serializable records
//! and pushes them over a tokio channel.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// One captured log event, ready for display or serialization.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineLogRecord {
    /// Event target (e.g. "replace", "chat_api").
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR).
    pub level: String,
    /// Human-readable message.
    pub message: String,
    /// Structured fields from the event.
    pub fields: HashMap<String, Value>,
    /// Timestamp (RFC 3339).
    pub timestamp: String,
}

/// Sends every tracing event to a channel as an [`EngineLogRecord`].
pub struct EngineLogLayer {
    sender: mpsc::UnboundedSender<EngineLogRecord>,
}

impl EngineLogLayer {
    pub fn new(sender: mpsc::UnboundedSender<EngineLogRecord>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for EngineLogLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        let mut visitor = FieldVisitor(&mut fields);
        event.record(&mut visitor);

        let record = EngineLogRecord {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message: fields
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // Non-blocking send; if the receiver is gone we just skip
        let _ = self.sender.send(record);
    }
}

/// Field visitor that extracts tracing event fields into a HashMap.
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(
            field.name().to_string(),
            serde_json::json!(format!("{:?}", value)),
        );
    }
}
