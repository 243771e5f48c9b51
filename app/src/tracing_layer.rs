// In app/src/tracing_layer.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;

const AUDIT_CAPACITY: usize = 200;

/// A warning or error captured during the run.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

pub type AuditLog = Arc<Mutex<VecDeque<AuditEntry>>>;

/// Keeps the most recent warn and error events, e.g. clamp corrections and
/// rejected batches, for the audit section of the command output.
pub struct AuditLayer {
    log: AuditLog,
}

impl AuditLayer {
    pub fn new() -> (Self, AuditLog) {
        let log: AuditLog = Arc::new(Mutex::new(VecDeque::with_capacity(AUDIT_CAPACITY)));
        (Self { log: log.clone() }, log)
    }
}

impl<S> Layer<S> for AuditLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        let mut visitor = AuditVisitor::default();
        event.record(&mut visitor);
        let entry = AuditEntry {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.finish(),
        };

        let mut log = self.log.lock().unwrap_or_else(|p| p.into_inner());
        if log.len() >= AUDIT_CAPACITY {
            log.pop_front();
        }
        log.push_back(entry);
    }
}

/// Renders an event as its message followed by `key=value` fields.
#[derive(Default)]
struct AuditVisitor {
    message: String,
    fields: Vec<String>,
}

impl AuditVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for AuditVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
