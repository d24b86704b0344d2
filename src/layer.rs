use crate::handler::SentryHandler;
use crate::record::{LogRecord, Severity, ThrownError};
use chrono::Utc;
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// publishes them through a [`SentryHandler`].
///
/// Mapping:
/// - the event target becomes the logger name;
/// - the module path and the name of the current span form the culprit
///   frame, so events inside `#[instrument]`ed functions are blamed on
///   that function;
/// - the `message` field is the message, every other field becomes a
///   positional parameter (in recording order) and a named field;
/// - a field recorded as `dyn Error` becomes the attached error.
///
/// Everything runs on the emitting thread; the handler's client decides
/// whether delivery is deferred.
#[derive(Clone)]
pub struct SentryLayer {
    handler: Arc<SentryHandler>,
}

impl SentryLayer {
    pub fn new(handler: Arc<SentryHandler>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<SentryHandler> {
        &self.handler
    }
}

impl<S> Layer<S> for SentryLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Severity::from(*meta.level());
        // Skip field collection for records the handler would drop anyway.
        if level < self.handler.level() {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level,
            millis: Utc::now().timestamp_millis(),
            logger_name: Some(meta.target().to_string()),
            source_class_name: meta.module_path().map(|s| s.to_string()),
            source_method_name: ctx.event_span(event).map(|span| span.name().to_string()),
            message: visitor.message,
            parameters: if visitor.values.is_empty() {
                None
            } else {
                Some(visitor.values)
            },
            thrown: visitor.thrown,
            fields: visitor.fields,
        };

        self.handler.publish(&record);
    }
}

#[derive(Default)]
pub struct FieldVisitor {
    pub message: Option<String>,
    pub values: Vec<serde_json::Value>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub thrown: Option<ThrownError>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: serde_json::Value) {
        self.values.push(value.clone());
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.thrown.is_none() {
            self.thrown = Some(ThrownError::from_error(value).with_backtrace(&Backtrace::capture()));
        } else {
            self.push(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
