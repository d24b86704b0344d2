use crate::record::{ThrownCause, ThrownError};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Level understood by the error-tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Synthetic code location used as an event culprit.
///
/// Rendered as `Class.method`, followed by `(file:line)` when a file is
/// known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        StackFrame {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name: None,
            line: None,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)?;
        if let Some(file) = self.file_name.as_deref().filter(|f| !f.is_empty()) {
            write!(f, "({}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Exception details attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInterface {
    /// Outermost error first.
    pub values: Vec<ThrownCause>,
    pub stacktrace: Option<String>,
}

impl From<&ThrownError> for ExceptionInterface {
    fn from(thrown: &ThrownError) -> Self {
        ExceptionInterface {
            values: thrown.chain.clone(),
            stacktrace: thrown.backtrace.clone(),
        }
    }
}

/// Message template with its already stringified parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInterface {
    pub message: String,
    pub params: Vec<String>,
}

impl MessageInterface {
    pub fn new(message: impl Into<String>, params: Vec<String>) -> Self {
        MessageInterface {
            message: message.into(),
            params,
        }
    }
}

/// Structured payloads an event can carry besides its top-level fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SentryInterface {
    #[serde(rename = "sentry.interfaces.Exception")]
    Exception(ExceptionInterface),
    #[serde(rename = "sentry.interfaces.Message")]
    Message(MessageInterface),
}

impl SentryInterface {
    pub fn interface_name(&self) -> &'static str {
        match self {
            SentryInterface::Exception(_) => "sentry.interfaces.Exception",
            SentryInterface::Message(_) => "sentry.interfaces.Message",
        }
    }
}

/// Immutable event handed to an [`EventClient`](crate::client::EventClient).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<EventLevel>,
    pub timestamp: DateTime<Utc>,
    pub logger: Option<String>,
    pub culprit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub interfaces: Vec<SentryInterface>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn message_interface(&self) -> Option<&MessageInterface> {
        self.interfaces.iter().find_map(|i| match i {
            SentryInterface::Message(m) => Some(m),
            _ => None,
        })
    }

    pub fn exception_interface(&self) -> Option<&ExceptionInterface> {
        self.interfaces.iter().find_map(|i| match i {
            SentryInterface::Exception(e) => Some(e),
            _ => None,
        })
    }
}

/// Step-by-step construction of an [`Event`].
///
/// Builder helpers registered on a client receive the builder right
/// before [`EventBuilder::build`] is called.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuilder {
    pub fn new() -> Self {
        EventBuilder {
            event: Event {
                event_id: Uuid::new_v4(),
                level: None,
                timestamp: Utc::now(),
                logger: None,
                culprit: None,
                message: None,
                interfaces: Vec::new(),
                extra: BTreeMap::new(),
            },
        }
    }

    pub fn set_level(&mut self, level: Option<EventLevel>) -> &mut Self {
        self.event.level = level;
        self
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Out-of-range values keep the current timestamp.
    pub fn set_timestamp_millis(&mut self, millis: i64) -> &mut Self {
        if let Some(ts) = Utc.timestamp_millis_opt(millis).single() {
            self.event.timestamp = ts;
        }
        self
    }

    pub fn set_logger(&mut self, logger: Option<String>) -> &mut Self {
        self.event.logger = logger;
        self
    }

    pub fn set_culprit(&mut self, culprit: Option<String>) -> &mut Self {
        self.event.culprit = culprit;
        self
    }

    pub fn set_culprit_frame(&mut self, frame: &StackFrame) -> &mut Self {
        self.event.culprit = Some(frame.to_string());
        self
    }

    pub fn set_message(&mut self, message: Option<String>) -> &mut Self {
        self.event.message = message;
        self
    }

    pub fn add_interface(&mut self, interface: SentryInterface) -> &mut Self {
        self.event.interfaces.push(interface);
        self
    }

    pub fn add_extra(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.event.extra.insert(key.into(), value);
        self
    }

    /// Read access for builder helpers.
    pub fn peek(&self) -> &Event {
        &self.event
    }

    pub fn build(self) -> Event {
        self.event
    }
}

/// Hook allowed to mutate an event before it is submitted.
pub trait EventBuilderHelper: Send + Sync {
    fn help_building_event(&self, builder: &mut EventBuilder);
}

impl<F> EventBuilderHelper for F
where
    F: Fn(&mut EventBuilder) + Send + Sync,
{
    fn help_building_event(&self, builder: &mut EventBuilder) {
        self(builder)
    }
}
