use chrono::Utc;
use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Ordinal severity of a [`LogRecord`].
///
/// Higher values are more severe. The named constants follow the usual
/// handler level table, so records coming from other logging frameworks
/// can be expressed with their native ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Severity(pub i32);

impl Severity {
    /// Disables a handler entirely.
    pub const OFF: Severity = Severity(i32::MAX);
    pub const ERROR: Severity = Severity(1000);
    pub const WARN: Severity = Severity(900);
    pub const INFO: Severity = Severity(800);
    pub const CONFIG: Severity = Severity(700);
    pub const DEBUG: Severity = Severity(500);
    pub const FINER: Severity = Severity(400);
    pub const TRACE: Severity = Severity(300);
    /// Lets every record through a handler.
    pub const ALL: Severity = Severity(i32::MIN);

    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::ERROR,
            tracing::Level::WARN => Severity::WARN,
            tracing::Level::INFO => Severity::INFO,
            tracing::Level::DEBUG => Severity::DEBUG,
            tracing::Level::TRACE => Severity::TRACE,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Severity::OFF => f.write_str("OFF"),
            Severity::ERROR => f.write_str("ERROR"),
            Severity::WARN => f.write_str("WARN"),
            Severity::INFO => f.write_str("INFO"),
            Severity::CONFIG => f.write_str("CONFIG"),
            Severity::DEBUG => f.write_str("DEBUG"),
            Severity::FINER => f.write_str("FINER"),
            Severity::TRACE => f.write_str("TRACE"),
            Severity::ALL => f.write_str("ALL"),
            Severity(other) => write!(f, "{}", other),
        }
    }
}

/// Parse a severity from its name (case-insensitive) or a raw ordinal.
impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let severity = match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Severity::OFF,
            "ERROR" => Severity::ERROR,
            "WARN" | "WARNING" => Severity::WARN,
            "INFO" => Severity::INFO,
            "CONFIG" => Severity::CONFIG,
            "DEBUG" => Severity::DEBUG,
            "FINER" => Severity::FINER,
            "TRACE" => Severity::TRACE,
            "ALL" => Severity::ALL,
            other => other
                .parse::<i32>()
                .map(Severity)
                .map_err(|_| format!("unknown severity `{}`", s))?,
        };
        Ok(severity)
    }
}

/// One link of a captured error chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrownCause {
    pub type_name: String,
    pub message: String,
}

/// Owned snapshot of an error attached to a [`LogRecord`].
///
/// `chain` starts with the outermost error and follows `source()` down
/// to the root cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrownError {
    pub chain: Vec<ThrownCause>,
    pub backtrace: Option<String>,
}

impl ThrownError {
    /// Capture an error whose concrete type is known at the call site.
    pub fn from_typed<E: Error + 'static>(error: &E) -> Self {
        let mut thrown = Self::from_error(error);
        if let Some(first) = thrown.chain.first_mut() {
            first.type_name = std::any::type_name::<E>().to_string();
        }
        thrown
    }

    /// Capture a type-erased error. Type names are recovered from the
    /// `Debug` rendering of each link.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn Error + 'static)> = Some(error);
        while let Some(err) = current {
            chain.push(ThrownCause {
                type_name: parse_type_from_debug(&format!("{:?}", err)),
                message: err.to_string(),
            });
            current = err.source();
        }
        ThrownError { chain, backtrace: None }
    }

    /// Attach a backtrace. Disabled or unsupported backtraces are ignored.
    pub fn with_backtrace(mut self, backtrace: &Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            self.backtrace = Some(backtrace.to_string());
        }
        self
    }
}

/// Leading identifier of a `Debug` rendering, e.g. `Custom` for
/// `Custom { kind: Other, .. }`.
fn parse_type_from_debug(debug: &str) -> String {
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .unwrap_or(debug.len());
    let name = debug[..end].trim_end_matches(':');
    if name.is_empty() {
        "Error".to_string()
    } else {
        name.to_string()
    }
}

/// A single log record as seen by [`SentryHandler`](crate::handler::SentryHandler).
///
/// The tracing bridge fills it from `tracing` events; other logging
/// frameworks can build it directly.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Severity,
    /// Milliseconds since the Unix epoch.
    pub millis: i64,
    pub logger_name: Option<String>,
    pub source_class_name: Option<String>,
    pub source_method_name: Option<String>,
    /// Raw message template.
    pub message: Option<String>,
    pub parameters: Option<Vec<serde_json::Value>>,
    pub thrown: Option<ThrownError>,
    /// Named context values carried alongside the message.
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// New record stamped with the current time.
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        LogRecord {
            level,
            millis: Utc::now().timestamp_millis(),
            logger_name: None,
            source_class_name: None,
            source_method_name: None,
            message: Some(message.into()),
            parameters: None,
            thrown: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_logger(mut self, name: impl Into<String>) -> Self {
        self.logger_name = Some(name.into());
        self
    }

    pub fn with_source(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.source_class_name = Some(class.into());
        self.source_method_name = Some(method.into());
        self
    }

    pub fn with_millis(mut self, millis: i64) -> Self {
        self.millis = millis;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<serde_json::Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_thrown(mut self, thrown: ThrownError) -> Self {
        self.thrown = Some(thrown);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
