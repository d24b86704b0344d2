use std::error::Error;
use std::fmt;

/// Category of a failure reported by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generic,
    /// The client rejected an event.
    WriteFailure,
    FlushFailure,
    /// The client connection could not be closed.
    CloseFailure,
    /// The client could not be created.
    OpenFailure,
    FormatFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Generic => "generic failure",
            ErrorKind::WriteFailure => "write failure",
            ErrorKind::FlushFailure => "flush failure",
            ErrorKind::CloseFailure => "close failure",
            ErrorKind::OpenFailure => "open failure",
            ErrorKind::FormatFailure => "format failure",
        };
        f.write_str(s)
    }
}

/// Error channel of a handler.
///
/// Failures inside the handler never reach the code that emitted the log
/// record; they are routed here instead. Implementations must not log
/// through the handler they are attached to.
pub trait ErrorReporter: Send + Sync {
    fn report_error(&self, message: &str, error: Option<&(dyn Error + 'static)>, kind: ErrorKind);
}

/// Default reporter that writes failures to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrErrorReporter;

impl ErrorReporter for StderrErrorReporter {
    fn report_error(&self, message: &str, error: Option<&(dyn Error + 'static)>, kind: ErrorKind) {
        match error {
            Some(e) => eprintln!("sentry handler {}: {}: {}", kind, message, e),
            None => eprintln!("sentry handler {}: {}", kind, message),
        }
    }
}
