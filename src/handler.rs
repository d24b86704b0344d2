use crate::client::EventClient;
use crate::dsn::Dsn;
use crate::env::{
    env_opt, env_or, SENTRY_CLIENT_FACTORY_ENV, SENTRY_DSN_ENV, SENTRY_LEVEL_ENV,
    SENTRY_PROPAGATE_CLOSE_ENV,
};
use crate::error_reporter::{ErrorKind, ErrorReporter, StderrErrorReporter};
use crate::event::{
    EventBuilder, EventLevel, ExceptionInterface, MessageInterface, SentryInterface, StackFrame,
};
use crate::factory::{ClientError, FactoryRegistry};
use crate::record::{LogRecord, Severity};
use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Extra predicate a record must pass to be forwarded.
pub type RecordFilter = Arc<dyn Fn(&LogRecord) -> bool + Send + Sync>;

/// Settings of a lazily initialized [`SentryHandler`].
///
/// **Fields**
/// - `dsn`: service endpoint. When `None` the handler looks up
///   `SENTRY_DSN` the first time it needs a client.
/// - `client_factory`: name of the factory to build the client with.
///   When `None` every registered factory is tried in order.
/// - `propagate_close`: close the client connection when the handler
///   is closed.
/// - `level`: minimum severity forwarded.
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    pub dsn: Option<String>,
    pub client_factory: Option<String>,
    pub propagate_close: bool,
    pub level: Severity,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            client_factory: None,
            propagate_close: true,
            level: Severity::ALL,
        }
    }
}

impl HandlerConfig {
    /// Config read from the `SENTRY_*` variables in [`crate::env`].
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dsn: env_opt(SENTRY_DSN_ENV),
            client_factory: env_opt(SENTRY_CLIENT_FACTORY_ENV),
            propagate_close: env_or(SENTRY_PROPAGATE_CLOSE_ENV, "true")
                .trim()
                .parse::<bool>()
                .unwrap_or(defaults.propagate_close),
            level: env_opt(SENTRY_LEVEL_ENV)
                .and_then(|v| v.parse::<Severity>().ok())
                .unwrap_or(defaults.level),
        }
    }
}

enum ClientState {
    Uninitialized,
    /// A client is being built by the given thread.
    Initializing(ThreadId),
    Ready(Arc<dyn EventClient>),
    /// The last attempt failed; the next publish retries.
    Failed,
}

/// Handler translating [`LogRecord`]s into events for an [`EventClient`].
///
/// The client is either supplied up front or built on first use from
/// the handler's DSN through a [`FactoryRegistry`]. Every failure is
/// routed to the handler's [`ErrorReporter`]; `publish` and `close`
/// never panic or return errors to the logging call site.
pub struct SentryHandler {
    dsn: Option<String>,
    client_factory: Option<String>,
    propagate_close: bool,
    level: Severity,
    filter: Option<RecordFilter>,
    registry: Arc<FactoryRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    state: Mutex<ClientState>,
    state_changed: Condvar,
    closed: AtomicBool,
}

impl SentryHandler {
    /// Handler that builds its client lazily from `config`.
    pub fn new(config: HandlerConfig) -> Self {
        Self::from_parts(config, ClientState::Uninitialized)
    }

    /// Handler around an existing client. The client's connection is
    /// left open when the handler closes.
    pub fn with_client(client: Arc<dyn EventClient>) -> Self {
        Self::with_client_propagating(client, false)
    }

    pub fn with_client_propagating(client: Arc<dyn EventClient>, propagate_close: bool) -> Self {
        let config = HandlerConfig {
            propagate_close,
            ..HandlerConfig::default()
        };
        Self::from_parts(config, ClientState::Ready(client))
    }

    fn from_parts(config: HandlerConfig, state: ClientState) -> Self {
        SentryHandler {
            dsn: config.dsn,
            client_factory: config.client_factory,
            propagate_close: config.propagate_close,
            level: config.level,
            filter: None,
            registry: FactoryRegistry::global(),
            reporter: Arc::new(StderrErrorReporter),
            state: Mutex::new(state),
            state_changed: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Resolve clients through `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<FactoryRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    /// Whether `record` passes the level threshold and the filter.
    pub fn is_loggable(&self, record: &LogRecord) -> bool {
        if self.level == Severity::OFF || record.level < self.level {
            return false;
        }
        self.filter.as_ref().map_or(true, |filter| filter(record))
    }

    /// Forward one record.
    ///
    /// Unloggable records are dropped before anything else happens. A
    /// record published by the thread that is currently building the
    /// client (for example because a factory logs) is dropped as well.
    pub fn publish(&self, record: &LogRecord) {
        if !self.is_loggable(record) {
            return;
        }

        let client = match self.client() {
            Ok(Some(client)) => client,
            Ok(None) => return,
            Err(e) => {
                self.report(
                    "an error occurred while creating the event client",
                    &e,
                    ErrorKind::OpenFailure,
                );
                return;
            }
        };

        let mut builder = event_builder(record);
        client.run_builder_helpers(&mut builder);

        if let Err(e) = client.send_event(builder.build()) {
            self.report("the event client rejected an event", &*e, ErrorKind::WriteFailure);
        }
    }

    /// Nothing is buffered here; clients flush on their own.
    pub fn flush(&self) {}

    /// Close the client connection if close propagation is enabled and
    /// a client exists. Only the first call has an effect.
    ///
    /// A client still being built when `close` runs is closed by the
    /// thread building it, right after it becomes ready.
    pub fn close(&self) {
        let client = {
            let state = self.lock_state();
            if self.closed.swap(true, Ordering::SeqCst) || !self.propagate_close {
                return;
            }
            match &*state {
                ClientState::Ready(client) => Some(Arc::clone(client)),
                _ => None,
            }
        };

        if let Some(client) = client {
            self.close_connection(&*client);
        }
    }

    fn close_connection(&self, client: &dyn EventClient) {
        if let Err(e) = client.connection().close() {
            self.report(
                "an error occurred while closing the client connection",
                &e,
                ErrorKind::CloseFailure,
            );
        }
    }

    fn report(&self, message: &str, error: &(dyn Error + 'static), kind: ErrorKind) {
        self.reporter.report_error(message, Some(error), kind);
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: ClientState) {
        *self.lock_state() = next;
        self.state_changed.notify_all();
    }

    /// Current client, building it if needed.
    ///
    /// **Returns**
    /// - `Ok(Some(client))` once a client exists.
    /// - `Ok(None)` when called re-entrantly by the initializing thread.
    /// - `Err(..)` when this call tried to build the client and failed.
    fn client(&self) -> Result<Option<Arc<dyn EventClient>>, ClientError> {
        let current = thread::current().id();
        let mut state = self.lock_state();
        loop {
            let may_initialize = match &*state {
                ClientState::Ready(client) => return Ok(Some(Arc::clone(client))),
                ClientState::Initializing(owner) if *owner == current => return Ok(None),
                ClientState::Initializing(_) => false,
                ClientState::Uninitialized | ClientState::Failed => true,
            };
            if may_initialize {
                break;
            }
            state = self
                .state_changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = ClientState::Initializing(current);
        drop(state);

        // The factory runs without the lock so that it may log.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.create_client()))
            .unwrap_or_else(|payload| Err(ClientError::Panicked(panic_message(&*payload))));

        let client = match result {
            Ok(client) => client,
            Err(e) => {
                self.transition(ClientState::Failed);
                return Err(e);
            }
        };

        // `closed` is read under the state lock, so a concurrent `close`
        // either sees `Ready` or leaves the connection to us.
        let close_now = {
            let mut state = self.lock_state();
            *state = ClientState::Ready(Arc::clone(&client));
            self.propagate_close && self.closed.load(Ordering::SeqCst)
        };
        self.state_changed.notify_all();
        if close_now {
            self.close_connection(&*client);
        }
        Ok(Some(client))
    }

    fn create_client(&self) -> Result<Arc<dyn EventClient>, ClientError> {
        let dsn = match &self.dsn {
            Some(dsn) => dsn.clone(),
            None => Dsn::lookup()?,
        };
        let dsn = Dsn::parse(&dsn)?;
        self.registry.resolve(&dsn, self.client_factory.as_deref())
    }
}

impl Drop for SentryHandler {
    fn drop(&mut self) {
        self.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Event level for a record severity.
///
/// [`Severity::ALL`] is the lowest threshold, so every ordinal down to
/// `i32::MIN` maps to a level and anything below [`Severity::INFO`] is
/// debug.
pub fn map_level(severity: Severity) -> Option<EventLevel> {
    if severity >= Severity::ERROR {
        Some(EventLevel::Error)
    } else if severity >= Severity::WARN {
        Some(EventLevel::Warning)
    } else if severity >= Severity::INFO {
        Some(EventLevel::Info)
    } else if severity >= Severity::ALL {
        Some(EventLevel::Debug)
    } else {
        None
    }
}

fn format_parameters(parameters: &[serde_json::Value]) -> Vec<String> {
    parameters
        .iter()
        .map(|p| match p {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Translate a record into an event builder. Builder helpers have not
/// run yet.
pub fn event_builder(record: &LogRecord) -> EventBuilder {
    let mut builder = EventBuilder::new();
    builder
        .set_level(map_level(record.level))
        .set_timestamp_millis(record.millis)
        .set_logger(record.logger_name.clone());

    match (&record.source_class_name, &record.source_method_name) {
        (Some(class), Some(method)) => {
            builder.set_culprit_frame(&StackFrame::new(class.as_str(), method.as_str()));
        }
        _ => {
            builder.set_culprit(record.logger_name.clone());
        }
    }

    if let Some(thrown) = &record.thrown {
        builder.add_interface(SentryInterface::Exception(ExceptionInterface::from(thrown)));
    }

    match &record.parameters {
        Some(parameters) => {
            builder.add_interface(SentryInterface::Message(MessageInterface::new(
                record.message.clone().unwrap_or_default(),
                format_parameters(parameters),
            )));
        }
        None => {
            builder.set_message(record.message.clone());
        }
    }

    for (key, value) in &record.fields {
        builder.add_extra(key.clone(), value.clone());
    }

    builder
}
