#![allow(dead_code)]

use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing_sentry_sink::client::{Connection, EventClient};
use tracing_sentry_sink::dsn::Dsn;
use tracing_sentry_sink::error_reporter::{ErrorKind, ErrorReporter};
use tracing_sentry_sink::event::{Event, EventBuilderHelper};
use tracing_sentry_sink::factory::{ClientError, ClientFactory};

#[derive(Default)]
pub struct RecordingConnection {
    pub closes: AtomicUsize,
    pub fail_close: bool,
}

impl Connection for RecordingConnection {
    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket already gone"))
        } else {
            Ok(())
        }
    }
}

/// Client that keeps every event it receives.
#[derive(Default)]
pub struct RecordingClient {
    pub events: Mutex<Vec<Event>>,
    pub connection: RecordingConnection,
    pub helpers: Vec<Arc<dyn EventBuilderHelper>>,
    pub reject_sends: bool,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn sent(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventClient for RecordingClient {
    fn send_event(&self, event: Event) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.reject_sends {
            return Err("queue full".into());
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    fn connection(&self) -> &dyn Connection {
        &self.connection
    }

    fn builder_helpers(&self) -> Vec<Arc<dyn EventBuilderHelper>> {
        self.helpers.clone()
    }
}

/// Error channel that keeps every report.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, ErrorKind)>>,
}

impl RecordingReporter {
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports.lock().unwrap().iter().map(|(_, k)| *k).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report_error(&self, message: &str, error: Option<&(dyn Error + 'static)>, kind: ErrorKind) {
        let text = match error {
            Some(e) => format!("{}: {}", message, e),
            None => message.to_string(),
        };
        self.reports.lock().unwrap().push((text, kind));
    }
}

/// Factory handing out one shared recording client, optionally panicking
/// on the first `panics` attempts, failing the next `failures` ones and
/// sleeping before each creation.
pub struct CountingFactory {
    pub client: Arc<RecordingClient>,
    pub created: AtomicUsize,
    pub attempts: AtomicUsize,
    pub panics: usize,
    pub failures: usize,
    pub delay: Duration,
}

impl CountingFactory {
    pub fn new(client: Arc<RecordingClient>) -> Self {
        CountingFactory {
            client,
            created: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            panics: 0,
            failures: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ClientFactory for CountingFactory {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_client(&self, _dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if attempt < self.panics {
            panic!("factory blew up on attempt {}", attempt);
        }
        if attempt < self.panics + self.failures {
            return Err(ClientError::Creation {
                factory: "recording".into(),
                source: "service unavailable".into(),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone() as Arc<dyn EventClient>)
    }
}
