mod common;

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex, Weak};
use std::thread;
use std::time::Duration;

use common::{CountingFactory, RecordingClient, RecordingConnection, RecordingReporter};
use serde_json::json;
use tracing_sentry_sink::client::EventClient;
use tracing_sentry_sink::dsn::Dsn;
use tracing_sentry_sink::env::SENTRY_DSN_ENV;
use tracing_sentry_sink::error_reporter::ErrorKind;
use tracing_sentry_sink::event::{EventBuilder, EventBuilderHelper, EventLevel};
use tracing_sentry_sink::factory::{ClientError, ClientFactory, FactoryRegistry};
use tracing_sentry_sink::handler::{HandlerConfig, SentryHandler};
use tracing_sentry_sink::record::{LogRecord, Severity};

fn lazy_handler(
    factory: Arc<dyn ClientFactory>,
    reporter: Arc<RecordingReporter>,
) -> SentryHandler {
    let registry = Arc::new(FactoryRegistry::new());
    registry.register(factory);
    SentryHandler::new(HandlerConfig {
        dsn: Some("https://public@sentry.example.com/1".into()),
        ..HandlerConfig::default()
    })
    .with_registry(registry)
    .with_error_reporter(reporter)
}

#[test]
fn publishes_translated_event() {
    let client = RecordingClient::new();
    let handler = SentryHandler::with_client(client.clone());

    let record = LogRecord::new(Severity::WARN, "x={0} y={1}")
        .with_logger("billing")
        .with_source("Invoice", "total")
        .with_millis(1_650_000_000_000)
        .with_parameters(vec![json!("a"), json!(2)]);
    handler.publish(&record);

    let events = client.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.level, Some(EventLevel::Warning));
    assert_eq!(event.logger.as_deref(), Some("billing"));
    assert_eq!(event.culprit.as_deref(), Some("Invoice.total"));
    assert_eq!(event.timestamp.timestamp_millis(), 1_650_000_000_000);
    assert_eq!(event.message, None);
    assert_eq!(event.message_interface().unwrap().params, vec!["a", "2"]);
}

#[test]
fn lowest_severity_is_sent_as_debug() {
    let client = RecordingClient::new();
    let handler = SentryHandler::with_client(client.clone());

    handler.publish(&LogRecord::new(Severity::ALL, "everything"));
    handler.publish(&LogRecord::new(Severity(42), "custom"));

    let levels: Vec<_> = client.events().iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![Some(EventLevel::Debug), Some(EventLevel::Debug)]);
}

#[test]
fn filtered_records_never_reach_the_client() {
    let client = RecordingClient::new();
    let handler = SentryHandler::with_client(client.clone())
        .with_level(Severity::WARN)
        .with_filter(Arc::new(|r: &LogRecord| r.message.as_deref() != Some("skip me")));

    handler.publish(&LogRecord::new(Severity::INFO, "too quiet"));
    handler.publish(&LogRecord::new(Severity::ERROR, "skip me"));
    assert_eq!(client.sent(), 0);

    handler.publish(&LogRecord::new(Severity::ERROR, "kept"));
    assert_eq!(client.sent(), 1);
}

#[test]
fn filtered_records_do_not_build_a_client() {
    let factory = Arc::new(CountingFactory::new(RecordingClient::new()));
    let reporter = Arc::new(RecordingReporter::default());
    let handler = lazy_handler(factory.clone(), reporter.clone()).with_level(Severity::ERROR);

    handler.publish(&LogRecord::new(Severity::WARN, "below threshold"));

    assert_eq!(factory.attempts(), 0);
    assert!(reporter.kinds().is_empty());
}

#[test]
fn client_is_built_lazily_once() {
    let client = RecordingClient::new();
    let factory = Arc::new(CountingFactory::new(client.clone()));
    let handler = lazy_handler(factory.clone(), Arc::new(RecordingReporter::default()));

    assert_eq!(factory.created(), 0);
    handler.publish(&LogRecord::new(Severity::INFO, "one"));
    handler.publish(&LogRecord::new(Severity::INFO, "two"));

    assert_eq!(factory.created(), 1);
    assert_eq!(client.sent(), 2);
}

#[test]
fn concurrent_first_publish_builds_one_client() {
    let client = RecordingClient::new();
    let factory = Arc::new(CountingFactory {
        delay: Duration::from_millis(50),
        ..CountingFactory::new(client.clone())
    });
    let handler = Arc::new(lazy_handler(
        factory.clone(),
        Arc::new(RecordingReporter::default()),
    ));
    let barrier = Arc::new(Barrier::new(2));

    let workers: Vec<_> = (0..2)
        .map(|i| {
            let handler = Arc::clone(&handler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                handler.publish(&LogRecord::new(Severity::ERROR, format!("worker {}", i)));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(factory.created(), 1);
    assert_eq!(factory.attempts(), 1);
    assert_eq!(client.sent(), 2);
}

/// Factory that logs through the handler it is building a client for.
struct LoggingFactory {
    handler: Mutex<Weak<SentryHandler>>,
    client: Arc<RecordingClient>,
}

impl ClientFactory for LoggingFactory {
    fn name(&self) -> &str {
        "logging"
    }

    fn create_client(&self, _dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        let handler = self.handler.lock().unwrap().upgrade();
        if let Some(handler) = handler {
            handler.publish(&LogRecord::new(Severity::INFO, "creating client"));
        }
        Ok(self.client.clone() as Arc<dyn EventClient>)
    }
}

#[test]
fn reentrant_publish_during_construction_is_dropped() {
    let client = RecordingClient::new();
    let factory = Arc::new(LoggingFactory {
        handler: Mutex::new(Weak::new()),
        client: client.clone(),
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = Arc::new(lazy_handler(factory.clone(), reporter.clone()));
    *factory.handler.lock().unwrap() = Arc::downgrade(&handler);

    handler.publish(&LogRecord::new(Severity::ERROR, "outer"));

    let events = client.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.as_deref(), Some("outer"));
    assert!(reporter.kinds().is_empty());
}

#[test]
fn construction_failure_is_reported_and_retried() {
    let client = RecordingClient::new();
    let factory = Arc::new(CountingFactory {
        failures: 2,
        ..CountingFactory::new(client.clone())
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = lazy_handler(factory.clone(), reporter.clone());

    handler.publish(&LogRecord::new(Severity::ERROR, "lost 1"));
    handler.publish(&LogRecord::new(Severity::ERROR, "lost 2"));
    assert_eq!(client.sent(), 0);
    assert_eq!(reporter.kinds(), vec![ErrorKind::OpenFailure, ErrorKind::OpenFailure]);
    assert!(reporter.reports.lock().unwrap()[0].0.contains("service unavailable"));

    handler.publish(&LogRecord::new(Severity::ERROR, "delivered"));
    assert_eq!(factory.attempts(), 3);
    assert_eq!(factory.created(), 1);
    assert_eq!(client.sent(), 1);
}

#[test]
fn panicking_factory_is_an_open_failure_and_retried() {
    let client = RecordingClient::new();
    let factory = Arc::new(CountingFactory {
        panics: 1,
        ..CountingFactory::new(client.clone())
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = lazy_handler(factory.clone(), reporter.clone());

    handler.publish(&LogRecord::new(Severity::ERROR, "lost"));
    assert_eq!(client.sent(), 0);
    assert_eq!(reporter.kinds(), vec![ErrorKind::OpenFailure]);
    assert!(reporter.reports.lock().unwrap()[0].0.contains("factory blew up on attempt 0"));

    handler.publish(&LogRecord::new(Severity::ERROR, "delivered"));
    assert_eq!(factory.attempts(), 2);
    assert_eq!(factory.created(), 1);
    assert_eq!(client.sent(), 1);
}

#[test]
fn missing_dsn_is_an_open_failure() {
    temp_env::with_var(SENTRY_DSN_ENV, None::<&str>, || {
        let reporter = Arc::new(RecordingReporter::default());
        let handler = SentryHandler::new(HandlerConfig::default())
            .with_registry(Arc::new(FactoryRegistry::with_defaults()))
            .with_error_reporter(reporter.clone());

        handler.publish(&LogRecord::new(Severity::ERROR, "nowhere to go"));

        assert_eq!(reporter.kinds(), vec![ErrorKind::OpenFailure]);
        assert!(reporter.reports.lock().unwrap()[0].0.contains(SENTRY_DSN_ENV));
    });
}

#[test]
fn dsn_falls_back_to_environment() {
    let client = RecordingClient::new();
    let factory = Arc::new(CountingFactory::new(client.clone()));
    let registry = Arc::new(FactoryRegistry::new());
    registry.register(factory.clone());

    temp_env::with_var(SENTRY_DSN_ENV, Some("https://public@sentry.example.com/9"), || {
        let handler = SentryHandler::new(HandlerConfig {
            client_factory: Some("recording".into()),
            ..HandlerConfig::default()
        })
        .with_registry(registry.clone());

        handler.publish(&LogRecord::new(Severity::ERROR, "found it"));
    });

    assert_eq!(factory.created(), 1);
    assert_eq!(client.sent(), 1);
}

#[test]
fn unknown_factory_name_is_an_open_failure() {
    let reporter = Arc::new(RecordingReporter::default());
    let handler = SentryHandler::new(HandlerConfig {
        dsn: Some("noop://localhost".into()),
        client_factory: Some("carrier-pigeon".into()),
        ..HandlerConfig::default()
    })
    .with_registry(Arc::new(FactoryRegistry::with_defaults()))
    .with_error_reporter(reporter.clone());

    handler.publish(&LogRecord::new(Severity::ERROR, "m"));
    assert_eq!(reporter.kinds(), vec![ErrorKind::OpenFailure]);
}

#[test]
fn builder_helpers_run_before_send() {
    let helper: Arc<dyn EventBuilderHelper> = Arc::new(|b: &mut EventBuilder| {
        b.add_extra("release", json!("2.0.1"));
    });
    let client = Arc::new(RecordingClient {
        helpers: vec![helper],
        ..RecordingClient::default()
    });
    let handler = SentryHandler::with_client(client.clone());

    handler.publish(&LogRecord::new(Severity::INFO, "deployed"));

    assert_eq!(client.events()[0].extra["release"], "2.0.1");
}

#[test]
fn rejected_send_is_a_write_failure() {
    let client = Arc::new(RecordingClient {
        reject_sends: true,
        ..RecordingClient::default()
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = SentryHandler::with_client(client.clone()).with_error_reporter(reporter.clone());

    handler.publish(&LogRecord::new(Severity::ERROR, "m"));

    assert_eq!(reporter.kinds(), vec![ErrorKind::WriteFailure]);
}

#[test]
fn close_propagates_only_when_configured() {
    let client = RecordingClient::new();
    let handler = SentryHandler::with_client(client.clone());
    handler.close();
    assert_eq!(client.connection.closes.load(Ordering::SeqCst), 0);

    let handler = SentryHandler::with_client_propagating(client.clone(), true);
    handler.close();
    handler.close();
    drop(handler);
    assert_eq!(client.connection.closes.load(Ordering::SeqCst), 1);
}

/// Factory that signals when it starts and waits for a go-ahead before
/// returning its client.
struct GatedFactory {
    client: Arc<RecordingClient>,
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl ClientFactory for GatedFactory {
    fn name(&self) -> &str {
        "gated"
    }

    fn create_client(&self, _dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(self.client.clone() as Arc<dyn EventClient>)
    }
}

#[test]
fn close_during_construction_closes_the_new_client() {
    let client = RecordingClient::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let factory = Arc::new(GatedFactory {
        client: client.clone(),
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = Arc::new(lazy_handler(factory, reporter.clone()));

    let publisher = {
        let handler = Arc::clone(&handler);
        thread::spawn(move || handler.publish(&LogRecord::new(Severity::ERROR, "racing close")))
    };
    started_rx.recv().unwrap();
    handler.close();
    assert_eq!(client.connection.closes.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    publisher.join().unwrap();
    assert_eq!(client.connection.closes.load(Ordering::SeqCst), 1);

    handler.close();
    drop(handler);
    assert_eq!(client.connection.closes.load(Ordering::SeqCst), 1);
    assert!(reporter.kinds().is_empty());
}

#[test]
fn close_failure_is_reported() {
    let client = Arc::new(RecordingClient {
        connection: RecordingConnection {
            fail_close: true,
            ..RecordingConnection::default()
        },
        ..RecordingClient::default()
    });
    let reporter = Arc::new(RecordingReporter::default());
    let handler = SentryHandler::with_client_propagating(client.clone(), true)
        .with_error_reporter(reporter.clone());

    handler.close();

    assert_eq!(reporter.kinds(), vec![ErrorKind::CloseFailure]);
    assert!(reporter.reports.lock().unwrap()[0].0.contains("socket already gone"));
}

#[test]
fn close_before_first_publish_is_a_no_op() {
    let factory = Arc::new(CountingFactory::new(RecordingClient::new()));
    let reporter = Arc::new(RecordingReporter::default());
    let handler = lazy_handler(factory.clone(), reporter.clone());

    handler.flush();
    handler.close();

    assert_eq!(factory.attempts(), 0);
    assert!(reporter.kinds().is_empty());
}
