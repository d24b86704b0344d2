use std::error::Error;
use std::sync::Arc;

use tracing::{error, info};
use tracing_sentry_sink::client::{Connection, EventClient, NoopConnection};
use tracing_sentry_sink::dsn::Dsn;
use tracing_sentry_sink::event::Event;
use tracing_sentry_sink::factory::{ClientError, ClientFactory, FactoryRegistry};
use tracing_sentry_sink::handler::HandlerConfig;
use tracing_sentry_sink::init::{init_tracing_with_config, LayerConfig};

/// Example of plugging in a custom transport by implementing
/// `EventClient` and registering a factory for its DSN scheme. Imagine
/// this talks to an in-house collector.
struct CollectorClient {
    endpoint: String,
    connection: NoopConnection,
}

impl EventClient for CollectorClient {
    fn send_event(&self, event: Event) -> Result<(), Box<dyn Error + Send + Sync>> {
        // A real client would queue the event for a background sender.
        println!("[collector {}] {:?} {:?}", self.endpoint, event.level, event.message);
        Ok(())
    }

    fn connection(&self) -> &dyn Connection {
        &self.connection
    }
}

struct CollectorFactory;

impl ClientFactory for CollectorFactory {
    fn name(&self) -> &str {
        "collector"
    }

    fn create_client(&self, dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        if dsn.protocol != "collector" {
            return Err(ClientError::Unsupported {
                factory: self.name().to_string(),
                dsn: dsn.to_string(),
            });
        }
        Ok(Arc::new(CollectorClient {
            endpoint: format!("{}:{}", dsn.host, dsn.port.unwrap_or(4000)),
            connection: NoopConnection,
        }))
    }
}

fn main() {
    FactoryRegistry::global().register(Arc::new(CollectorFactory));

    let config = LayerConfig {
        handler: HandlerConfig {
            dsn: Some("collector://key@127.0.0.1:4100/7".to_string()),
            ..HandlerConfig::default()
        },
        ..LayerConfig::default()
    };
    let _guard = match init_tracing_with_config(config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    info!("custom client example started");
    error!(db = "orders", "simulated error sent via custom client");
}
