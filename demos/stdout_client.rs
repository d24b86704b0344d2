use std::io;
use tracing::{error, info, info_span, warn};

use tracing_sentry_sink::handler::HandlerConfig;
use tracing_sentry_sink::init::{init_tracing_with_config, LayerConfig};

fn main() {
    let config = LayerConfig {
        handler: HandlerConfig {
            dsn: Some("stdout://".to_string()),
            ..HandlerConfig::default()
        },
        enable_stdout: false,
    };
    let _guard = match init_tracing_with_config(config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    info!("starting service");

    let span = info_span!("authenticate");
    let _entered = span.enter();
    warn!(user_id = 42, attempts = 3, "too many attempts");

    let err = io::Error::new(io::ErrorKind::PermissionDenied, "token expired");
    error!(error = &err as &(dyn std::error::Error + 'static), "authentication failed");
}
