use crate::handler::{HandlerConfig, SentryHandler};
use crate::layer::SentryLayer;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global subscriber installed by this crate.
///
/// **Fields**
/// - `handler`: [`HandlerConfig`] of the [`SentryHandler`] behind the layer.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`SentryLayer`] so events are also printed locally.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub handler: HandlerConfig,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            handler: HandlerConfig::default(),
            enable_stdout: true,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Keeps the installed handler reachable and closes it when dropped.
///
/// Hold it for the lifetime of the program, typically in `main`.
#[must_use = "dropping the guard closes the handler"]
pub struct HandlerGuard {
    handler: Arc<SentryHandler>,
}

impl HandlerGuard {
    pub fn handler(&self) -> &Arc<SentryHandler> {
        &self.handler
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.handler.flush();
        self.handler.close();
    }
}

/// Install a [`Registry`] with a [`SentryLayer`] around `handler` as the
/// global default subscriber.
pub fn init_tracing_with_handler(
    handler: Arc<SentryHandler>,
    enable_stdout: bool,
) -> Result<HandlerGuard, InitError> {
    let layer = SentryLayer::new(Arc::clone(&handler));

    // The two subscriber shapes have different types, hence two calls.
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(HandlerGuard { handler })
}

/// Initialize global `tracing` with a lazily built [`SentryHandler`].
///
/// **Parameters**
/// - `config`: [`LayerConfig`] with the handler settings.
///
/// **Returns**
/// - a [`HandlerGuard`] closing the handler when dropped.
/// - `Err(InitError)` if another global subscriber was set first.
pub fn init_tracing_with_config(config: LayerConfig) -> Result<HandlerGuard, InitError> {
    let handler = Arc::new(SentryHandler::new(config.handler));
    init_tracing_with_handler(handler, config.enable_stdout)
}

/// Initialize tracing from the `SENTRY_*` environment variables.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`HandlerConfig::from_env`] and stdout output enabled.
pub fn init_tracing() -> Result<HandlerGuard, InitError> {
    init_tracing_with_config(LayerConfig {
        handler: HandlerConfig::from_env(),
        ..LayerConfig::default()
    })
}
