use crate::client::EventClient;
use crate::dsn::{Dsn, DsnError};
use crate::noop_client::NoopClient;
use once_cell::sync::Lazy;
use std::error::Error;
use std::sync::{Arc, PoisonError, RwLock};

/// Error type returned when building a client from configuration.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Dsn(#[from] DsnError),

    #[error("no client factory named `{0}` is registered")]
    UnknownFactory(String),

    #[error("no registered client factory accepts DSN `{0}`")]
    NoFactory(String),

    #[error("client factory `{factory}` does not accept DSN `{dsn}`")]
    Unsupported { factory: String, dsn: String },

    #[error("client construction panicked: {0}")]
    Panicked(String),

    #[error("client factory `{factory}` failed: {source}")]
    Creation {
        factory: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Creates [`EventClient`]s for the DSNs it understands.
pub trait ClientFactory: Send + Sync {
    /// Name used to select this factory explicitly.
    fn name(&self) -> &str;

    /// **Returns**
    /// - `Ok(client)` when the factory handles this DSN.
    /// - `Err(ClientError::Unsupported { .. })` when it does not, so the
    ///   registry can try the next factory.
    /// - any other error when creation itself failed.
    fn create_client(&self, dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError>;
}

/// Factory for `noop://` DSNs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClientFactory;

impl ClientFactory for NoopClientFactory {
    fn name(&self) -> &str {
        "noop"
    }

    fn create_client(&self, dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        if dsn.protocol == "noop" {
            Ok(Arc::new(NoopClient::default()) as Arc<dyn EventClient>)
        } else {
            Err(unsupported(self, dsn))
        }
    }
}

/// Factory for `stdout://` and `console://` DSNs.
#[cfg(feature = "console")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutClientFactory;

#[cfg(feature = "console")]
impl ClientFactory for StdoutClientFactory {
    fn name(&self) -> &str {
        "stdout"
    }

    fn create_client(&self, dsn: &Dsn) -> Result<Arc<dyn EventClient>, ClientError> {
        match dsn.protocol.as_str() {
            "stdout" | "console" => {
                Ok(Arc::new(crate::stdout_client::StdoutClient::new()) as Arc<dyn EventClient>)
            }
            _ => Err(unsupported(self, dsn)),
        }
    }
}

fn unsupported(factory: &dyn ClientFactory, dsn: &Dsn) -> ClientError {
    ClientError::Unsupported {
        factory: factory.name().to_string(),
        dsn: dsn.to_string(),
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<FactoryRegistry>> =
    Lazy::new(|| Arc::new(FactoryRegistry::with_defaults()));

/// Ordered set of [`ClientFactory`]s used to resolve a DSN into a client.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<Vec<Arc<dyn ClientFactory>>>,
}

impl FactoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in factories.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(NoopClientFactory));
        #[cfg(feature = "console")]
        registry.register(Arc::new(StdoutClientFactory));
        registry
    }

    /// Process-wide registry used by handlers that were not given one.
    pub fn global() -> Arc<FactoryRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Append a factory. A factory with an already registered name
    /// replaces the old one in place.
    pub fn register(&self, factory: Arc<dyn ClientFactory>) {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        match factories.iter().position(|f| f.name() == factory.name()) {
            Some(idx) => factories[idx] = factory,
            None => factories.push(factory),
        }
    }

    pub fn factory_names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Build a client for `dsn`.
    ///
    /// With `factory_name` the named factory is used and its error is
    /// returned as is. Without it, factories are tried in registration
    /// order and the first one that accepts the DSN wins; creation
    /// failures other than "unsupported" stop the search.
    pub fn resolve(
        &self,
        dsn: &Dsn,
        factory_name: Option<&str>,
    ) -> Result<Arc<dyn EventClient>, ClientError> {
        // Clone the list so factories can run without holding the lock.
        let factories = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(name) = factory_name {
            let factory = factories
                .iter()
                .find(|f| f.name() == name)
                .ok_or_else(|| ClientError::UnknownFactory(name.to_string()))?;
            return factory.create_client(dsn);
        }

        for factory in &factories {
            match factory.create_client(dsn) {
                Ok(client) => return Ok(client),
                Err(ClientError::Unsupported { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::NoFactory(dsn.to_string()))
    }
}
