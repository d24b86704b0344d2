use crate::client::{Connection, EventClient};
use crate::event::{Event, EventBuilderHelper};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

/// Connection to the process stdout. Closing flushes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConnection;

impl Connection for StdoutConnection {
    fn close(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Debugging client that prints each event as one JSON line on stdout.
///
/// Selected by `stdout://` and `console://` DSNs.
#[derive(Clone, Default)]
pub struct StdoutClient {
    connection: StdoutConnection,
    helpers: Vec<Arc<dyn EventBuilderHelper>>,
}

impl StdoutClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run over every event before it is printed.
    pub fn with_helper(mut self, helper: Arc<dyn EventBuilderHelper>) -> Self {
        self.helpers.push(helper);
        self
    }
}

impl EventClient for StdoutClient {
    fn send_event(&self, event: Event) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = serde_json::to_string(&event)?;
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)?;
        Ok(())
    }

    fn connection(&self) -> &dyn Connection {
        &self.connection
    }

    fn builder_helpers(&self) -> Vec<Arc<dyn EventBuilderHelper>> {
        self.helpers.clone()
    }
}
