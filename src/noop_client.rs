use crate::client::{Connection, EventClient, NoopConnection};
use crate::event::Event;
use std::error::Error;

/// A client that simply drops all events.
///
/// Selected by `noop://` DSNs. Useful for disabling reporting in an
/// environment without touching logging setup, and for tests that only
/// care about the handler itself.
#[derive(Clone, Default)]
pub struct NoopClient {
    connection: NoopConnection,
}

impl EventClient for NoopClient {
    fn send_event(&self, _event: Event) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn connection(&self) -> &dyn Connection {
        &self.connection
    }
}
