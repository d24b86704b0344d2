use crate::event::{Event, EventBuilder, EventBuilderHelper};
use std::error::Error;
use std::io;
use std::sync::Arc;

/// Underlying channel of an [`EventClient`].
pub trait Connection: Send + Sync {
    /// Release the connection. Called once when the owning handler is
    /// closed with close propagation enabled.
    fn close(&self) -> io::Result<()>;
}

/// Destination for [`Event`]s built by the handler.
///
/// Implementations own everything past event construction: queuing,
/// serialization, transport and retries. The handler calls `send_event`
/// synchronously on the thread that emitted the log record, so
/// implementations should hand the event off quickly.
pub trait EventClient: Send + Sync {
    /// Submit a finished event.
    ///
    /// **Returns**
    /// - `Ok(())` if the client accepted the event.
    /// - `Err(..)` if it was rejected. The handler reports the error as a
    ///   write failure and moves on; it never retries.
    fn send_event(&self, event: Event) -> Result<(), Box<dyn Error + Send + Sync>>;

    fn connection(&self) -> &dyn Connection;

    /// Hooks run over every event before it is built. Default is none.
    fn builder_helpers(&self) -> Vec<Arc<dyn EventBuilderHelper>> {
        Vec::new()
    }

    fn run_builder_helpers(&self, builder: &mut EventBuilder) {
        for helper in self.builder_helpers() {
            helper.help_building_event(builder);
        }
    }
}

/// Connection that has nothing to release.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnection;

impl Connection for NoopConnection {
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}
