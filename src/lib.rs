pub mod record;
pub mod event;
pub mod client;
pub mod noop_client;

#[cfg(feature = "console")]
pub mod stdout_client;

pub mod dsn;
pub mod env;
pub mod error_reporter;
pub mod factory;
pub mod handler;
pub mod layer;
pub mod init;
