pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod nlq;
pub mod providers;
pub mod server;
pub mod sqlguard;
pub mod vector;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Note: This function can only be called once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
