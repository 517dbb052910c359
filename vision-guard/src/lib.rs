pub mod auth;
pub mod config;
pub mod detect;
pub mod storage;
pub mod web;

use tracing_subscriber::EnvFilter;

/// Install the global log subscriber, honouring `RUST_LOG`.
pub fn log_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,actix_web=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
