pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Args;

pub use adapters::forwarder::HttpForwarder;
pub use adapters::http::{build_router, serve, AppState};
pub use config::AppConfig;
pub use core::{engine::BatchEngine, transform::UserTransformer};
pub use utils::error::{RelayError, Result};
