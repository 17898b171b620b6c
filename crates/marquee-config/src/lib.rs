#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-driven configuration for the service and its workers.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment and `.env`
//! loading), `validate.rs` (parsing helpers), `defaults.rs` (fallback values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_dotenv, load_service_config, load_worker_config};
pub use model::{
    DispatchSettings, FetchSettings, LogStyle, LoggingSettings, ReconcileStrategy, SearchSettings,
    ServiceConfig, WorkerConfig,
};
