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

//! Marquee service: lookup front-end, job dispatch, and reconciliation.
//!
//! Layout: `lookup.rs` and `pagination.rs` (user interaction), `cache.rs`
//! (result cache), `dispatcher.rs` (worker supervision), `reconciler.rs`
//! (storage feed), `search.rs` (indexer client), `router.rs` (update
//! routing), `http.rs` (ops listener), `bootstrap.rs` (wiring).

/// Service bootstrap and the poll loop.
pub mod bootstrap;
/// Process-local result cache.
pub mod cache;
/// Worker spawning and supervision.
pub mod dispatcher;
/// Application error types.
pub mod error;
/// Health and metrics endpoints.
pub mod http;
/// Query handling and result selection.
pub mod lookup;
/// Result pages and button payloads.
pub mod pagination;
/// Storage feed reconciliation.
pub mod reconciler;
/// Inbound update routing.
pub mod router;
/// Indexer search provider.
pub mod search;

pub use bootstrap::run_app;
pub use cache::{ResultCache, SearchSession};
pub use dispatcher::{Dispatcher, JobHandle, JobSubmitter, ProcessLauncher};
pub use error::{AppError, AppResult};
pub use lookup::{LookupFrontEnd, LookupOutcome, LookupSettings};
pub use pagination::{CallbackAction, PageView};
pub use reconciler::{Reconciler, Reconciliation};
pub use router::UpdateRouter;
pub use search::JackettProvider;
