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

//! Job record persistence: Postgres migrations and queries plus an in-memory store.

pub mod error;
pub mod memory;
pub mod records;

pub use error::{DataError, Result as DataResult};
pub use memory::MemoryJobStore;
pub use records::PgJobStore;
