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

//! The fetch-and-deliver worker.
//!
//! One process per job: connect to the storage chat, materialize the payload,
//! pick the largest media file, upload it, record a pending job record, clean
//! up, and print exactly one terminal message on stdout.

pub mod error;
pub mod fetch;
pub mod invocation;
pub mod protocol;
pub mod select;
pub mod state;

pub use error::{WorkerError, WorkerResult};
pub use fetch::CommandFetcher;
pub use invocation::{WorkerArgs, run_job};
pub use protocol::emit;
pub use select::{MEDIA_EXTENSIONS, SelectedFile, select_largest_media};
pub use state::{JobContext, JobRun, WorkerState};
