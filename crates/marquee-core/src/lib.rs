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

//! Transport-agnostic domain types and the traits implemented at every I/O edge.
//!
//! Adapters (record stores, the chat transport, search providers, fetch
//! clients, storage uploaders) live in other crates and only meet the
//! dispatcher, worker, and reconciler through the traits declared here.

pub mod error;
pub mod model;
pub mod service;

pub use error::{CoreError, CoreResult};
pub use model::{
    Button, Candidate, ChatId, ContentLocator, DeliveryState, JobRecord, MediaKind, NewJobRecord,
    PENDING_QUALITY, Promotion, READY_QUALITY, Reply, StorageEvent, StoredMedia, UploadCaption,
    UploadReceipt, WorkerOutcome, WorkerRequest,
};
pub use service::{ChatTransport, JobRecordStore, PayloadFetcher, SearchProvider, StorageUploader};
