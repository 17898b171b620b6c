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

//! Bot API adapter: outbound chat transport, update long-polling, and chunked
//! uploads to the storage chat.
//!
//! Layout: `api.rs` (wire types), `client.rs` (method calls), `transport.rs`
//! (`ChatTransport`), `updates.rs` (inbound mapping), `uploader.rs`
//! (`StorageUploader`).

pub mod api;
pub mod client;
pub mod error;
pub mod transport;
pub mod updates;
pub mod uploader;

pub use client::BotClient;
pub use error::{TelegramError, TelegramResult};
pub use transport::TelegramTransport;
pub use updates::{InboundUpdate, UpdatePoller};
pub use uploader::BotUploader;
