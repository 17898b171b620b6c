//! Fallback values applied when optional variables are unset.

pub(crate) const TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub(crate) const SEARCH_CATEGORY: &str = "All";
pub(crate) const SEARCH_LIMIT: usize = 20;
pub(crate) const MAX_SEARCH_LIMIT: usize = 100;
pub(crate) const MAX_CONCURRENT_WORKERS: usize = 2;
pub(crate) const MAX_CONCURRENT_WORKERS_CEILING: usize = 64;
pub(crate) const DOWNLOAD_DIR: &str = "./downloads";
pub(crate) const FETCH_COMMAND: &str = "aria2c";
pub(crate) const FETCH_ARGS: &str = "--seed-time=0 --summary-interval=0 --console-log-level=warn";
pub(crate) const LOG_LEVEL: &str = "info";
pub(crate) const WORKER_BINARY: &str = "marquee-worker";
