//! Command-line contract and environment wiring for the worker binary.

use std::time::Duration;

use clap::Parser;
use marquee_config::WorkerConfig;
use marquee_core::{ChatId, ContentLocator, WorkerOutcome, WorkerRequest};
use marquee_data::PgJobStore;
use marquee_telegram::{BotClient, BotUploader};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use uuid::Uuid;

use crate::fetch::CommandFetcher;
use crate::state::{JobContext, JobRun};

const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments passed by the dispatcher.
#[derive(Debug, Clone, Parser)]
#[command(name = "marquee-worker", about = "Fetch one payload and upload it to the storage chat")]
pub struct WorkerArgs {
    /// Job identifier minted by the dispatcher.
    #[arg(long)]
    pub job_id: Uuid,
    /// Chat that requested the payload.
    #[arg(long, allow_negative_numbers = true)]
    pub requester: i64,
    /// Display title.
    #[arg(long)]
    pub title: String,
    /// Content locator (magnet or URL).
    #[arg(long)]
    pub locator: String,
}

impl WorkerArgs {
    /// Convert into a request.
    ///
    /// # Errors
    ///
    /// Returns an error when the locator is neither a magnet nor an http(s) URL.
    pub fn into_request(self) -> anyhow::Result<WorkerRequest> {
        Ok(WorkerRequest {
            job_id: self.job_id,
            locator: ContentLocator::from_resolved(&self.locator)?,
            requester: ChatId(self.requester),
            title: self.title,
        })
    }
}

/// Build the production collaborators from `config` and run the job.
pub async fn run_job(config: WorkerConfig, request: WorkerRequest) -> WorkerOutcome {
    let client = match BotClient::new(&config.telegram_api_url, &config.uploader_token) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build bot client");
            return WorkerOutcome::error(format!("connect failed: {err}"));
        }
    };
    let uploader = BotUploader::new(client, ChatId(config.storage_channel_id));
    let pool = match PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect_lazy(&config.database_url)
    {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "invalid database url");
            return WorkerOutcome::error(format!("record failed: {err}"));
        }
    };
    let store = PgJobStore::attach(pool.clone());
    let fetcher = CommandFetcher::from_settings(&config.fetch);

    info!(job_id = %request.job_id, requester = %request.requester, title = %request.title, "worker job starting");
    let run = JobRun::new(
        request,
        JobContext {
            uploader: &uploader,
            fetcher: &fetcher,
            store: &store,
            download_root: config.download_dir.clone(),
        },
    );
    let outcome = run.run().await;
    pool.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_arguments_parse_into_a_request() -> anyhow::Result<()> {
        let job_id = Uuid::new_v4();
        let magnet = format!("magnet:?xt=urn:btih:{}", "c".repeat(40));
        let request = WorkerRequest {
            job_id,
            locator: ContentLocator::Magnet(magnet.clone()),
            requester: ChatId(-100_123),
            title: "User Link Download".into(),
        };
        let mut argv = vec!["marquee-worker".to_string()];
        argv.extend(request.to_args());

        let parsed = WorkerArgs::try_parse_from(argv)?.into_request()?;
        assert_eq!(parsed, request);
        Ok(())
    }

    #[test]
    fn hyphen_leading_title_survives_the_argument_contract() -> anyhow::Result<()> {
        let request = WorkerRequest::new(
            ContentLocator::Url("https://tracker.example/t/42.torrent".into()),
            ChatId(-7),
            "-=Interstellar=- 1080p",
        );
        let mut argv = vec!["marquee-worker".to_string()];
        argv.extend(request.to_args());

        let parsed = WorkerArgs::try_parse_from(argv)?.into_request()?;
        assert_eq!(parsed.title, "-=Interstellar=- 1080p");
        assert_eq!(parsed, request);
        Ok(())
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(WorkerArgs::try_parse_from(["marquee-worker", "--title", "x"]).is_err());
    }
}
