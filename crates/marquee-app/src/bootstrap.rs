//! Service boot sequence: configuration, adapters, background tasks, poll loop.

use std::sync::Arc;
use std::time::Duration;

use marquee_config::{LogStyle, LoggingSettings, ServiceConfig, load_service_config};
use marquee_core::{ChatId, JobRecordStore};
use marquee_data::PgJobStore;
use marquee_events::EventBus;
use marquee_telegram::updates::DEFAULT_POLL_TIMEOUT_SECS;
use marquee_telegram::{BotClient, TelegramTransport, UpdatePoller};
use marquee_telemetry::{LogFormat, LogTarget, LoggingConfig, Metrics, build_sha, init_logging};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::dispatcher::{Dispatcher, ProcessLauncher};
use crate::error::{AppError, AppResult};
use crate::http;
use crate::lookup::{LookupFrontEnd, LookupSettings};
use crate::reconciler::Reconciler;
use crate::router::UpdateRouter;
use crate::search::JackettProvider;

const MAX_DB_CONNECTIONS: u32 = 5;
const STORAGE_FEED_CAPACITY: usize = 64;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);
const HANDLER_GRACE: Duration = Duration::from_secs(5);

/// Dependencies required to bootstrap the service.
pub(crate) struct BootstrapDependencies {
    config: ServiceConfig,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            load_service_config().map_err(|err| AppError::config("load_service_config", err))?;
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            events: EventBus::new(),
            metrics,
        })
    }
}

/// Entry point for the service boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, the database, or the Bot API cannot be
/// initialised.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence over injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        events,
        metrics,
    } = dependencies;

    init_logging(&logging_config(&config.logging))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(
        strategy = config.reconcile_strategy.as_str(),
        max_workers = config.dispatch.max_concurrent_workers,
        "marquee bootstrap starting"
    );

    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .map_err(|source| AppError::Database {
            operation: "pool.connect",
            source,
        })?;
    let store: Arc<dyn JobRecordStore> =
        Arc::new(PgJobStore::new(pool).await.map_err(|source| AppError::Data {
            operation: "job_store.new",
            source,
        })?);

    let client = BotClient::new(&config.telegram_api_url, &config.bot_token)
        .map_err(|err| AppError::telegram("bot_client.new", err))?;
    let me = client
        .get_me()
        .await
        .map_err(|err| AppError::telegram("bot_client.get_me", err))?;
    info!(bot = me.username.as_deref().unwrap_or("unknown"), "bot identity verified");

    let transport = Arc::new(TelegramTransport::new(client.clone()));
    let storage = ChatId(config.storage_channel_id);
    let dispatcher = Dispatcher::new(
        ProcessLauncher::new(config.dispatch.worker_bin.clone()),
        transport.clone(),
        storage,
        config.dispatch.max_concurrent_workers,
        events.clone(),
        metrics.clone(),
    );

    let (feed, feed_receiver) = mpsc::channel(STORAGE_FEED_CAPACITY);
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        storage,
        config.uploader_id,
        config.reconcile_strategy,
        events.clone(),
        metrics.clone(),
    )
    .spawn(feed_receiver);

    let front = LookupFrontEnd::new(
        store,
        Arc::new(JackettProvider::new(&config.search)?),
        transport,
        Arc::new(dispatcher),
        LookupSettings {
            category: config.search.category.clone(),
            limit: config.search.limit,
            storage,
        },
        metrics.clone(),
    );
    let mut router = UpdateRouter::new(front, feed);

    let (stop, stopped) = watch::channel(false);
    let ops = config.http_addr.map(|addr| {
        let mut stopped = stopped;
        let state = http::OpsState { metrics, events };
        tokio::spawn(http::serve(addr, state, async move {
            let _ = stopped.changed().await;
        }))
    });

    let mut poller = UpdatePoller::new(client, DEFAULT_POLL_TIMEOUT_SECS);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    info!("polling for updates");
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for shutdown signal");
                }
                break;
            }
            batch = poller.next_batch() => match batch {
                Ok(updates) => {
                    for update in updates {
                        router.route(update).await;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "update poll failed");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            },
        }
    }

    info!("shutdown requested");
    let pending = router.in_flight();
    if tokio::time::timeout(HANDLER_GRACE, router.drain()).await.is_err() {
        warn!(pending, "update handlers still running at shutdown; aborting");
    }
    drop(router);
    if let Err(err) = reconciler.await {
        warn!(error = %err, "reconciler task join failed");
    }
    let _ = stop.send(true);
    if let Some(ops) = ops {
        match ops.await {
            Ok(result) => result?,
            Err(err) => warn!(error = %err, "ops listener join failed"),
        }
    }
    info!("marquee shutdown complete");
    Ok(())
}

fn logging_config(settings: &LoggingSettings) -> LoggingConfig<'_> {
    let format = match settings.style {
        Some(LogStyle::Json) => LogFormat::Json,
        Some(LogStyle::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    LoggingConfig {
        level: &settings.level,
        format,
        build_sha: build_sha(),
        target: LogTarget::Stdout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_style_wins_over_inference() {
        let settings = LoggingSettings {
            level: "debug".into(),
            style: Some(LogStyle::Json),
        };
        let config = logging_config(&settings);
        assert_eq!(config.level, "debug");
        assert!(matches!(config.format, LogFormat::Json));
        assert!(matches!(config.target, LogTarget::Stdout));
    }

    #[test]
    fn missing_bot_token_is_a_config_error() {
        // Only meaningful when the surrounding environment lacks the variable.
        if std::env::var_os("BOT_TOKEN").is_some() {
            return;
        }
        assert!(matches!(
            BootstrapDependencies::from_env(),
            Err(AppError::Config { .. })
        ));
    }
}
