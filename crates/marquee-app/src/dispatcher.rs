//! Job dispatcher: one supervised worker process per job.
//!
//! # Design
//! - `dispatch` returns immediately; the job runs on its own task and waits
//!   for a permit from a bounded semaphore before spawning the worker.
//! - The worker's stdout is the one-shot result channel. The first valid
//!   terminal line wins; later valid lines are protocol violations that are
//!   counted and logged, never acted on.
//! - EOF without a terminal line (crash, kill, early exit) is an implicit
//!   error outcome. The worker is killed once an outcome is known.
//! - The dispatcher keeps no state about a job after notifying the requester.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use marquee_core::{ChatId, ChatTransport, ContentLocator, Reply, WorkerOutcome, WorkerRequest};
use marquee_events::{Event, EventBus};
use marquee_telemetry::Metrics;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Grace period for draining worker output after an outcome is known.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const DELIVERED_TEXT: &str = "✅ Here is your file!";
const RELAY_FAILED_TEXT: &str = "✅ Upload complete. Check the storage channel.";

/// Accepts worker requests without blocking the caller.
pub trait JobSubmitter: Send + Sync {
    /// Queue `request` and return its job id.
    fn submit(&self, request: WorkerRequest) -> Uuid;
}

/// How a worker process is started.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl ProcessLauncher {
    /// Launch `program` with the request arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Arguments placed before the request arguments.
    #[must_use]
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn spawn(&self, request: &WorkerRequest) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.prefix_args)
            .args(request.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Handle to a dispatched job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    task: JoinHandle<WorkerOutcome>,
}

impl JobHandle {
    /// Identifier minted for the job.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for the job to finish; `None` if its task was aborted.
    pub async fn outcome(self) -> Option<WorkerOutcome> {
        self.task.await.ok()
    }
}

/// Spawns and supervises workers, then notifies requesters.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    launcher: ProcessLauncher,
    transport: Arc<dyn ChatTransport>,
    storage: ChatId,
    permits: Arc<Semaphore>,
    events: EventBus,
    metrics: Metrics,
}

impl Dispatcher {
    /// Build a dispatcher allowing at most `max_concurrent` running workers.
    #[must_use]
    pub fn new(
        launcher: ProcessLauncher,
        transport: Arc<dyn ChatTransport>,
        storage: ChatId,
        max_concurrent: usize,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                launcher,
                transport,
                storage,
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
                events,
                metrics,
            }),
        }
    }

    /// Dispatch a job for `locator` on behalf of `requester`.
    #[must_use]
    pub fn dispatch(&self, locator: ContentLocator, requester: ChatId, title: &str) -> JobHandle {
        self.dispatch_request(WorkerRequest::new(locator, requester, title))
    }

    /// Dispatch a prepared request.
    #[must_use]
    pub fn dispatch_request(&self, request: WorkerRequest) -> JobHandle {
        let job_id = request.job_id;
        let inner = Arc::clone(&self.inner);
        inner.publish(Event::JobQueued {
            job_id,
            title: request.title.clone(),
            requester: request.requester.0,
        });
        inner.metrics.add_queued_jobs(1);
        let task = tokio::spawn(async move { inner.run_job(request).await });
        JobHandle { job_id, task }
    }
}

impl JobSubmitter for Dispatcher {
    fn submit(&self, request: WorkerRequest) -> Uuid {
        self.dispatch_request(request).job_id()
    }
}

impl DispatcherInner {
    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }

    async fn run_job(&self, request: WorkerRequest) -> WorkerOutcome {
        let job_id = request.job_id;
        let permit = Arc::clone(&self.permits).acquire_owned().await;
        self.metrics.add_queued_jobs(-1);

        let outcome = match permit {
            Ok(_permit) => {
                self.metrics.add_active_workers(1);
                self.metrics.inc_dispatched();
                self.publish(Event::JobStarted { job_id });
                info!(job_id = %job_id, requester = %request.requester, title = %request.title, "worker started");
                let outcome = self.supervise(&request).await;
                self.metrics.add_active_workers(-1);
                outcome
            }
            Err(_) => WorkerOutcome::error("dispatcher is shutting down"),
        };

        self.metrics.inc_job_outcome(outcome.kind());
        match &outcome {
            WorkerOutcome::Success { message_locator } => {
                info!(job_id = %job_id, message_locator, "worker succeeded");
                self.publish(Event::JobSucceeded {
                    job_id,
                    message_locator: *message_locator,
                });
            }
            WorkerOutcome::Error { reason } => {
                warn!(job_id = %job_id, reason = %reason, "worker failed");
                self.publish(Event::JobFailed {
                    job_id,
                    reason: reason.clone(),
                });
            }
        }
        self.notify(request.requester, &outcome).await;
        outcome
    }

    async fn supervise(&self, request: &WorkerRequest) -> WorkerOutcome {
        let job_id = request.job_id;
        let mut child = match self.launcher.spawn(request) {
            Ok(child) => child,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "failed to spawn worker");
                return WorkerOutcome::error(format!("failed to start worker: {err}"));
            }
        };
        let Some(stdout) = child.stdout.take() else {
            terminate(&mut child, job_id).await;
            return WorkerOutcome::error("worker output unavailable");
        };

        let (sender, receiver) = oneshot::channel();
        let reader = tokio::spawn(read_terminal(stdout, sender, job_id));

        let outcome = match receiver.await {
            Ok(outcome) => {
                terminate(&mut child, job_id).await;
                outcome
            }
            Err(_) => {
                let status = child.wait().await;
                let detail =
                    status.map_or_else(|err| err.to_string(), |status| status.to_string());
                WorkerOutcome::error(format!("worker exited without a result ({detail})"))
            }
        };

        match tokio::time::timeout(DRAIN_TIMEOUT, reader).await {
            Ok(Ok(extra)) => {
                for _ in 0..extra {
                    warn!(job_id = %job_id, "ignoring extra terminal message");
                    self.metrics.inc_protocol_violation();
                    self.publish(Event::ProtocolViolation { job_id });
                }
            }
            Ok(Err(err)) => warn!(job_id = %job_id, error = %err, "worker output reader failed"),
            Err(_) => warn!(job_id = %job_id, "timed out draining worker output"),
        }
        outcome
    }

    async fn notify(&self, requester: ChatId, outcome: &WorkerOutcome) {
        let text = match outcome {
            WorkerOutcome::Success { message_locator } => {
                match self
                    .transport
                    .forward_stored(requester, self.storage, *message_locator)
                    .await
                {
                    Ok(()) => DELIVERED_TEXT.to_string(),
                    Err(err) => {
                        warn!(requester = %requester, error = %err, "relay after upload failed");
                        RELAY_FAILED_TEXT.to_string()
                    }
                }
            }
            WorkerOutcome::Error { reason } => format!("❌ Download failed: {reason}"),
        };
        if let Err(err) = self.transport.send_reply(requester, &Reply::text(text)).await {
            warn!(requester = %requester, error = %err, "failed to notify requester");
        }
    }
}

async fn terminate(child: &mut Child, job_id: Uuid) {
    if let Err(err) = child.start_kill() {
        debug!(job_id = %job_id, error = %err, "worker already exited");
    }
    if let Err(err) = child.wait().await {
        warn!(job_id = %job_id, error = %err, "failed to reap worker");
    }
}

/// Forward the first terminal line; return how many further ones followed.
async fn read_terminal(
    stdout: ChildStdout,
    sender: oneshot::Sender<WorkerOutcome>,
    job_id: Uuid,
) -> usize {
    let mut lines = BufReader::new(stdout).lines();
    let mut sender = Some(sender);
    let mut extra = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match WorkerOutcome::from_line(&line) {
                Ok(outcome) => match sender.take() {
                    Some(sender) => {
                        let _ = sender.send(outcome);
                    }
                    None => extra += 1,
                },
                Err(err) => debug!(job_id = %job_id, error = %err, "ignoring worker output line"),
            },
            Ok(None) => break,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "failed to read worker output");
                break;
            }
        }
    }
    extra
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use marquee_test_support::mocks::{RecordingTransport, Sent};

    const STORAGE: ChatId = ChatId(-100_500);
    const REQUESTER: ChatId = ChatId(77);

    fn script(body: &str) -> ProcessLauncher {
        ProcessLauncher::new("/bin/sh").with_prefix_args(["-c", body, "worker"])
    }

    fn dispatcher(
        launcher: ProcessLauncher,
        transport: Arc<RecordingTransport>,
        limit: usize,
    ) -> (Dispatcher, Metrics, EventBus) {
        let metrics = Metrics::new().expect("metrics");
        let events = EventBus::new();
        let dispatcher = Dispatcher::new(
            launcher,
            transport,
            STORAGE,
            limit,
            events.clone(),
            metrics.clone(),
        );
        (dispatcher, metrics, events)
    }

    fn magnet() -> ContentLocator {
        ContentLocator::Magnet("magnet:?xt=urn:btih:0123".into())
    }

    #[tokio::test]
    async fn success_forwards_and_confirms() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, metrics, _) = dispatcher(
            script(r#"printf '{"status":"success","message_locator":42}\n'"#),
            Arc::clone(&transport),
            2,
        );

        let handle = dispatcher.dispatch(magnet(), REQUESTER, "Arrival");
        let outcome = handle.outcome().await;

        assert_eq!(outcome, Some(WorkerOutcome::Success { message_locator: 42 }));
        assert_eq!(
            transport.sent()[0],
            Sent::Forward {
                chat: REQUESTER,
                storage: STORAGE,
                message_locator: 42
            }
        );
        assert_eq!(transport.texts_for(REQUESTER), vec![DELIVERED_TEXT]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_dispatched_total, 1);
        assert_eq!(snapshot.active_workers, 0);
        assert_eq!(snapshot.queued_jobs, 0);
    }

    #[tokio::test]
    async fn relay_failure_degrades_to_storage_notice() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_forwards();
        let (dispatcher, _, _) = dispatcher(
            script(r#"printf '{"status":"success","message_locator":7}\n'"#),
            Arc::clone(&transport),
            2,
        );

        let outcome = dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        assert!(matches!(outcome, Some(WorkerOutcome::Success { .. })));
        assert_eq!(transport.texts_for(REQUESTER), vec![RELAY_FAILED_TEXT]);
    }

    #[tokio::test]
    async fn error_reason_reaches_requester_verbatim() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, metrics, _) = dispatcher(
            script(r#"printf '{"status":"error","reason":"no video file found"}\n'; exit 1"#),
            Arc::clone(&transport),
            2,
        );

        dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        assert_eq!(
            transport.texts_for(REQUESTER),
            vec!["❌ Download failed: no video file found"]
        );
        assert!(metrics.render().expect("render").contains("job_outcomes_total"));
    }

    #[tokio::test]
    async fn worker_receives_request_arguments() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, _, _) = dispatcher(
            script(
                r#"printf '{"status":"error","reason":"%s|%s|%s"}\n' "${2#*=}" "${3#*=}" "${4#*=}""#,
            ),
            Arc::clone(&transport),
            2,
        );

        let outcome = dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        assert_eq!(
            outcome,
            Some(WorkerOutcome::error("77|Arrival|magnet:?xt=urn:btih:0123"))
        );
    }

    #[tokio::test]
    async fn exit_without_message_is_an_error() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, _, _) = dispatcher(
            script("echo 'starting up'; exit 3"),
            Arc::clone(&transport),
            2,
        );

        let outcome = dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        let Some(WorkerOutcome::Error { reason }) = outcome else {
            panic!("expected error outcome");
        };
        assert!(reason.starts_with("worker exited without a result"), "{reason}");
        assert_eq!(transport.texts_for(REQUESTER).len(), 1);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_like_a_transfer_error() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, _, _) = dispatcher(
            ProcessLauncher::new("/definitely/missing/marquee-worker"),
            Arc::clone(&transport),
            2,
        );

        dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        let texts = transport.texts_for(REQUESTER);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("❌ Download failed: failed to start worker"));
    }

    #[tokio::test]
    async fn second_terminal_message_is_counted_not_acted_on() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, metrics, events) = dispatcher(
            script(
                r#"printf '{"status":"success","message_locator":1}\n{"status":"error","reason":"late"}\n'"#,
            ),
            Arc::clone(&transport),
            2,
        );

        let outcome = dispatcher.dispatch(magnet(), REQUESTER, "Arrival").outcome().await;
        assert_eq!(outcome, Some(WorkerOutcome::Success { message_locator: 1 }));
        assert_eq!(transport.texts_for(REQUESTER), vec![DELIVERED_TEXT]);
        assert_eq!(metrics.snapshot().protocol_violations_total, 1);

        let mut stream = events.subscribe(Some(0));
        let mut kinds = Vec::new();
        while let Ok(Some(envelope)) =
            tokio::time::timeout(Duration::from_millis(50), stream.next()).await
        {
            kinds.push(envelope.event.kind());
        }
        assert_eq!(
            kinds,
            ["job_queued", "job_started", "protocol_violation", "job_succeeded"]
        );
    }

    #[tokio::test]
    async fn semaphore_bounds_running_workers() {
        let transport = Arc::new(RecordingTransport::new());
        let (dispatcher, metrics, _) = dispatcher(
            script(r#"sleep 0.4; printf '{"status":"success","message_locator":3}\n'"#),
            Arc::clone(&transport),
            1,
        );

        let first = dispatcher.dispatch(magnet(), ChatId(1), "A");
        let second = dispatcher.dispatch(magnet(), ChatId(2), "B");
        assert_ne!(first.job_id(), second.job_id());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_workers, 1);
        assert_eq!(snapshot.queued_jobs, 1);

        assert!(first.outcome().await.is_some());
        assert!(second.outcome().await.is_some());
        assert_eq!(metrics.snapshot().jobs_dispatched_total, 2);
    }
}
