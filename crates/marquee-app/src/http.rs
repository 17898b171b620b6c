//! Optional ops listener exposing health, Prometheus metrics, and the job
//! event feed.
//!
//! # Design
//! - Read-only: nothing here mutates service state.
//! - Every request gets an `x-request-id` and a tracing span.
//! - `/events` streams job and reconciliation events as SSE, replaying the
//!   ring after `Last-Event-ID`; `/events/recent` returns the ring as JSON.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header::CONTENT_TYPE};
use axum::response::sse::{self, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{Stream, StreamExt, stream};
use marquee_events::{EventBus, EventEnvelope, EventId};
use marquee_telemetry::{Metrics, MetricsSnapshot, build_sha};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info};

use crate::error::{AppError, AppResult};

const REQUEST_ID_HEADER: &str = "x-request-id";
const HEADER_LAST_EVENT_ID: &str = "last-event-id";
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(20);

/// Shared state behind the ops routes.
#[derive(Clone)]
pub struct OpsState {
    /// Prometheus registry.
    pub metrics: Metrics,
    /// Job and reconciliation event bus.
    pub events: EventBus,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Build identifier.
    pub build_sha: &'static str,
    /// Current job gauges and counters.
    pub metrics: MetricsSnapshot,
}

/// Body of `GET /events/recent`.
#[derive(Debug, Clone, Serialize)]
pub struct RecentEvents {
    /// Newest identifier still held by the bus.
    pub last_event_id: Option<EventId>,
    /// Buffered events, oldest first.
    pub events: Vec<EventEnvelope>,
}

#[derive(Debug, Default, Deserialize)]
struct SinceQuery {
    #[serde(default)]
    since: Option<EventId>,
}

/// Build the ops router.
#[must_use]
pub fn router(state: OpsState) -> Router {
    let request_id = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                route = %request.uri().path(),
                status_code = tracing::field::Empty,
                latency_ms = tracing::field::Empty
            )
        })
        .on_response(|response: &Response, latency: Duration, span: &Span| {
            span.record("status_code", response.status().as_u16());
            span.record(
                "latency_ms",
                u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            );
        });
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(trace_layer);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/events", get(stream_events))
        .route("/events/recent", get(recent_events))
        .layer(layers)
        .with_state(state)
}

/// Serve the ops router on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error when the address cannot be bound or serving fails.
pub async fn serve<F>(addr: SocketAddr, state: OpsState, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::io("bind_ops_listener", source))?;
    info!(%addr, "ops listener started");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| AppError::io("serve_ops_listener", source))
}

async fn health(State(state): State<OpsState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        build_sha: build_sha(),
        metrics: state.metrics.snapshot(),
    })
}

async fn render_metrics(State(state): State<OpsState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(CONTENT_TYPE, HeaderValue::from_static(METRICS_CONTENT_TYPE))],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

async fn recent_events(
    State(state): State<OpsState>,
    Query(query): Query<SinceQuery>,
) -> Json<RecentEvents> {
    Json(RecentEvents {
        last_event_id: state.events.last_event_id(),
        events: state.events.recent(query.since),
    })
}

async fn stream_events(
    State(state): State<OpsState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send> {
    let since = headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok());
    let events = envelope_stream(&state.events, since).filter_map(|envelope| async move {
        match serde_json::to_string(&envelope) {
            Ok(payload) => Some(Ok(sse::Event::default()
                .id(envelope.id.to_string())
                .event(envelope.event.kind())
                .data(payload))),
            Err(err) => {
                error!(error = %err, "failed to serialise event payload");
                None
            }
        }
    });
    Sse::new(events).keep_alive(
        sse::KeepAlive::new()
            .interval(SSE_KEEP_ALIVE)
            .text("keep-alive"),
    )
}

/// Replayed events after `since`, then live ones, until the bus is dropped.
fn envelope_stream(
    bus: &EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = EventEnvelope> + Send + use<> {
    stream::unfold(bus.subscribe(since), |mut events| async move {
        events.next().await.map(|envelope| (envelope, events))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_events::Event;
    use uuid::Uuid;

    fn state() -> anyhow::Result<OpsState> {
        Ok(OpsState {
            metrics: Metrics::new()?,
            events: EventBus::with_capacity(8),
        })
    }

    fn started(n: u128) -> Event {
        Event::JobStarted {
            job_id: Uuid::from_u128(n),
        }
    }

    #[tokio::test]
    async fn health_reports_snapshot() -> anyhow::Result<()> {
        let state = state()?;
        state.metrics.inc_dispatched();
        state.metrics.add_active_workers(1);

        let Json(body) = health(State(state)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.metrics.jobs_dispatched_total, 1);
        assert_eq!(body.metrics.active_workers, 1);
        let json = serde_json::to_value(&body)?;
        assert_eq!(json["metrics"]["queued_jobs"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn metrics_use_text_exposition_format() -> anyhow::Result<()> {
        let state = state()?;
        state.metrics.inc_job_outcome("success");

        let response = render_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static(METRICS_CONTENT_TYPE))
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(body.to_vec())?;
        assert!(text.contains("job_outcomes_total"));
        Ok(())
    }

    #[tokio::test]
    async fn recent_events_return_the_ring_after_since() -> anyhow::Result<()> {
        let state = state()?;
        for n in 1..=3 {
            let _ = state.events.publish(started(n));
        }

        let Json(all) = recent_events(State(state.clone()), Query(SinceQuery::default())).await;
        assert_eq!(all.last_event_id, Some(3));
        assert_eq!(all.events.len(), 3);

        let Json(newer) = recent_events(State(state), Query(SinceQuery { since: Some(2) })).await;
        let ids: Vec<_> = newer.events.iter().map(|event| event.id).collect();
        assert_eq!(ids, vec![3]);
        let json = serde_json::to_value(&newer)?;
        assert_eq!(json["events"][0]["event"]["type"], "job_started");
        Ok(())
    }

    #[tokio::test]
    async fn event_stream_replays_then_follows_live_events() -> anyhow::Result<()> {
        let state = state()?;
        let _ = state.events.publish(started(1));
        let _ = state.events.publish(started(2));

        let mut stream = Box::pin(envelope_stream(&state.events, Some(1)));
        let _ = state.events.publish(started(3));

        let mut ids = Vec::new();
        for _ in 0..2 {
            let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await?;
            ids.extend(next.map(|event| event.id));
        }
        assert_eq!(ids, vec![2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn event_feed_is_served_as_sse() -> anyhow::Result<()> {
        let state = state()?;
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static("0"));

        let response = stream_events(State(state), headers).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/event-stream"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() -> anyhow::Result<()> {
        let addr: SocketAddr = "127.0.0.1:0".parse()?;
        serve(addr, state()?, async {}).await?;
        Ok(())
    }
}
