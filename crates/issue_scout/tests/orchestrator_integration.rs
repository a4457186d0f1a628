//! Integration tests for the request orchestrator.
//!
//! These drive the public API over a scripted transport with a paused clock,
//! so multi-minute waits finish instantly while still being measured.
//!
//! Key scenarios tested:
//! - Clones share the last observed rate limit
//! - Concurrent invocations each honour their own attempt budget
//! - Cancellation and deadlines abort in-flight waits
//! - Progress events arrive in order

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use issue_scout::http::{HttpError, HttpRequest, HttpResponse};
use issue_scout::{
    FailureKind, HttpMethod, HttpTransport, Orchestrator, OrchestratorConfig, RequestError,
    RequestEvent, RequestSpec,
};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::Instant;

const BASE: &str = "https://api.test";

/// Transport answering `/rate_limit` from a fixed budget and every other path
/// from a per-path script. Unscripted paths answer 200.
#[derive(Clone, Default)]
struct ScriptedTransport {
    inner: Arc<Mutex<ScriptedInner>>,
    transmits: Arc<AtomicUsize>,
}

#[derive(Default)]
struct ScriptedInner {
    remaining: u64,
    reset_in: i64,
    scripts: Vec<(String, VecDeque<(u16, String)>)>,
}

impl ScriptedTransport {
    fn with_budget(remaining: u64, reset_in: i64) -> Self {
        let transport = Self::default();
        {
            let mut inner = transport.inner.lock().unwrap();
            inner.remaining = remaining;
            inner.reset_in = reset_in;
        }
        transport
    }

    fn script(&self, path: &str, responses: &[(u16, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        inner.scripts.push((
            format!("{BASE}{path}"),
            responses
                .iter()
                .map(|(status, body)| (*status, body.to_string()))
                .collect(),
        ));
    }

    fn transmits(&self) -> usize {
        self.transmits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        assert!(
            request
                .header("authorization")
                .is_some_and(|v| v.starts_with("Bearer ")),
            "missing bearer token on {}",
            request.url
        );

        let mut inner = self.inner.lock().unwrap();
        if request.url == format!("{BASE}/rate_limit") {
            let body = json!({
                "resources": {
                    "core": {
                        "limit": 5000,
                        "used": 5000 - inner.remaining,
                        "remaining": inner.remaining,
                        "reset": Utc::now().timestamp() + inner.reset_in,
                    }
                }
            });
            return Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: body.to_string().into_bytes(),
            });
        }

        self.transmits.fetch_add(1, Ordering::SeqCst);
        inner.remaining = inner.remaining.saturating_sub(1);
        let (status, body) = inner
            .scripts
            .iter_mut()
            .find(|(url, _)| *url == request.url)
            .and_then(|(_, queue)| queue.pop_front())
            .unwrap_or((200, "{}".to_string()));

        Ok(HttpResponse {
            status,
            headers: vec![
                ("x-ratelimit-limit".to_string(), "5000".to_string()),
                ("x-ratelimit-remaining".to_string(), inner.remaining.to_string()),
                (
                    "x-ratelimit-reset".to_string(),
                    (Utc::now().timestamp() + inner.reset_in).to_string(),
                ),
            ],
            body: body.into_bytes(),
        })
    }
}

fn orchestrator(transport: &ScriptedTransport) -> Orchestrator {
    let config = OrchestratorConfig::new("ghp_integration")
        .unwrap()
        .with_base_url(BASE);
    Orchestrator::new(config, transport.clone()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_last_observed_rate_limit() {
    let transport = ScriptedTransport::with_budget(100, 3600);
    let first = orchestrator(&transport);
    let second = first.clone();

    first
        .execute(&RequestSpec::get("/repos/octo/demo/issues"))
        .await
        .unwrap();

    let observed = second.last_observed_rate_limit().unwrap();
    assert_eq!(observed.remaining, 99);
    assert_eq!(observed.limit, 5000);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_invocations_keep_separate_attempt_budgets() {
    let transport = ScriptedTransport::with_budget(1000, 3600);
    transport.script(
        "/repos/octo/flaky/issues",
        &[(500, "down"), (500, "still down"), (500, "gone")],
    );
    transport.script("/repos/octo/steady/issues", &[(200, "[1,2,3]")]);

    let orchestrator = orchestrator(&transport);
    let flaky = RequestSpec::get("/repos/octo/flaky/issues");
    let steady = RequestSpec::get("/repos/octo/steady/issues");

    let (flaky_outcome, steady_outcome) =
        tokio::join!(orchestrator.execute(&flaky), orchestrator.execute(&steady));

    assert_eq!(steady_outcome.unwrap(), "[1,2,3]");
    match flaky_outcome {
        Err(RequestError::RetriesExhausted {
            attempts,
            last_body,
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_body, "gone");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(transport.transmits(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_throttle_wait() {
    let transport = ScriptedTransport::with_budget(3, 900);
    let orchestrator = orchestrator(&transport);
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let spec = RequestSpec::get("/repos/octo/demo/issues");
    let task = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .execute_until(&spec, async {
                    let _ = cancel_rx.await;
                })
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    cancel_tx.send(()).unwrap();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Cancelled);
    assert_eq!(err.last_body(), None);
    assert_eq!(transport.transmits(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_covers_retry_delays() {
    let transport = ScriptedTransport::with_budget(1000, 3600);
    transport.script(
        "/repos/octo/demo/issues",
        &[(502, "bad gateway"), (502, "bad gateway again"), (200, "[]")],
    );

    let start = Instant::now();
    let err = orchestrator(&transport)
        .execute_with_deadline(
            &RequestSpec::get("/repos/octo/demo/issues"),
            Duration::from_secs(8),
        )
        .await
        .unwrap_err();

    assert_eq!(start.elapsed(), Duration::from_secs(8));
    match err {
        RequestError::DeadlineExceeded {
            deadline,
            last_body,
        } => {
            assert_eq!(deadline, Duration::from_secs(8));
            assert_eq!(last_body.as_deref(), Some("bad gateway again"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.transmits(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_events_describe_the_whole_invocation() {
    let transport = ScriptedTransport::with_budget(1000, 3600);
    let reset = Utc::now().timestamp() + 15;
    let limited = json!({
        "message": "API rate limit exceeded",
        "documentation_url": "https://docs.github.com/rest/overview/resources-in-the-rest-api#rate-limiting",
        "reset": reset,
    })
    .to_string();
    transport.script(
        "/repos/octo/demo/issues/7/comments",
        &[(403, &limited), (500, "hiccup"), (201, "{\"id\":1}")],
    );

    let events: Arc<Mutex<Vec<RequestEvent>>> = Arc::default();
    let capture = Arc::clone(&events);
    let orchestrator = orchestrator(&transport).with_event_callback(Box::new(move |event| {
        capture.lock().unwrap().push(event);
    }));

    let body = orchestrator
        .execute(&RequestSpec::post(
            "/repos/octo/demo/issues/7/comments",
            json!({"body": "Reproduced on main."}),
        ))
        .await
        .unwrap();
    assert_eq!(body, "{\"id\":1}");

    let events = events.lock().unwrap();
    let labels: Vec<&str> = events
        .iter()
        .map(|e| match e {
            RequestEvent::Throttling { .. } => "throttling",
            RequestEvent::Sending { .. } => "sending",
            RequestEvent::RateLimited { .. } => "rate_limited",
            RequestEvent::Retrying { .. } => "retrying",
            RequestEvent::Succeeded { .. } => "succeeded",
            RequestEvent::Failed { .. } => "failed",
            _ => "other",
        })
        .collect();
    assert_eq!(
        labels,
        [
            "sending",
            "rate_limited",
            "sending",
            "retrying",
            "sending",
            "succeeded"
        ]
    );

    // The rate limit wait did not consume an attempt.
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RequestEvent::Sending {
                method, attempt, ..
            } => {
                assert_eq!(*method, HttpMethod::Post);
                Some(*attempt)
            }
            _ => None,
        })
        .collect();
    assert_eq!(attempts, [1, 1, 2]);
}
