//! The request orchestrator.
//!
//! One call to [`Orchestrator::execute`] issues one logical request. Before
//! every transmit the orchestrator asks `/rate_limit` how much budget is left
//! and sleeps through the reset if it is nearly spent. After every transmit it
//! classifies the response:
//!
//! - 2xx ends the loop with the body
//! - 401 ends the loop with [`RequestError::Auth`]
//! - 403 for an exhausted rate limit sleeps until the reset carried by that
//!   response, then retries without consuming an attempt
//! - anything else consumes an attempt and retries after the configured delay
//!
//! Only the terminal [`Outcome`] reaches the caller. Intermediate attempts are
//! visible through `tracing` and the optional [`EventCallback`].
//!
//! # Example
//!
//! ```ignore
//! use issue_scout::{Orchestrator, OrchestratorConfig, RequestSpec};
//!
//! let config = OrchestratorConfig::new(token)?;
//! let orchestrator = Orchestrator::from_config(config)?;
//!
//! let issues = orchestrator
//!     .execute(&RequestSpec::get("/repos/rust-lang/rust/issues"))
//!     .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, OrchestratorConfig};
use crate::events::{EventCallback, RequestEvent, emit};
use crate::github::rate_limit::{pad, wait_duration};
use crate::github::{
    ACCEPT_HEADER, API_VERSION, Classification, RATE_LIMIT_PATH, RateLimitError,
    RateLimitResponse, RateLimitStatus, ResetHint, classify, parse_rate_limit_headers,
    parse_rate_limit_response,
};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Why an invocation ended without a success body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request was rejected before anything was sent.
    InvalidRequest,
    /// The API rejected the credential.
    Auth,
    /// Transient failures outlasted the attempt budget.
    RetriesExhausted,
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The caller's deadline passed.
    DeadlineExceeded,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Auth => "auth_error",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of an invocation.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("credential rejected by the API (HTTP 401); rotate the token")]
    Auth { body: String },

    #[error("request failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32, last_body: String },

    #[error("request cancelled")]
    Cancelled { last_body: Option<String> },

    #[error("request did not complete within {deadline:?}")]
    DeadlineExceeded {
        deadline: Duration,
        last_body: Option<String>,
    },
}

impl RequestError {
    #[inline]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest { .. } => FailureKind::InvalidRequest,
            Self::Auth { .. } => FailureKind::Auth,
            Self::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::DeadlineExceeded { .. } => FailureKind::DeadlineExceeded,
        }
    }

    /// The most recent response body, for diagnosis.
    pub fn last_body(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest { .. } => None,
            Self::Auth { body } => Some(body),
            Self::RetriesExhausted { last_body, .. } => Some(last_body),
            Self::Cancelled { last_body } | Self::DeadlineExceeded { last_body, .. } => {
                last_body.as_deref()
            }
        }
    }
}

/// Result of one invocation: the success body or the terminal failure.
pub type Outcome = Result<String, RequestError>;

/// One logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    endpoint: String,
    method: HttpMethod,
    body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, endpoint).with_body(body)
    }

    pub fn patch(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Check the request can be sent at all.
    pub fn validate(&self) -> Result<(), RequestError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(RequestError::invalid("endpoint must not be empty"));
        }
        // Query strings may legitimately carry URLs; only the path is checked.
        let path = endpoint.split('?').next().unwrap_or(endpoint);
        if path.contains("://") {
            return Err(RequestError::invalid(format!(
                "endpoint must be a path relative to the API base, got {endpoint}"
            )));
        }
        if self.method.requires_body() && self.body.is_none() {
            return Err(RequestError::invalid(format!(
                "{} requests require a JSON body",
                self.method
            )));
        }
        Ok(())
    }
}

/// What one transmit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// HTTP status, or `None` when the transport failed.
    pub status: Option<u16>,
    /// Raw body, or the transport error message.
    pub body: String,
}

impl AttemptResult {
    fn from_response(response: &HttpResponse) -> Self {
        Self {
            status: Some(response.status),
            body: response.body_text(),
        }
    }

    fn transport_failure(error: &HttpError) -> Self {
        Self {
            status: None,
            body: error.to_string(),
        }
    }
}

/// Per-invocation bookkeeping readable after the attempt loop is dropped.
#[derive(Debug, Default)]
struct InvocationState {
    transmits: u32,
    last_body: Option<String>,
}

enum Interrupt {
    Cancelled,
    Deadline(Duration),
}

/// Issues requests against a rate-limited, bearer-authenticated JSON API.
///
/// Cheap to clone; clones share the transport, the event callback and the
/// last observed rate limit. Concurrent invocations are not serialised: the
/// server is the authority on the shared budget.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    transport: Arc<dyn HttpTransport>,
    on_event: Option<Arc<EventCallback>>,
    last_rate_limit: Arc<Mutex<Option<RateLimitStatus>>>,
}

impl Orchestrator {
    /// Create an orchestrator over a custom transport.
    pub fn new(
        config: OrchestratorConfig,
        transport: impl HttpTransport + 'static,
    ) -> Result<Self, ConfigError> {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: OrchestratorConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            on_event: None,
            last_rate_limit: Arc::new(Mutex::new(None)),
        })
    }

    /// Create an orchestrator backed by reqwest.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::with_timeout(config.request_timeout)
            .map_err(|e| ConfigError::Transport(e.to_string()))?;
        Self::new(config, transport)
    }

    #[must_use]
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The most recent rate limit status seen by any clone of this
    /// orchestrator, for callers that want to pace themselves.
    pub fn last_observed_rate_limit(&self) -> Option<RateLimitStatus> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Execute one logical request.
    pub async fn execute(&self, spec: &RequestSpec) -> Outcome {
        self.execute_with(spec, std::future::pending::<()>(), None)
            .await
    }

    /// Execute, abandoning the request as soon as `cancel` completes.
    pub async fn execute_until<C>(&self, spec: &RequestSpec, cancel: C) -> Outcome
    where
        C: Future<Output = ()>,
    {
        self.execute_with(spec, cancel, None).await
    }

    /// Execute, bounding the whole multi-attempt operation by `deadline`.
    pub async fn execute_with_deadline(&self, spec: &RequestSpec, deadline: Duration) -> Outcome {
        self.execute_with(spec, std::future::pending::<()>(), Some(deadline))
            .await
    }

    /// Execute with both a cancellation signal and an optional deadline.
    ///
    /// Either one aborts whatever is pending, whether that is a throttle wait,
    /// a retry delay or an in-flight transmit.
    pub async fn execute_with<C>(
        &self,
        spec: &RequestSpec,
        cancel: C,
        deadline: Option<Duration>,
    ) -> Outcome
    where
        C: Future<Output = ()>,
    {
        spec.validate()?;

        let state = Mutex::new(InvocationState::default());
        let bounded = async {
            let run = self.run(spec, &state);
            match deadline {
                Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
                None => Ok(run.await),
            }
        };

        let interrupt = tokio::select! {
            biased;

            () = cancel => Interrupt::Cancelled,
            result = bounded => match result {
                Ok(outcome) => return outcome,
                Err(limit) => Interrupt::Deadline(limit),
            },
        };

        let InvocationState {
            transmits,
            last_body,
        } = std::mem::take(&mut *state.lock().unwrap_or_else(|e| e.into_inner()));

        let err = match interrupt {
            Interrupt::Cancelled => RequestError::Cancelled { last_body },
            Interrupt::Deadline(deadline) => RequestError::DeadlineExceeded {
                deadline,
                last_body,
            },
        };
        self.fail(spec, err, transmits)
    }

    /// Fetch the full rate limit table.
    pub async fn rate_limits(&self) -> Result<RateLimitResponse, RateLimitError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.config.url_for(RATE_LIMIT_PATH),
            headers: self.base_headers(),
            body: Vec::new(),
        };

        let response = self.transport.send(request).await?;
        match response.status {
            200..=299 => {
                let limits = parse_rate_limit_response(&response.body)?;
                self.observe(limits.core_status());
                Ok(limits)
            }
            401 => Err(RateLimitError::Unauthorized {
                body: response.body_text(),
            }),
            status => Err(RateLimitError::Status {
                status,
                body: response.body_text(),
            }),
        }
    }

    /// Fetch the current core REST budget.
    pub async fn rate_limit_status(&self) -> Result<RateLimitStatus, RateLimitError> {
        Ok(self.rate_limits().await?.core_status())
    }

    async fn run(&self, spec: &RequestSpec, state: &Mutex<InvocationState>) -> Outcome {
        let config = &*self.config;
        let request = self.build_request(spec)?;
        let mut delays = config
            .retry_delay
            .schedule(config.max_attempts.saturating_sub(1) as usize);

        let mut failures: u32 = 0;
        let mut rate_limit_waits: u32 = 0;
        let mut transmits: u32 = 0;

        loop {
            if let Err(err) = self.throttle_if_needed().await {
                return self.fail(spec, err, transmits);
            }

            let attempt = failures + 1;
            transmits += 1;
            emit(
                self.on_event.as_deref(),
                RequestEvent::Sending {
                    method: spec.method,
                    endpoint: spec.endpoint.clone(),
                    attempt,
                    max_attempts: config.max_attempts,
                },
            );
            tracing::debug!(
                method = %spec.method,
                endpoint = %spec.endpoint,
                attempt,
                max_attempts = config.max_attempts,
                "Sending request"
            );

            let (classification, result) = match self.transport.send(request.clone()).await {
                Ok(response) => {
                    if let Some(status) = parse_rate_limit_headers(&response.headers) {
                        self.observe(status);
                    }
                    (classify(&response), AttemptResult::from_response(&response))
                }
                Err(e) => {
                    tracing::warn!(endpoint = %spec.endpoint, error = %e, "Transport failure");
                    (Classification::Transient, AttemptResult::transport_failure(&e))
                }
            };

            tracing::debug!(
                endpoint = %spec.endpoint,
                status = ?result.status,
                classification = classification.label(),
                "Response classified"
            );

            {
                let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
                guard.transmits = transmits;
                guard.last_body = Some(result.body.clone());
            }

            match classification {
                Classification::Success => {
                    let status = result.status.unwrap_or_default();
                    tracing::info!(
                        method = %spec.method,
                        endpoint = %spec.endpoint,
                        status,
                        attempts = transmits,
                        "Request succeeded"
                    );
                    emit(
                        self.on_event.as_deref(),
                        RequestEvent::Succeeded {
                            status,
                            attempts: transmits,
                        },
                    );
                    return Ok(result.body);
                }

                Classification::AuthError => {
                    return self.fail(spec, RequestError::Auth { body: result.body }, transmits);
                }

                Classification::RateLimited { reset } => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > config.max_rate_limit_waits {
                        return self.fail(
                            spec,
                            RequestError::RetriesExhausted {
                                attempts: transmits,
                                last_body: result.body,
                            },
                            transmits,
                        );
                    }

                    let now = Utc::now();
                    let resume_at = match reset {
                        Some(ResetHint::At(reset_at)) => pad(reset_at, config.safety_margin),
                        Some(ResetHint::After(after)) => pad(now, after + config.safety_margin),
                        None => pad(now, config.fallback_rate_limit_wait),
                    };
                    let wait = wait_duration(resume_at, now);
                    tracing::warn!(
                        endpoint = %spec.endpoint,
                        resume_at = %resume_at,
                        wait_secs = wait.as_secs(),
                        reset_known = reset.is_some(),
                        "Rate limit exceeded, waiting for reset"
                    );
                    emit(
                        self.on_event.as_deref(),
                        RequestEvent::RateLimited {
                            resume_at,
                            wait,
                            reset_known: reset.is_some(),
                        },
                    );
                    tokio::time::sleep(wait).await;
                }

                Classification::Transient => {
                    failures += 1;
                    if failures >= config.max_attempts {
                        return self.fail(
                            spec,
                            RequestError::RetriesExhausted {
                                attempts: transmits,
                                last_body: result.body,
                            },
                            transmits,
                        );
                    }

                    let delay = delays.next_delay();
                    tracing::warn!(
                        endpoint = %spec.endpoint,
                        status = ?result.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    emit(
                        self.on_event.as_deref(),
                        RequestEvent::Retrying {
                            attempt,
                            status: result.status,
                            delay,
                        },
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Sleep through the reset when the remaining budget is below the
    /// threshold. A 401 from the status query is fatal; any other failure to
    /// read the status lets the request go out unthrottled.
    async fn throttle_if_needed(&self) -> Result<(), RequestError> {
        let status = match self.rate_limit_status().await {
            Ok(status) => status,
            Err(RateLimitError::Unauthorized { body }) => {
                return Err(RequestError::Auth { body });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit status unavailable, sending unthrottled");
                return Ok(());
            }
        };

        if !status.is_below(self.config.throttle_threshold) {
            return Ok(());
        }

        let resume_at = status.resume_at(self.config.safety_margin);
        let wait = wait_duration(resume_at, Utc::now());
        tracing::warn!(
            remaining = status.remaining,
            threshold = self.config.throttle_threshold,
            resume_at = %resume_at,
            wait_secs = wait.as_secs(),
            "Rate limit nearly exhausted, waiting for reset"
        );
        emit(
            self.on_event.as_deref(),
            RequestEvent::Throttling {
                remaining: status.remaining,
                resume_at,
                wait,
            },
        );
        tokio::time::sleep(wait).await;
        Ok(())
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest, RequestError> {
        let mut headers = self.base_headers();
        let mut body = Vec::new();

        match (spec.method, &spec.body) {
            (HttpMethod::Get, Some(_)) => {
                tracing::debug!(endpoint = %spec.endpoint, "Ignoring body on GET request");
            }
            (_, Some(payload)) => {
                body = serde_json::to_vec(payload)
                    .map_err(|e| RequestError::invalid(format!("unserializable body: {e}")))?;
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            (_, None) => {}
        }

        Ok(HttpRequest {
            method: spec.method,
            url: self.config.url_for(spec.endpoint.trim()),
            headers,
            body,
        })
    }

    fn base_headers(&self) -> HttpHeaders {
        vec![
            (
                "Authorization".to_string(),
                self.config.credential().bearer(),
            ),
            ("Accept".to_string(), ACCEPT_HEADER.to_string()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ]
    }

    fn observe(&self, status: RateLimitStatus) {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    fn fail(&self, spec: &RequestSpec, err: RequestError, attempts: u32) -> Outcome {
        let kind = err.kind();
        tracing::error!(
            method = %spec.method,
            endpoint = %spec.endpoint,
            kind = %kind,
            attempts,
            "Request failed: {}",
            err
        );
        emit(
            self.on_event.as_deref(),
            RequestEvent::Failed { kind, attempts },
        );
        Err(err)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("has_event_callback", &self.on_event.is_some())
            .finish_non_exhaustive()
    }
}
