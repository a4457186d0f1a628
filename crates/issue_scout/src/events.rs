//! Progress events emitted while a request is in flight.
//!
//! Callers that want operator-facing progress (spinners, status lines) pass an
//! [`EventCallback`] to the orchestrator. Events never alter the outcome.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::http::HttpMethod;
use crate::orchestrator::FailureKind;

/// Progress events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RequestEvent {
    /// The rate limit budget is nearly spent; sleeping before transmitting.
    Throttling {
        /// Remaining requests reported by the status query.
        remaining: u64,
        /// When the request will be sent.
        resume_at: DateTime<Utc>,
        /// How long the orchestrator sleeps.
        wait: Duration,
    },

    /// About to transmit the request.
    Sending {
        method: HttpMethod,
        endpoint: String,
        /// 1-indexed attempt number.
        attempt: u32,
        max_attempts: u32,
    },

    /// The API rejected the request for exceeding the rate limit.
    RateLimited {
        /// When the request will be re-sent.
        resume_at: DateTime<Utc>,
        wait: Duration,
        /// Whether the reset time came from the rejected response.
        reset_known: bool,
    },

    /// A transient failure; retrying after `delay`.
    Retrying {
        attempt: u32,
        /// HTTP status, or `None` for transport failures.
        status: Option<u16>,
        delay: Duration,
    },

    /// Terminal success.
    Succeeded { status: u16, attempts: u32 },

    /// Terminal failure.
    Failed { kind: FailureKind, attempts: u32 },
}

/// Callback type for request progress.
pub type EventCallback = Box<dyn Fn(RequestEvent) + Send + Sync>;

/// Emit an event if a callback is provided.
#[inline]
pub fn emit(on_event: Option<&EventCallback>, event: RequestEvent) {
    if let Some(cb) = on_event {
        cb(event);
    }
}
