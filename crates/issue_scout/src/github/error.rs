//! GitHub error bodies and response classification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::rate_limit::parse_reset_header;
use crate::http::{HttpHeaders, HttpResponse, header_get};

/// The JSON body GitHub returns with non-2xx responses.
///
/// Only `message` is required. `reset` and `rate.reset` are not part of
/// GitHub's documented error body but are honoured when a proxy or mirror
/// puts the reset time there.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub reset: Option<i64>,
    #[serde(default)]
    pub rate: Option<EnvelopeRate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvelopeRate {
    #[serde(default)]
    pub reset: Option<i64>,
}

impl ErrorEnvelope {
    /// Decode an error body. Returns `None` for anything that is not the
    /// expected JSON object.
    pub fn decode(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Whether the message reports an exhausted primary or secondary limit.
    pub fn mentions_rate_limit(&self) -> bool {
        self.message.to_ascii_lowercase().contains("rate limit")
    }

    /// Reset time carried in the body itself, if any.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset
            .or_else(|| self.rate.as_ref().and_then(|r| r.reset))
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
    }
}

/// When a rejected response says the limit lifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetHint {
    /// An absolute reset time (body `reset` or `x-ratelimit-reset`).
    At(DateTime<Utc>),
    /// A relative wait from `retry-after`, typical of secondary limits.
    After(Duration),
}

/// What a single response means for the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx: the body is the result.
    Success,
    /// 403 for an exhausted rate limit. `reset` comes from the rejected
    /// response; `None` when it carried no usable reset time.
    RateLimited { reset: Option<ResetHint> },
    /// 401: the credential is broken.
    AuthError,
    /// Anything else. Worth another attempt.
    Transient,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthError => "auth_error",
            Self::Transient => "transient",
        }
    }
}

/// Classify a response by status, body and headers.
///
/// Pure: the same response always yields the same classification.
pub fn classify(response: &HttpResponse) -> Classification {
    if response.is_success() {
        return Classification::Success;
    }
    match response.status {
        401 => Classification::AuthError,
        403 => match rate_limit_rejection(response) {
            Some(reset) => Classification::RateLimited { reset },
            None => Classification::Transient,
        },
        _ => Classification::Transient,
    }
}

/// For a 403, decide whether it is a rate limit rejection and where its
/// reset time lives.
///
/// The decoded envelope is consulted first. If the body does not decode, the
/// response counts as rate limited only when `x-ratelimit-remaining` is `0`.
///
/// The reset is taken from the body, then `retry-after`, then
/// `x-ratelimit-reset`. A secondary limit reports the primary bucket's reset
/// in the header, which can be most of an hour away.
fn rate_limit_rejection(response: &HttpResponse) -> Option<Option<ResetHint>> {
    let envelope = ErrorEnvelope::decode(&response.body);
    let header_exhausted = header_get(&response.headers, "x-ratelimit-remaining")
        .is_some_and(|v| v.trim() == "0");

    let signalled = envelope
        .as_ref()
        .is_some_and(ErrorEnvelope::mentions_rate_limit)
        || header_exhausted;
    if !signalled {
        return None;
    }

    let reset = envelope
        .as_ref()
        .and_then(ErrorEnvelope::reset_at)
        .map(ResetHint::At)
        .or_else(|| parse_retry_after(&response.headers).map(ResetHint::After))
        .or_else(|| parse_reset_header(&response.headers).map(ResetHint::At));
    Some(reset)
}

/// `retry-after` in delta-seconds form. HTTP dates are not used by GitHub.
fn parse_retry_after(headers: &HttpHeaders) -> Option<Duration> {
    header_get(headers, "retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
