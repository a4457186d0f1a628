//! Progress reporting for in-flight requests.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): A spinner on stderr using indicatif
//! - Logging mode (non-TTY): Structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use issue_scout::{EventCallback, RequestEvent};

pub(crate) use interactive::InteractiveReporter;
pub(crate) use logging::LoggingReporter;

use crate::commands::limits::format_duration;

/// Progress reporter that handles both interactive and logging modes.
pub(crate) enum ProgressReporter {
    /// Spinner for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: RequestEvent) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to an EventCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> EventCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Clear the spinner (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable wait, e.g. `40s` or `1h 5m`.
fn format_wait(wait: std::time::Duration) -> String {
    match chrono::Duration::from_std(wait) {
        Ok(duration) => format_duration(duration),
        Err(_) => format!("{}s", wait.as_secs()),
    }
}

/// One-line status for an event, or `None` for terminal events.
fn describe(event: &RequestEvent) -> Option<String> {
    let line = match event {
        RequestEvent::Throttling {
            remaining,
            resume_at,
            wait,
        } => format!(
            "Rate limit nearly exhausted ({} left), waiting {} until {}",
            remaining,
            format_wait(*wait),
            resume_at.format("%H:%M:%S UTC")
        ),
        RequestEvent::Sending {
            method,
            endpoint,
            attempt,
            max_attempts,
        } => format!("{method} {endpoint} (attempt {attempt}/{max_attempts})"),
        RequestEvent::RateLimited {
            wait, reset_known, ..
        } => {
            if *reset_known {
                format!("Rate limited, waiting {} for reset", format_wait(*wait))
            } else {
                format!("Rate limited, waiting {}", format_wait(*wait))
            }
        }
        RequestEvent::Retrying { status, delay, .. } => match status {
            Some(status) => format!("HTTP {status}, retrying in {}", format_wait(*delay)),
            None => format!("Connection failed, retrying in {}", format_wait(*delay)),
        },
        _ => return None,
    };
    Some(line)
}
