use issue_scout::RequestEvent;

use super::format_wait;

/// Logging reporter using tracing for structured output.
///
/// The library already logs every attempt; this adds operator-facing lines
/// for the waits so a pipeline log shows why a job is idle.
pub(crate) struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: RequestEvent) {
        match event {
            RequestEvent::Throttling {
                remaining,
                resume_at,
                wait,
            } => {
                tracing::info!(
                    remaining,
                    resume_at = %resume_at,
                    wait = %format_wait(wait),
                    "Waiting for rate limit reset"
                );
            }

            RequestEvent::RateLimited {
                resume_at,
                wait,
                reset_known,
            } => {
                tracing::info!(
                    resume_at = %resume_at,
                    wait = %format_wait(wait),
                    reset_known,
                    "Rate limited, backing off"
                );
            }

            RequestEvent::Sending {
                method,
                endpoint,
                attempt,
                max_attempts,
            } => {
                tracing::debug!(method = %method, endpoint = %endpoint, attempt, max_attempts, "Sending");
            }

            RequestEvent::Retrying {
                attempt,
                status,
                delay,
            } => {
                tracing::debug!(attempt, status = ?status, delay = %format_wait(delay), "Retrying");
            }

            RequestEvent::Succeeded { status, attempts } => {
                tracing::debug!(status, attempts, "Done");
            }

            RequestEvent::Failed { kind, attempts } => {
                tracing::debug!(kind = %kind, attempts, "Gave up");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
