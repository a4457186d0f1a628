//! Issue Scout - rate-limit-aware request orchestration for the GitHub REST API.
//!
//! This library issues single logical requests against a bearer-authenticated,
//! rate-limited JSON API. It throttles ahead of an exhausted budget, waits out
//! rate limit rejections, retries transient failures a bounded number of times
//! and hands back either the success body or one typed failure.
//!
//! # Example
//!
//! ```ignore
//! use issue_scout::{Orchestrator, OrchestratorConfig, RequestSpec};
//! use serde_json::json;
//!
//! let orchestrator = Orchestrator::from_config(OrchestratorConfig::new(token)?)?;
//!
//! // Read
//! let issues = orchestrator
//!     .execute(&RequestSpec::get("/repos/octo/demo/issues?state=open"))
//!     .await?;
//!
//! // Write, bounded by a deadline
//! let created = orchestrator
//!     .execute_with_deadline(
//!         &RequestSpec::post("/repos/octo/demo/issues", json!({"title": "Flaky test"})),
//!         std::time::Duration::from_secs(120),
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod events;
pub mod github;
pub mod http;
pub mod orchestrator;
pub mod retry;

pub use config::{ConfigError, Credential, OrchestratorConfig};
pub use events::{EventCallback, RequestEvent};
pub use github::{RateLimitError, RateLimitResource, RateLimitResponse, RateLimitStatus};
pub use http::{HttpMethod, HttpTransport};
pub use orchestrator::{
    AttemptResult, FailureKind, Orchestrator, Outcome, RequestError, RequestSpec,
};
pub use retry::RetryDelay;
