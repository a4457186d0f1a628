use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use console::style;
use issue_scout::{FailureKind, HttpMethod, Orchestrator, RequestError, RequestSpec};
use serde_json::Value;

use crate::shutdown;

/// Exit code for malformed input (sysexits EX_USAGE).
pub(crate) const EXIT_USAGE: u8 = 64;

/// Arguments for a single API request.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RequestArgs {
    /// Endpoint path relative to the API base (e.g., /repos/OWNER/REPO/issues)
    pub endpoint: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: HttpMethod,

    /// JSON request body
    #[arg(short = 'd', long, conflicts_with = "body_file")]
    pub data: Option<String>,

    /// Read the JSON request body from a file ("-" for stdin)
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Give up after this many seconds, retries and waits included (overrides config)
    #[arg(long)]
    pub deadline: Option<u64>,
}

/// Handle the request command.
pub(crate) async fn handle_request(
    args: RequestArgs,
    orchestrator: &Orchestrator,
    default_deadline: Option<Duration>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let body = match load_body(args.data.as_deref(), args.body_file.as_deref()) {
        Ok(body) => body,
        Err(message) => {
            eprintln!("{} {}", style("error:").red().bold(), message);
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };

    let mut spec = RequestSpec::new(args.method, args.endpoint);
    if let Some(body) = body {
        spec = spec.with_body(body);
    }

    let deadline = args
        .deadline
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .or(default_deadline);

    let outcome = orchestrator
        .execute_with(&spec, shutdown::shutdown_signal(), deadline)
        .await;

    match outcome {
        Ok(body) => {
            println!("{body}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_failure(&err);
            Ok(ExitCode::from(exit_code(err.kind())))
        }
    }
}

/// Process exit code for each failure kind.
pub(crate) fn exit_code(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::Auth => 2,
        FailureKind::RetriesExhausted => 3,
        FailureKind::DeadlineExceeded => 4,
        FailureKind::InvalidRequest => EXIT_USAGE,
        FailureKind::Cancelled => 130,
    }
}

fn report_failure(err: &RequestError) {
    eprintln!(
        "{} {} ({})",
        style("error:").red().bold(),
        err,
        style(err.kind()).dim()
    );
    if let Some(body) = err.last_body().filter(|b| !b.trim().is_empty()) {
        eprintln!("{}", style("last response:").yellow());
        eprintln!("{body}");
    }
}

/// Parse the request body from `--data` or `--body-file`.
pub(crate) fn load_body(data: Option<&str>, file: Option<&Path>) -> Result<Option<Value>, String> {
    let raw = match (data, file) {
        (Some(data), _) => data.to_string(),
        (None, Some(path)) if path == Path::new("-") => {
            std::io::read_to_string(std::io::stdin())
                .map_err(|e| format!("failed to read body from stdin: {e}"))?
        }
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        (None, None) => return Ok(None),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("request body is not valid JSON: {e}"))
}
