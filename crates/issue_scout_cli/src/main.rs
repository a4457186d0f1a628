//! Issue Scout CLI - rate-limit-aware requests against the GitHub REST API.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::{Term, style};
use issue_scout::{ConfigError, Orchestrator};
use tracing_subscriber::EnvFilter;

use crate::commands::limits::OutputFormat;
use crate::commands::request::{EXIT_USAGE, RequestArgs};
use crate::progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "issue-scout")]
#[command(version)]
#[command(about = "Rate-limit-aware requests against the GitHub REST API")]
#[command(
    long_about = "Issue Scout sends GitHub REST API requests on behalf of automation. It waits \
out an exhausted rate limit before sending, backs off when GitHub rejects a request for \
rate limiting, retries transient failures a bounded number of times, and prints either the \
response body or a single typed failure."
)]
#[command(after_long_help = r#"EXAMPLES
    List open issues:
        $ issue-scout request '/repos/rust-lang/rust/issues?state=open&per_page=50'

    Comment on an issue:
        $ issue-scout request -X POST /repos/OWNER/REPO/issues/7/comments -d '{"body":"Reproduced."}'

    Close an issue, giving up after two minutes:
        $ issue-scout request -X PATCH /repos/OWNER/REPO/issues/7 -d '{"state":"closed"}' --deadline 120

    Show the current rate limit budget:
        $ issue-scout limits

EXIT STATUS
    0    Success; the response body is on stdout
    2    The token was rejected (HTTP 401)
    3    Transient failures outlasted the retry budget
    4    The deadline passed
    64   Invalid input (missing body, malformed JSON, bad configuration)
    130  Cancelled with Ctrl+C

CONFIGURATION
    Issue Scout reads configuration from:
      1. ~/.config/issue-scout/config.toml (or $XDG_CONFIG_HOME/issue-scout/config.toml)
      2. ./issue-scout.toml
      3. Environment variables (ISSUE_SCOUT_* prefix, e.g., ISSUE_SCOUT_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    ISSUE_SCOUT_GITHUB_TOKEN    GitHub personal access token
    GITHUB_TOKEN                Used when no other token is configured
    RUST_LOG                    Log filter for non-interactive output (default: issue_scout=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one API request and print the response body
    Request(RequestArgs),
    /// Show current rate limit status
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a TTY; interactive runs
    // get the spinner instead.
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("issue_scout=info,issue_scout_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();

    // Commands that need no token
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = config::Config::load();
    let orchestrator_config = match config.orchestrator_config() {
        Ok(orchestrator_config) => orchestrator_config,
        Err(e) => return Ok(startup_failure(&e)),
    };
    let orchestrator = match Orchestrator::from_config(orchestrator_config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => return Ok(startup_failure(&e)),
    };

    match cli.command {
        Commands::Request(args) => {
            let reporter = Arc::new(ProgressReporter::new());
            let orchestrator = orchestrator.with_event_callback(reporter.as_callback());
            let code = commands::request::handle_request(args, &orchestrator, config.deadline())
                .await;
            reporter.finish();
            code
        }
        Commands::Limits { output } => {
            commands::limits::handle_limits(&orchestrator, output).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { .. } | Commands::Man { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn startup_failure(err: &ConfigError) -> ExitCode {
    eprintln!("{} {}", style("error:").red().bold(), err);
    if matches!(err, ConfigError::MissingToken) {
        eprintln!(
            "Set ISSUE_SCOUT_GITHUB_TOKEN, or add [github] token = \"...\" to {}",
            config::Config::default_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "issue-scout.toml".to_string())
        );
    }
    ExitCode::from(EXIT_USAGE)
}
