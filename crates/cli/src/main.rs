//! inferlog: audit a prompt, then stream its completion.
//!
//! The prompt and the fixed context are written to the secure audit log
//! first; only when that succeeds is the completion requested and streamed
//! to stdout. Diagnostics go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use inferlog_config::{ConfigError, ConfigOverrides};

mod commands;

#[derive(Parser)]
#[command(
    name = "inferlog",
    about = "Record a prompt to a secure audit log, then stream its completion",
    version
)]
struct Cli {
    /// The prompt to send
    prompt: String,

    /// Chat-completion model [default: gpt-4o-mini]
    #[arg(long, env = "INFERLOG_MODEL")]
    model: Option<String>,

    /// Secure Audit Log API token
    #[arg(long, env = "PANGEA_AUDIT_TOKEN", hide_env_values = true)]
    audit_token: Option<String>,

    /// Secure Audit Log configuration ID
    #[arg(long, env = "PANGEA_AUDIT_CONFIG_ID")]
    audit_config_id: Option<String>,

    /// Audit service domain [default: aws.us.pangea.cloud]
    #[arg(long, env = "PANGEA_DOMAIN")]
    pangea_domain: Option<String>,

    /// Completion provider API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL [default: https://api.openai.com/v1]
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Read the context from this file instead of the built-in one
    #[arg(long, env = "INFERLOG_CONTEXT_FILE")]
    context_file: Option<PathBuf>,

    /// Config file [default: ~/.inferlog/config.toml]
    #[arg(long, env = "INFERLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            audit_token: self.audit_token.clone(),
            audit_config_id: self.audit_config_id.clone(),
            pangea_domain: self.pangea_domain.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
            context_file: self.context_file.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // `.env` values replace variables inherited from the environment
    if let Err(e) = dotenvy::dotenv_override() {
        if !e.not_found() {
            eprintln!("error: failed to load .env: {e}");
            return ExitCode::FAILURE;
        }
    }

    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for the completion
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match commands::ask::resolve_config(cli.config.as_deref(), cli.overrides()) {
        Ok(config) => config,
        Err(e @ ConfigError::MissingCredential { .. }) => {
            Cli::command().error(ErrorKind::MissingRequiredArgument, e).exit()
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match commands::ask::run(&config, cli.prompt).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", commands::ask::error_line(&e));
            ExitCode::FAILURE
        }
    }
}
