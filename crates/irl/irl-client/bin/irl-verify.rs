use std::{
    io::Read,
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::WrapErr,
};
use irl_client::{
    ClientConfig,
    EndpointMode,
    VerificationError,
    VerifyClient,
};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Exit code for an accepted payload.
const EXIT_ACCEPTED: i32 = 0;
/// Exit code for any verdict other than accepted.
const EXIT_REFUSED: i32 = 1;
/// Exit code when the sidecar could not be reached.
const EXIT_TRANSPORT: i32 = 2;

/// Verify a JSON payload against an IRL sidecar
#[derive(Parser, Debug)]
#[command(name = "irl-verify", author, version, about, long_about = None)]
struct Cli {
    /// Sidecar URL
    #[arg(long, env = "IRL_SIDECAR_URL", default_value = "http://localhost:3000")]
    url: String,
    /// Integration the payload belongs to
    #[arg(long, short)]
    integration: String,
    /// API key sent as x-irl-api-key
    #[arg(long, env = "IRL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Endpoint resolution mode (fixed or templated)
    #[arg(long, env = "IRL_ENDPOINT_MODE", default_value_t = EndpointMode::Templated)]
    mode: EndpointMode,
    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    connect_timeout_ms: u64,
    /// Inline JSON payload
    #[arg(long, conflicts_with = "file")]
    payload: Option<String>,
    /// Read the payload from a file. Stdin is read when neither this nor --payload is given.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Print the outcome as a JSON object
    #[arg(long)]
    json: bool,
    /// Log level
    #[arg(long, env = "IRL_LOG_LEVEL", default_value = "warn")]
    log_level: LevelFilter,
}

impl Cli {
    fn read_payload(&self) -> Result<Vec<u8>> {
        if let Some(payload) = &self.payload {
            return Ok(payload.clone().into_bytes());
        }
        if let Some(file) = &self.file {
            return std::fs::read(file)
                .wrap_err_with(|| format!("Failed to read payload from {}", file.display()));
        }
        let mut payload = Vec::new();
        std::io::stdin()
            .read_to_end(&mut payload)
            .wrap_err("Failed to read payload from stdin")?;
        Ok(payload)
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url.clone())
            .with_mode(self.mode)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms));
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .install()?;

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.log_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let payload = cli.read_payload()?;
    let client = VerifyClient::new(cli.client_config())?;

    let result = client.verify(&cli.integration, payload).await;
    let code = exit_code(&result);

    if cli.json {
        let output = match &result {
            Ok(accepted) => {
                json!({
                    "status": "accepted",
                    "integration": cli.integration,
                    "forwarded": accepted.forwarded,
                })
            }
            Err(err) => {
                json!({
                    "status": outcome_label(err),
                    "integration": cli.integration,
                    "http_status": err.status(),
                    "error": {
                        "message": err.to_string(),
                    },
                })
            }
        };
        println!("{output}");
    } else {
        match &result {
            Ok(accepted) if accepted.forwarded => {
                println!("accepted: {} (forwarded)", cli.integration);
            }
            Ok(_) => println!("accepted: {}", cli.integration),
            Err(VerificationError::Rejected { violations, detail }) if !violations.is_empty() => {
                eprintln!("rejected: {}", cli.integration);
                for violation in violations {
                    eprintln!("  {violation}");
                }
                tracing::debug!(%detail, "Raw rejection body");
            }
            Err(err) => eprintln!("{}: {err}", outcome_label(err)),
        }
    }

    std::process::exit(code);
}

fn outcome_label(err: &VerificationError) -> &'static str {
    match err {
        VerificationError::Rejected { .. } => "rejected",
        VerificationError::Unauthorized { .. } => "unauthorized",
        VerificationError::Transport(_) => "transport_error",
        VerificationError::Server { .. } => "server_error",
        VerificationError::InvalidRequest(_) => "invalid_request",
    }
}

fn exit_code<T>(result: &std::result::Result<T, VerificationError>) -> i32 {
    match result {
        Ok(_) => EXIT_ACCEPTED,
        Err(VerificationError::Transport(_)) => EXIT_TRANSPORT,
        Err(_) => EXIT_REFUSED,
    }
}
