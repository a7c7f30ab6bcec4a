//! Command-line driver for the resilient client.
//!
//! ```text
//! resilient-client --config client.toml request GET /items --body '{"q":1}'
//! resilient-client --config client.toml health --path /ready
//! resilient-client --config client.toml check-config
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{json, Value};

use resilient_client::client::{ApiResponse, ExecutorError, ParsedBody, RequestOptions};
use resilient_client::config::{load_config, ClientConfig};
use resilient_client::observability::init_logging;
use resilient_client::ResilientClient;

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "Call a dependency with timeouts, retries and a circuit breaker", long_about = None)]
struct Cli {
    /// Client configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured base URL.
    #[arg(short, long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the full resilience pipeline
    Request {
        /// HTTP method (GET, POST, ...)
        method: String,
        /// Path relative to the base URL
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// Per-attempt timeout override in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Value for the x-request-id header
        #[arg(long)]
        trace_id: Option<String>,
    },
    /// Probe the dependency's health endpoint
    Health {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("resilient_client=info");

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    match cli.command {
        Commands::CheckConfig => {
            resilient_client::config::validate_config(&config).map_err(|errors| {
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            })?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health { path, timeout_ms } => {
            let path = path.unwrap_or_else(|| config.health.path.clone());
            let timeout = timeout_ms.map_or(config.health.timeout(), Duration::from_millis);
            let client = ResilientClient::new(config)?;

            let healthy = client.health_check(&path, timeout).await;
            println!("{}", json!({ "dependency": client.name(), "healthy": healthy }));
            Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Request {
            method,
            path,
            body,
            timeout_ms,
            trace_id,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut options = RequestOptions::new();
            if let Some(body) = body {
                options = options.json(serde_json::from_str(&body)?);
            }
            if let Some(ms) = timeout_ms {
                options = options.timeout(Duration::from_millis(ms));
            }
            if let Some(id) = trace_id {
                options = options.trace_id(id);
            }

            let client = ResilientClient::new(config)?;
            let result = client.execute(method, &path, options).await;
            let stats = serde_json::to_value(client.breaker_stats())?;

            match result {
                Ok(response) => {
                    print_response(&response, stats)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    print_error(&e, stats)?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn print_response(response: &ApiResponse, breaker: Value) -> Result<(), serde_json::Error> {
    let body = match &response.body {
        ParsedBody::Empty => Value::Null,
        ParsedBody::Json(value) => value.clone(),
        ParsedBody::Text(text) => Value::String(text.clone()),
    };
    let out = json!({
        "status": response.status.as_u16(),
        "attempts": response.attempts,
        "elapsed_ms": response.elapsed.as_millis() as u64,
        "body": body,
        "breaker": breaker,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_error(error: &ExecutorError, breaker: Value) -> Result<(), serde_json::Error> {
    let out = json!({
        "error": error.outcome(),
        "message": error.to_string(),
        "status": error.status_code().map(|s| s.as_u16()),
        "body": error.response_body(),
        "attempts": error.attempts(),
        "breaker": breaker,
    });
    eprintln!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
