//! Accord mock server
//!
//! Serves the HTTP interactions of a pact file until interrupted (or until
//! the session timeout), then prints the session verdict as JSON.
//!
//! Usage:
//!   accord --pact pacts/web-api.json [OPTIONS]
//!
//! Exit status is 0 when every interaction was received and nothing else was.

use accord::config::AccordConfig;
use accord::mock_server::{MockServer, TlsConfig};
use accord::Pact;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Accord mock server - replay a pact for consumer tests
#[derive(Parser, Debug)]
#[command(name = "accord")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pact file to serve
    #[arg(long, env = "ACCORD_PACT")]
    pact: PathBuf,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "ACCORD_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long, env = "ACCORD_HOST")]
    host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, env = "ACCORD_PORT")]
    port: Option<u16>,

    /// Seed for random generators
    #[arg(long)]
    seed: Option<u64>,

    /// Stop on its own after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Grace period for open connections on shutdown, in milliseconds
    #[arg(long)]
    grace_period_ms: Option<u64>,

    /// PEM certificate chain; serves https together with --tls-key
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<String>,

    /// PEM private key
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AccordConfig::from_file(path)?,
        None => AccordConfig::default(),
    };
    let server_config = &mut config.mock_server;
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if args.seed.is_some() {
        server_config.seed = args.seed;
    }
    if args.timeout_ms.is_some() {
        server_config.session_timeout_ms = args.timeout_ms;
    }
    if let Some(grace) = args.grace_period_ms {
        server_config.grace_period_ms = grace;
    }
    if let (Some(cert), Some(key)) = (args.tls_cert, args.tls_key) {
        server_config.tls = Some(TlsConfig {
            cert_path: cert,
            key_path: key,
        });
    }
    config.validate()?;

    let pact = Pact::read_file(&args.pact)
        .with_context(|| format!("Failed to load pact '{}'", args.pact.display()))?;
    let timeout = config.mock_server.session_timeout();

    let mut server = MockServer::new(pact, config.mock_server);
    server.start().await?;
    if let Some(url) = server.url() {
        println!("{url}");
    }

    match timeout {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
                _ = tokio::time::sleep(limit) => warn!("Session timeout of {:?} reached", limit),
            }
        }
        None => {
            tokio::signal::ctrl_c().await.ok();
            info!("Interrupted, stopping");
        }
    }

    let result = server.stop().await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
