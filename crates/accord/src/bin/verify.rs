//! Accord Provider Verifier CLI Tool
//!
//! Replays the HTTP interactions of one or more pact files against a running
//! provider and reports which ones it honours.
//!
//! Usage:
//!   accord-verify --provider-url http://localhost:8080 pacts/*.json [OPTIONS]
//!
//! Features:
//! - Provider state setup through a state change endpoint
//! - Description and provider state filters
//! - Seeded generators for reproducible requests
//! - Text or JSON report

use accord::config::AccordConfig;
use accord::verifier::{
    HttpProviderClient, HttpStateChangeHandler, InteractionResult, ProviderVerifier,
    VerificationReport,
};
use accord::{Interaction, Pact, VerificationResult};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Accord Provider Verifier - check a provider against its consumers' pacts
#[derive(Parser, Debug)]
#[command(name = "accord-verify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pact files to verify
    #[arg(required = true)]
    pacts: Vec<PathBuf>,

    /// Base URL of the provider under test
    #[arg(short = 'u', long, env = "ACCORD_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "ACCORD_CONFIG")]
    config: Option<PathBuf>,

    /// Endpoint receiving provider state change calls
    #[arg(long, env = "ACCORD_STATE_CHANGE_URL")]
    state_change_url: Option<String>,

    /// Also call the state change endpoint with "action": "teardown"
    #[arg(long)]
    state_change_teardown: bool,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Seed for random generators
    #[arg(long)]
    seed: Option<u64>,

    /// Tolerate keys in provider responses that the pact does not name
    #[arg(long)]
    allow_unexpected_keys: bool,

    /// Only verify interactions whose description contains this text
    #[arg(long)]
    filter_description: Option<String>,

    /// Only verify interactions with a provider state containing this text
    #[arg(long)]
    filter_state: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Main Logic
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AccordConfig::from_file(path)?,
        None => AccordConfig::default(),
    };
    let verifier_config = &mut config.verifier;
    if args.provider_url.is_some() {
        verifier_config.provider_url = args.provider_url.clone();
    }
    if args.state_change_url.is_some() {
        verifier_config.state_change_url = args.state_change_url.clone();
    }
    verifier_config.state_change_teardown |= args.state_change_teardown;
    if let Some(secs) = args.timeout {
        verifier_config.request_timeout_ms = secs * 1000;
    }
    if args.seed.is_some() {
        verifier_config.options.seed = args.seed;
    }
    verifier_config.options.allow_unexpected_keys |= args.allow_unexpected_keys;
    if args.filter_description.is_some() {
        verifier_config.options.description_filter = args.filter_description.clone();
    }
    if args.filter_state.is_some() {
        verifier_config.options.state_filter = args.filter_state.clone();
    }
    config.validate()?;

    let verifier_config = config.verifier;
    let provider_url = verifier_config
        .provider_url
        .clone()
        .context("A provider URL is required (--provider-url or verifier.provider_url)")?;
    let timeout = Duration::from_millis(verifier_config.request_timeout_ms);

    let client = HttpProviderClient::new(&provider_url, timeout)?;
    let mut verifier =
        ProviderVerifier::new(Arc::new(client)).with_options(verifier_config.options.clone());
    if let Some(url) = &verifier_config.state_change_url {
        let handler = HttpStateChangeHandler::new(url, timeout)?
            .with_teardown(verifier_config.state_change_teardown);
        verifier = verifier.with_state_handler(Arc::new(handler));
    }

    let json_output = args.output == "json";
    if !json_output {
        println!("{BOLD}{CYAN}Accord Provider Verifier{RESET}");
        println!("{RULE}");
        println!("Provider URL: {provider_url}");
        println!();
    }

    let mut reports = Vec::new();
    for path in &args.pacts {
        let mut pact = Pact::read_file(path)
            .with_context(|| format!("Failed to load pact '{}'", path.display()))?;
        let messages = drop_message_interactions(&mut pact);
        if messages > 0 {
            warn!(
                "{}: skipping {} message interaction(s), they need an in-process producer",
                path.display(),
                messages
            );
        }

        let report = verifier.verify(&pact).await;
        if !json_output {
            print_report(&report, args.verbose);
        }
        reports.push(report);
    }

    let failed: usize = reports.iter().map(|r| r.failures().count()).sum();
    if json_output {
        let value: Vec<_> = reports.iter().map(VerificationReport::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_summary(&reports);
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn drop_message_interactions(pact: &mut Pact) -> usize {
    let before = pact.interactions.len();
    pact.interactions
        .retain(|interaction| matches!(interaction, Interaction::Http(_)));
    before - pact.interactions.len()
}

// ============================================================================
// Report
// ============================================================================

fn print_report(report: &VerificationReport, verbose: bool) {
    println!(
        "{}Pact:{} {} -> {}",
        BOLD, RESET, report.consumer, report.provider
    );
    if report.results.is_empty() {
        println!("   └─ No interactions verified");
    }
    for result in &report.results {
        print_result(result, verbose);
    }
    if verbose {
        for skipped in &report.skipped {
            println!("   {YELLOW}SKIP{RESET} {skipped}");
        }
    }
    println!();
}

fn print_result(result: &InteractionResult, verbose: bool) {
    match &result.result {
        VerificationResult::Ok => {
            println!("   {}PASS{} {}", GREEN, RESET, result.description);
        }
        VerificationResult::PartialMismatch { mismatches } => {
            println!("   {}FAIL{} {}", RED, RESET, result.description);
            for mismatch in mismatches {
                println!("      {DIM}{mismatch}{RESET}");
                if verbose {
                    println!("        expected: {}", mismatch.expected);
                    println!("        {}actual:   {}{}", RED, mismatch.actual, RESET);
                }
            }
        }
        VerificationResult::Error { cause, .. } => {
            println!("   {}ERROR{} {}", RED, RESET, result.description);
            println!("      {DIM}{cause}{RESET}");
        }
    }
}

fn print_summary(reports: &[VerificationReport]) {
    let total: usize = reports.iter().map(|r| r.results.len()).sum();
    let passed: usize = reports.iter().map(VerificationReport::passed).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
    let failed = total - passed;

    println!("{RULE}");
    println!("{BOLD}Verification Summary{RESET}");
    println!("{RULE}");
    println!("  Pacts:        {}", reports.len());
    println!("  Interactions: {total}");
    println!();
    println!("  {}Passed:  {}{}", GREEN, passed, RESET);
    println!("  {}Failed:  {}{}", RED, failed, RESET);
    println!("  {}Skipped: {}{}", YELLOW, skipped, RESET);
    println!();

    if failed == 0 {
        println!("{GREEN}All interactions verified!{RESET}");
    } else {
        println!(
            "{}{} interaction(s) failed. See details above.{}",
            RED, failed, RESET
        );
    }
}
