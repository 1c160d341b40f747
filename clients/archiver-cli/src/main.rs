//! archiver-cli - Archiver discovery command line interface

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use archiver_discovery::config::{DEFAULT_CACHE_PATH, DEFAULT_CONFIG_PATH, DEFAULT_ENV_VAR};
use archiver_discovery::{CandidateEndpoint, Discovery, DiscoveryConfig, Endpoint, candidate_sets};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Archiver configuration file
    #[arg(long, env = "ARCHIVER_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Cache file for the remote seed list
    #[arg(long, env = "ARCHIVER_SEED_CACHE_PATH", default_value = DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// Environment variable holding ip:port:publicKey entries
    #[arg(long, env = "ARCHIVER_DISCOVERY_ENV_VAR", default_value = DEFAULT_ENV_VAR)]
    env_var: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "ARCHIVER_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Hex public key allowed to sign on behalf of any archiver (repeatable)
    #[arg(long, env = "ARCHIVER_TRUSTED_SIGNERS", value_delimiter = ',')]
    trusted_signer: Vec<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the raw candidates from every source
    Sources,

    /// Resolve and display the archiver roster
    Roster,

    /// Fetch an endpoint from the first responsive archiver
    Get {
        /// Endpoint path, e.g. cycleinfo/1
        endpoint: String,

        /// Only accept a response with a valid archiver signature
        #[arg(long)]
        signed: bool,
    },
}

fn discovery_config(cli: &Cli) -> DiscoveryConfig {
    DiscoveryConfig {
        env_var: cli.env_var.clone(),
        config_path: cli.config.clone(),
        cache_path: cli.cache.clone(),
        request_timeout: Duration::from_millis(cli.timeout_ms),
        trusted_signers: cli.trusted_signer.clone(),
        skip_roster_init: false,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "archiver_discovery=info,archiver_cli=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_candidates(title: &str, candidates: &[CandidateEndpoint]) {
    println!("{}", format!("{} ({}):", title, candidates.len()).cyan().bold());
    if candidates.is_empty() {
        println!("{}", "  (none)".yellow());
        return;
    }
    for candidate in candidates {
        println!("  {}", candidate);
    }
}

fn print_roster(roster: &[Endpoint]) {
    println!("{}", "Archiver Roster:".cyan().bold());
    for (i, endpoint) in roster.iter().enumerate() {
        println!("  {:>3}. {} {}", i + 1, endpoint, endpoint.public_key.dimmed());
    }
}

async fn setup(cli: &Cli) -> Result<Discovery> {
    println!(
        "{}",
        format!("Resolving archivers from {}...", cli.config.display()).green()
    );
    Discovery::setup(discovery_config(cli))
        .await
        .context("Archiver discovery failed")
}

// ==================== Commands ====================

async fn cmd_sources(cli: &Cli) -> Result<()> {
    let sets = candidate_sets(&discovery_config(cli)).await;

    print_candidates(&format!("Environment ${}", cli.env_var), &sets.env);
    print_candidates(&format!("Config {}", cli.config.display()), &sets.config);
    print_candidates(&format!("Seed list {}", cli.cache.display()), &sets.remote);

    if sets.is_empty() {
        println!();
        println!("{}", "No archiver candidates found.".red());
    }
    Ok(())
}

async fn cmd_roster(cli: &Cli) -> Result<()> {
    let discovery = setup(cli).await?;
    let roster = discovery.archivers()?;

    println!();
    print_roster(&roster);
    println!();
    println!("{}", format!("{} archivers", roster.len()).green().bold());
    Ok(())
}

async fn cmd_get(cli: &Cli, endpoint: &str, signed: bool) -> Result<()> {
    let discovery = setup(cli).await?;
    tracing::debug!(endpoint = %endpoint, signed, "Fetching from archivers");

    let response: Option<Value> = if signed {
        discovery.get_signed(endpoint).await?
    } else {
        discovery.get(endpoint).await?
    };

    let Some(value) = response else {
        anyhow::bail!("No archiver returned a usable response for {}", endpoint);
    };

    if let Some(first) = discovery.archivers()?.first() {
        println!("{}", format!("Served by {}", first).green());
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ==================== Main ====================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match &cli.command {
        Commands::Sources => cmd_sources(&cli).await,
        Commands::Roster => cmd_roster(&cli).await,
        Commands::Get { endpoint, signed } => cmd_get(&cli, endpoint, *signed).await,
    }
}
