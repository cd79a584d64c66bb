//! Repo-Miner main entry point
//!
//! This is the command-line interface for the Repo-Miner issue extractor.

use anyhow::Context;
use clap::Parser;
use repo_miner::checkpoint::CheckpointStore;
use repo_miner::config::{load_config_with_hash, read_auth_token, Config};
use repo_miner::engine::install_ctrl_c_handler;
use repo_miner::github::GitHubClient;
use repo_miner::output::print_summary;
use repo_miner::quota::QuotaSession;
use repo_miner::{EntityType, Extractor, SchemaRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Repo-Miner: a resumable issue extractor for the GitHub API
///
/// Repo-Miner walks a range of issue numbers, expands each issue into its
/// pull request, commit and comment data as configured, and merges the
/// records into a JSON document that survives rate limits and interruptions.
#[derive(Parser, Debug)]
#[command(name = "repo-miner")]
#[command(version)]
#[command(about = "A resumable issue extractor for the GitHub API", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be extracted without any network access
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("repo_miner=info,warn"),
            1 => EnvFilter::new("repo_miner=debug,info"),
            2 => EnvFilter::new("repo_miner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let registry = SchemaRegistry::new();

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config, &registry)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let selection = registry.selection(&config)?;

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let token = read_auth_token(&config.auth_path).context("Failed to read credential")?;
    let client = GitHubClient::new(&config, &token).context("Failed to build HTTP client")?;
    let shutdown = install_ctrl_c_handler();

    let quota = QuotaSession::authenticate(&client)
        .await
        .context("Authentication failed")?;
    tracing::info!(
        "Quota: {} of {} calls left",
        quota.remaining_calls(),
        quota.limit()
    );

    let store = CheckpointStore::new(config.output_path());
    let extractor = Extractor::new(client, selection, config, store, quota, shutdown);
    let summary = extractor.run().await.context("Extraction stopped")?;

    print_summary(&summary);
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be extracted
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Repo-Miner Dry Run ===\n");

    println!("Repository:");
    println!("  Name: {}", config.repo);
    println!("  API: {}", config.api_url);
    println!("  Issue state: {}", config.state);
    println!("  Range: #{} to #{}", config.range.0, config.range.1);

    println!("\nFields:");
    for entity in EntityType::all() {
        let fields = config.fields_for(entity);
        if fields.is_empty() {
            println!("  {}: (not fetched)", entity);
        } else {
            println!("  {}: {}", entity, fields.join(", "));
        }
    }

    println!("\nEngine:");
    println!("  Page size: {}", config.engine.per_page);
    println!(
        "  Network retries: {} every {}s",
        config.engine.max_network_retries, config.engine.network_retry_delay_secs
    );

    println!("\nOutput:");
    println!("  Document: {}", config.output_path().display());
    println!("  Credential: {}", config.auth_path.display());

    if config.auth_path.is_file() {
        println!("\n✓ Configuration is valid");
    } else {
        anyhow::bail!(
            "credential file {} does not exist",
            config.auth_path.display()
        );
    }

    Ok(())
}
