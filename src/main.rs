use std::sync::Arc;

use anyhow::{Context, Result};
use bluesky_client::{BlueskyClient, BlueskyConfig};
use clap::{Parser, Subcommand};
use reply_store::ReplyStore;
use responder_core::{AppConfig, ErrorReporter, HashtagMatcher, ResponseCatalog};
use responder_service::{BackgroundService, LocalAssetDir, ReplyOrchestrator};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "hashtag_responder=info,responder_service=info,responder_core=info,bluesky_client=info,reply_store=info";

#[derive(Parser)]
#[command(name = "hashtag-responder", version, about = "Replies to Bluesky posts that use configured hashtags")]
struct Cli {
    #[arg(long, default_value = ".env", help = "Environment file to load before reading configuration")]
    env_file: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run a single pass and exit")]
    Run {
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },
    #[command(about = "Keep running passes on a fixed interval until Ctrl+C")]
    Watch {
        #[arg(long, help = "Minutes between passes (overrides POLL_INTERVAL_MINUTES)")]
        interval: Option<u64>,
    },
    #[command(about = "Check configuration and response catalog without contacting Bluesky")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing env file is fine; real environment variables still apply.
    let _ = dotenvy::from_filename(&cli.env_file);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let catalog = load_catalog(&config)?;

    match cli.command {
        Commands::Validate => {
            tracing::info!("Configuration OK: {:?}", config);
            for rule in catalog.rules() {
                tracing::info!(
                    "Rule {}: {} responses, {} time-sensitive, mode {:?}",
                    rule.hashtag,
                    rule.response_variants.len(),
                    rule.time_sensitive_variants.as_ref().map_or(0, Vec::len),
                    rule.selection_mode
                );
            }
            Ok(())
        }
        Commands::Run { json } => {
            let mut service = build_service(config, catalog, None).await?;
            let outcome = service.run_once().await;
            service.stop().await;
            let report = match outcome {
                Ok(report) => report,
                Err(e) => {
                    ErrorReporter::new().report_error(&e);
                    return Err(e).context("run failed");
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                tracing::info!(
                    "Searched {} queries, {} candidates: {} replied, {} skipped, {} failed",
                    report.searched,
                    report.candidates,
                    report.processed,
                    report.skipped,
                    report.failed
                );
            }
            Ok(())
        }
        Commands::Watch { interval } => {
            let mut service = build_service(config, catalog, interval).await?;
            if let Err(e) = service.start().await {
                ErrorReporter::new()
                    .with_warning_reporting(false)
                    .report_error(&e);
                return Err(e).context("watch loop stopped");
            }
            Ok(())
        }
    }
}

fn load_catalog(config: &AppConfig) -> Result<ResponseCatalog> {
    match &config.catalog_path {
        Some(path) => ResponseCatalog::load(path)
            .with_context(|| format!("failed to load response catalog {}", path.display())),
        None => ResponseCatalog::builtin().context("built-in response catalog is invalid"),
    }
}

async fn build_service(
    config: AppConfig,
    catalog: ResponseCatalog,
    interval_override: Option<u64>,
) -> Result<BackgroundService> {
    tracing::info!(
        "Starting hashtag responder for @{} on {} ({} hashtags)",
        config.handle,
        config.service_url,
        config.hashtags.len()
    );

    let client = BlueskyClient::new(BlueskyConfig::new(config.service_url.clone()))
        .context("failed to build HTTP client")?;

    let mut matcher = HashtagMatcher::new(config.match_mode);
    for rule in catalog.rules() {
        if !rule.extra_variants.is_empty() {
            matcher = matcher.with_special_case(&rule.hashtag, rule.extra_variants.iter().cloned());
        }
    }

    let assets = LocalAssetDir::new(config.assets_dir.clone());
    let history_db = config.history_db.clone();
    let interval = interval_override.unwrap_or(config.poll_interval_minutes);

    let orchestrator =
        ReplyOrchestrator::new(config, Arc::new(client), catalog, matcher, Arc::new(assets));
    let mut service = BackgroundService::new(orchestrator, interval);

    if let Some(location) = history_db {
        let mut store = ReplyStore::new(location);
        store
            .connect()
            .await
            .context("failed to open reply history database")?;
        store
            .run_migrations()
            .await
            .context("failed to prepare reply history database")?;
        service = service.with_store(store);
    }

    Ok(service)
}
