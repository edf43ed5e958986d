//! Trading agent entry point.
//!
//! Loads configuration, connects the marketplace client and the LLM oracle,
//! and runs the negotiation loop until the objective is met. Exits non-zero
//! when the account view cannot be read.

use tracing::info;
use tracing_subscriber::EnvFilter;

use trueque_agent::config::RunnerConfig;
use trueque_agent::llm::create_backend;
use trueque_agent::prompt::PromptEngine;
use trueque_agent::{HttpMarketplace, LlmOracle, NegotiationRunner};
use trueque_core::TradeLedger;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, setup, or the first state sync fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RunnerConfig::from_env()?;
    init_logging(config.json_logs);

    info!("trueque-agent starting");
    info!(
        marketplace_url = %config.marketplace_url,
        templates_dir = %config.templates_dir,
        http_timeout = ?config.http_timeout,
        "configuration loaded"
    );

    let policy = config.load_policy()?;
    info!(
        scarce_resource = %policy.scarce_resource,
        offers_every_n_letters = policy.offers_every_n_letters,
        idle_backoff_ms = policy.idle_backoff_ms,
        "negotiation policy loaded"
    );

    let marketplace = HttpMarketplace::new(&config.marketplace_url, config.http_timeout)?;

    let prompts = PromptEngine::new(&config.templates_dir)?;
    let backend = create_backend(&config.llm)?;
    info!(backend = backend.name(), model = %config.llm.model, "LLM backend configured");

    let ledger = config
        .ledger_path
        .as_deref()
        .map_or_else(TradeLedger::in_memory, TradeLedger::open);

    let mut runner = NegotiationRunner::new(marketplace, LlmOracle::new(prompts, backend), policy)
        .with_display_name(config.display_name.clone())
        .with_ledger(ledger);

    let summary = runner.run().await?;
    info!(
        cycles = summary.cycles,
        letters_processed = summary.letters_processed,
        offers_accepted = summary.offers_accepted,
        confirmations_reciprocated = summary.confirmations_reciprocated,
        packages_sent = summary.packages_sent,
        micro_offers_sent = summary.micro_offers_sent,
        "objective complete, shutting down"
    );

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
