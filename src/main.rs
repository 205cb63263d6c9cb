use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger_service::config::{Config, PriceProvider};
use wallet_ledger_service::db::connection;
use wallet_ledger_service::gate::RateGate;
use wallet_ledger_service::metadata::{HeliusMetaSource, JupiterMetaSource, MetaSource, TokenMetaResolver};
use wallet_ledger_service::oracle::{BirdeyeOracle, CachingOracle, GeckoTerminalOracle, PriceOracle};
use wallet_ledger_service::provider::HeliusProvider;
use wallet_ledger_service::{AppState, IndexerError};

#[derive(Parser)]
#[command(
    name = "wallet-ledger-service",
    about = "Wallet indexer and FIFO position reconstruction for the Solana account model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a wallet's full history backward from the durable cursor.
    Backfill {
        wallet: String,
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Ingest only transactions newer than the last known signature.
    SyncTail { wallet: String },
    /// Show sync state and row counts for a wallet.
    Status { wallet: String },
    /// Re-verify and repair the recently verified slot window.
    ReconcileRecent {
        wallet: String,
        #[arg(long, default_value_t = 10_000)]
        window: i64,
    },
    /// Reconstruct FIFO positions with realized / peak / regret metrics.
    Analyze { wallet: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(code = e.code(), "{}", e);
        if let Some(hint) = e.hint() {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), IndexerError> {
    let config = Config::from_env()?;

    let db_pool = connection::establish_connection(&config.database_url).await?;
    info!("database ready at {}", config.database_url);

    let provider_gate = Arc::new(RateGate::new(
        config.provider_concurrency,
        config.provider_rps,
    ));
    let provider = Arc::new(
        HeliusProvider::new(&config, provider_gate)
            .map_err(|e| IndexerError::UpstreamPermanent(e.to_string()))?,
    );

    let metadata_gate = Arc::new(RateGate::new(2, 2));
    let mut sources: Vec<Box<dyn MetaSource>> = Vec::new();
    match HeliusMetaSource::new(&config) {
        Ok(source) => sources.push(Box::new(source)),
        Err(e) => error!("helius metadata source unavailable: {}", e),
    }
    match JupiterMetaSource::new(&config) {
        Ok(source) => sources.push(Box::new(source)),
        Err(e) => error!("jupiter metadata source unavailable: {}", e),
    }
    let resolver = Arc::new(TokenMetaResolver::new(
        db_pool.clone(),
        metadata_gate,
        sources,
        &config,
    ));

    let upstream_oracle: Arc<dyn PriceOracle> = match config.price_provider {
        PriceProvider::Birdeye => Arc::new(
            BirdeyeOracle::new(&config)
                .map_err(|e| IndexerError::UpstreamPermanent(e.to_string()))?,
        ),
        PriceProvider::GeckoTerminal => Arc::new(
            GeckoTerminalOracle::new(&config)
                .map_err(|e| IndexerError::UpstreamPermanent(e.to_string()))?,
        ),
    };
    let oracle: Arc<dyn PriceOracle> = Arc::new(CachingOracle::new(
        upstream_oracle,
        db_pool.clone(),
        &config,
    ));

    let state = AppState {
        config,
        db_pool,
        provider,
        oracle,
        resolver,
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    match cli.command {
        Command::Backfill { wallet, max_pages } => {
            let stats = state.indexer().backfill(&wallet, max_pages, &cancel).await?;
            print_json(&stats);
        }
        Command::SyncTail { wallet } => {
            let stats = state.indexer().sync_tail(&wallet).await?;
            print_json(&stats);
        }
        Command::Status { wallet } => {
            let report = state.indexer().status(&wallet).await?;
            print_json(&report);
        }
        Command::ReconcileRecent { wallet, window } => {
            let outcomes = state
                .reconciler()
                .reconcile_recent_slots(&wallet, window)
                .await?;
            print_json(&outcomes);
        }
        Command::Analyze { wallet } => {
            let summary = state.reconstructor().analyze(&wallet).await?;
            print_json(&summary);
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("failed to render output: {}", e),
    }
}
