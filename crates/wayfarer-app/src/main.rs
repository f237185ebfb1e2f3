//! Wayfarer application binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML > defaults)
//! 2. Open the SQLite offer catalog, optionally seeding demo offers
//! 3. Build the suggestion service (LLM extractor when configured)
//! 4. Start the conversation sweeper
//! 5. Start the axum REST API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use wayfarer_api::{create_router, AppState};
use wayfarer_chat::{LlmIntentExtractor, SqliteCatalog, SuggestService};
use wayfarer_core::config::WayfarerConfig;
use wayfarer_storage::{seed_demo_catalog, Database, OfferRepository};

use cli::CliArgs;

/// Expand a leading `~` to the user's home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir
        .strip_prefix("~/")
        .or_else(|| data_dir.strip_prefix("~\\"))
    {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(data_dir)
}

/// Periodically drop idle conversations so the store stays bounded.
async fn conversation_sweeper(state: AppState, interval_secs: u64) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
    tracing::info!(
        interval_secs,
        ttl_secs = state.suggest.conversations().ttl().as_secs(),
        "Conversation sweeper started"
    );

    loop {
        interval.tick().await;
        let evicted = state.suggest.conversations().evict_expired();
        if evicted > 0 {
            tracing::info!(
                evicted,
                remaining = state.suggest.conversations().len(),
                "Expired conversations evicted"
            );
        } else {
            tracing::debug!("Sweep found no expired conversations");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = WayfarerConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.server.port = args.resolve_port(config.server.port);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Wayfarer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("wayfarer.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite catalog opened");

    let repo = OfferRepository::new(Arc::clone(&db));
    if args.seed_demo {
        let inserted = seed_demo_catalog(&repo)?;
        tracing::info!(inserted, "Demo catalog seeded");
    }

    // Suggestion service.
    let catalog = Arc::new(SqliteCatalog::new(repo));
    let mut service = SuggestService::new(&config, catalog);
    match LlmIntentExtractor::from_config(&config.llm) {
        Some(extractor) => {
            tracing::info!(model = %extractor.model(), "LLM intent extraction enabled");
            service = service.with_extractor(Arc::new(extractor));
        }
        None => {
            tracing::info!("LLM intent extraction disabled, using heuristic extraction only");
        }
    }

    let sweep_interval = config.chat.sweep_interval_secs;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;
    let state = AppState::new(config, service);

    // === Background tasks ===

    let sweeper_state = state.clone();
    tokio::spawn(async move {
        conversation_sweeper(sweeper_state, sweep_interval).await;
    });

    // === API server ===

    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind - is another instance running?");
            tracing::error!("Try: wayfarer --port {}", port.saturating_add(1));
            return Err(e.into());
        }
    };

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
