use std::sync::Arc;

use clap::Parser;
use parlor_core::ParlorConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use parlor_server::generator::PlaceholderGenerator;
use parlor_server::http::{self, HttpState};
use parlor_server::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "parlor.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ParlorConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Build the storage backend once; every request shares it
    let store = match parlor_core::create_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialise {:?} storage: {}", config.storage.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        let result = store.health().await;
        store.close().await;
        match result {
            Ok(v) => println!("✅ Storage ({}) reachable: {}", store.name(), v),
            Err(e) => {
                println!("❌ Storage ({}) check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(PlaceholderGenerator),
        config.history.max_turns,
    );
    let state = Arc::new(HttpState { pipeline, config });

    let served = http::start_http_server(state, tx.subscribe()).await;

    // Teardown happens once, after the server stops accepting requests
    store.close().await;
    served
}
