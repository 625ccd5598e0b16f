//! ==============================================================================
//! main.rs - live dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     polls one device document in a realtime database and serves a live
//!     dashboard that only changes when the device writes a new reading.
//!
//! responsibilities:
//!     - load configuration (dashboard.toml or defaults)
//!     - initialize logging
//!     - serve the dashboard page and json api
//!     - run the poll loop (fetch -> detect change -> record -> publish)
//!
//! relationships:
//!     - uses: config.rs, fetcher.rs, poller.rs, server.rs
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌─────────────────────────┐     ┌───────────────────────┐   │
//!     │  │ poll loop (3s cycle)    │     │ web server (port 3000)│   │
//!     │  │ owns PollState/History  │     │ reads AppState        │   │
//!     │  └───────────┬─────────────┘     └───────────┬───────────┘   │
//!     │              │ writes    ┌──────────┐  reads │               │
//!     │              └─────────> │ AppState │ <──────┘               │
//!     │                          └──────────┘                        │
//!     └──────────────┼──────────────────────────────────────────────┘
//!                    │ GET {base_url}/devices/{device_id}.json
//!                    ▼
//!             ┌─────────────┐
//!             │ realtime db │
//!             └─────────────┘
//!
//! ==============================================================================

mod config;
mod domain;
mod fetcher;
mod history;
mod poller;
mod render;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to config/dashboard.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // startup banner
    println!("===========================================================");
    println!("  Smart IoT Dashboard");
    println!("  \"Only redraws when the device writes\"");
    println!("===========================================================");

    // step 1: load configuration
    // logging is not up yet, so bootstrap at info and re-read the level after
    let config = {
        let _bootstrap = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).finish(),
        );
        config::DashboardConfig::load_or_default(args.config.as_deref())?
    };
    init_logging(&config.logging.level);
    config.print_summary();

    // step 2: initialize shared state
    let state: server::SharedState = Arc::new(RwLock::new(server::AppState::default()));

    // step 3: build the fetcher
    let fetcher = fetcher::HttpFetcher::new(
        &config.source.base_url,
        &config.source.device_id,
        config.source.timeout(),
    )?;
    tracing::info!("[STARTUP] ✓ Source: {}", fetcher.url());

    // step 4: bind now (a taken port is fatal), then serve in background
    let listener = server::bind(&config.server.bind).await?;
    tracing::info!("[STARTUP] ✓ Dashboard live at http://{}", config.server.bind);
    let web_state = state.clone();
    let refresh = config.polling.interval();
    tokio::spawn(async move {
        if let Err(e) = server::serve(listener, web_state, refresh).await {
            tracing::error!("[ERROR] Web server error: {:#}", e);
        }
    });

    // step 5: main polling loop
    let poller = poller::Poller::new(fetcher, state, &config);
    tokio::select! {
        _ = poller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[RUNTIME] Exiting");
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("[CONFIG] Unknown log level {:?}, using info", level);
        tracing::Level::INFO
    });
    tracing_subscriber::fmt().with_max_level(level).init();
}
