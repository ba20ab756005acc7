//! Panel host binary
//!
//! Console on stdin/stdout, logs on stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use snon::Store;

use panel::{Clock, Console, Model, PanelConfig, Refresher};

/// SNON front-panel host
#[derive(Parser, Debug)]
#[command(name = "panel")]
#[command(about = "SNON front-panel host", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Panel model, overrides the config file
    #[arg(short, long, value_enum)]
    model: Option<Model>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting panel host v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match PanelConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(model) = args.model {
        config.panel.model = model;
    }

    let model = config.panel.model;
    let store = match Store::initialize(config.store.clone(), config.panel.device_name()) {
        Ok(store) => store.shared(),
        Err(e) => {
            error!("Failed to initialize store: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = model.install(&store, &config.panel.firmware_version) {
        error!("Failed to wire {} profile: {}", model, e);
        std::process::exit(1);
    }
    info!(
        "{} ready: {} entities, {} relationships",
        config.panel.device_name(),
        store.len(),
        store.relationship_count()
    );

    let clock = Arc::new(if config.clock.system_time {
        Clock::from_system()
    } else {
        Clock::new()
    });

    let redraw = Arc::new(Notify::new());
    let refresher = Refresher::new(store.clone(), clock.clone());
    let period = Duration::from_millis(config.refresh.interval_ms);
    let refresh = tokio::spawn(refresher.run(period, redraw.clone()));

    let console = Console::new(store, clock);

    tokio::select! {
        result = run_console(console, &config, redraw) => {
            if let Err(e) = result {
                error!("Console error: {}", e);
            }
            info!("Console closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    refresh.abort();
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("panel=info,snon=info"));
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

async fn run_console(console: Console, config: &PanelConfig, redraw: Arc<Notify>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(config.console.prompt.as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if config.console.echo {
            stdout.write_all(line.as_bytes()).await?;
        }

        let reply = console.handle_line(&line);
        stdout.write_all(reply.text.as_bytes()).await?;
        stdout.write_all(config.console.prompt.as_bytes()).await?;
        stdout.flush().await?;

        if reply.refresh {
            redraw.notify_one();
        }
    }
    Ok(())
}
