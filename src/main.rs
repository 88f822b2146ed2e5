mod config;
mod format;
mod http;
mod metrics;
mod poller;
mod render;
mod snapshot;
mod source;
mod speedtest;
mod surface;

use axum::serve;
use clap::Parser;
use config::Config;
use metrics::Metrics;
use poller::Poller;
use source::HttpSource;
use speedtest::{SharedPhase, SpeedTestController};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use surface::MemorySurface;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostboard")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./hostboard.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Overrides the producer base URL from the config file.
    #[arg(long)]
    endpoint: Option<String>,
    /// Run a single poll cycle, print the rendered regions and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let source = match HttpSource::new(&cfg) {
        Ok(source) => Arc::new(source),
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            std::process::exit(1);
        }
    };
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialise metrics");
            std::process::exit(1);
        }
    };
    let surface = Arc::new(MemorySurface::new());
    let phase = SharedPhase::default();
    let speedtest = Arc::new(SpeedTestController::new(
        source.clone(),
        surface.clone(),
        phase.clone(),
        metrics.clone(),
    ));
    let poller = Poller::new(source, surface.clone(), phase, metrics.clone());

    if cli.once {
        let result = poller.run_cycle().await;
        print!("{}", surface.view().to_text());
        if result.is_err() {
            std::process::exit(1);
        }
        return;
    }

    info!(
        endpoint = %cfg.endpoint,
        listen = %cfg.listen,
        fetch_timeout_ms = cfg.fetch_timeout_ms,
        "starting hostboard"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let listen = cfg.listen.clone();
        let app = http::build_router(metrics, surface, speedtest);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %listen, "invalid listen address");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "failed to bind HTTP server");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "HTTP server error");
            }
        })
    };

    let poll_handle = poller.start();

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    poll_handle.stop().await;
    let _ = http_task.await;
}

fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    match &cli.endpoint {
        Some(endpoint) if !Path::new(&cli.config).exists() => {
            let cfg = Config::with_endpoint(endpoint);
            cfg.validate()?;
            Ok(cfg)
        }
        _ => Config::load_from_file(&cli.config, cli.endpoint.as_deref()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
