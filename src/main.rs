//! zm-exporter - Prometheus exporter for ZoneMinder.
//!
//! Polls the ZoneMinder management API and per-monitor shared-memory
//! segments on every scrape and exposes the result on `/metrics`.

mod api;
mod collect;
mod config;
mod metrics;
mod shm;
mod web;

use std::sync::Arc;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use api::ZmClient;
use config::ExporterConfig;
use web::Server;

/// ZoneMinder Prometheus exporter.
#[derive(Parser)]
#[command(name = "zm-exporter", about = "ZoneMinder exporter", version)]
struct Args {
    /// Verbose output. Specify twice for debug-level output.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize the tracing subscriber from the verbosity counter.
/// Default is warnings only; debug level adds file/line detail.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("zm_exporter={level}").parse().expect("valid directive"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if verbose >= 2 {
        builder.with_file(true).with_line_number(true).init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Missing required configuration must stop the process before it ever
    // starts serving.
    let cfg = ExporterConfig::load()?;
    tracing::info!("connecting to the ZoneMinder API at {}", cfg.api_url);

    let client = Arc::new(ZmClient::connect(&cfg).await?);

    tracing::info!("starting HTTP server on port {}", cfg.http_port);
    let server = Server::new(cfg, client);
    server.start().await?;

    Ok(())
}
