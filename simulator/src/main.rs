use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use guardwatch_simulator::{serve, Fleet, FleetConfig};

#[derive(Parser, Debug)]
#[command(name = "guardwatch-simulator")]
#[command(about = "Fake GPU guard backend for demos and tests", long_about = None)]
struct Args {
    /// Bind address for HTTP server
    #[arg(long, default_value = "0.0.0.0:5000")]
    bind: String,

    /// Number of simulated nodes
    #[arg(long, default_value_t = 5)]
    nodes: usize,

    /// GPUs on each node
    #[arg(long, default_value_t = 8)]
    gpus_per_node: u32,

    /// How many nodes (counted from the first) draw idle power
    #[arg(long, default_value_t = 2)]
    idle_nodes: usize,

    /// How many nodes (counted from the last) report offline
    #[arg(long, default_value_t = 0)]
    offline_nodes: usize,

    /// Initial active power threshold in watts
    #[arg(long, default_value_t = 100.0)]
    threshold: f64,

    /// Initial guard window in minutes
    #[arg(long, default_value_t = 10)]
    interval: u32,

    /// Seed for reproducible telemetry
    #[arg(long)]
    seed: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting GPU guard simulator");

    let config = FleetConfig {
        nodes: args.nodes,
        gpus_per_node: args.gpus_per_node,
        idle_nodes: args.idle_nodes,
        offline_nodes: args.offline_nodes,
        active_power_threshold: args.threshold,
        guard_interval_minutes: args.interval,
        seed: args.seed,
    };
    info!(
        "Simulating {} node(s) x {} GPU(s), {} idle, {} offline",
        config.nodes, config.gpus_per_node, config.idle_nodes, config.offline_nodes
    );
    let fleet = Arc::new(Fleet::new(&config));

    let addr: SocketAddr = args.bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    serve(listener, fleet, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    })
    .await
}
