use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use guardwatch::config::{default_config_path, Config};
use guardwatch::output;
use guardwatch::stats::FleetStats;
use guardwatch::view::{filter_and_sort, SortKey, StatusFilter, ViewQuery};
use guardwatch::{ActionOutcome, GuardApi, HttpGuardClient, Monitor, MonitorSettings};

#[derive(Parser, Debug)]
#[command(name = "guardwatch")]
#[command(about = "Monitor GPU hosts and control their power guards", long_about = None)]
struct Args {
    /// Guard backend URL
    #[arg(long, env = "GUARDWATCH_BASE_URL")]
    base_url: Option<String>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "GUARDWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Flip the online flag reported by the backend
    #[arg(long)]
    invert_online_flag: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ViewArgs {
    /// all, guarding, not_guarding, needs_guard, online, offline
    #[arg(long, default_value = "all")]
    status: StatusFilter,

    /// Case-insensitive hostname substring
    #[arg(long, default_value = "")]
    filter: String,

    /// hostname, totalGpus, guardedNodes, needGuard
    #[arg(long, default_value = "hostname")]
    sort: SortKey,
}

impl ViewArgs {
    fn query(&self) -> ViewQuery {
        ViewQuery {
            status: self.status,
            text: self.filter.clone(),
            sort: self.sort,
        }
    }
}

#[derive(clap::Args, Debug)]
struct PolicyArgs {
    /// Average power (W) below which a GPU counts as idle
    #[arg(long)]
    threshold: Option<f64>,

    /// Averaging window in minutes
    #[arg(long)]
    interval: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the fleet continuously, auto-guarding idle nodes
    Watch {
        #[command(flatten)]
        view: ViewArgs,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Refresh period in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1000..=60000))]
        refresh_ms: Option<u64>,

        /// Only observe; never start guards automatically
        #[arg(long)]
        no_auto_guard: bool,

        /// Number of recent events to show
        #[arg(long, default_value_t = 10)]
        events: usize,
    },
    /// Fetch and print the fleet once
    Nodes {
        #[command(flatten)]
        view: ViewArgs,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Start guards on the given hosts (all hosts when none given)
    StartGuard { hosts: Vec<String> },
    /// Stop guards on the given hosts (all hosts when none given)
    StopGuard { hosts: Vec<String> },
    /// Push the guard policy to the backend
    #[command(group(ArgGroup::new("toggle").args(["enabled", "disabled"])))]
    Policy {
        #[command(flatten)]
        policy: PolicyArgs,

        /// Turn auto-guard on
        #[arg(long)]
        enabled: bool,

        /// Turn auto-guard off
        #[arg(long)]
        disabled: bool,
    },
    /// Inspect or persist the settings file
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Write the effective settings to the settings file
    Save,
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
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    if let Some(url) = &args.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout_secs = Some(secs);
    }
    if args.invert_online_flag {
        config.invert_online_flag = Some(true);
    }

    let client = HttpGuardClient::new(config.base_url(), config.request_timeout())
        .context("Failed to create guard backend client")?
        .with_inverted_online_flag(config.invert_online_flag.unwrap_or(false));

    match args.command {
        Command::Watch {
            view,
            policy,
            refresh_ms,
            no_auto_guard,
            events,
        } => {
            if let Some(ms) = refresh_ms {
                config.refresh_interval_ms = Some(ms);
            }
            apply_policy_args(&mut config, &policy);
            if no_auto_guard {
                config.auto_guard_enabled = Some(false);
            }
            watch(client, config.monitor_settings(), view.query(), events).await
        }
        Command::Nodes { view, json } => {
            let nodes = client.fetch_nodes().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
                return Ok(());
            }
            output::print_overview(&FleetStats::from_nodes(&nodes));
            output::print_nodes(&filter_and_sort(&nodes, &view.query()));
            Ok(())
        }
        Command::StartGuard { hosts } => {
            let ack = client.start_guard(&hosts).await?;
            output::print_ack(&ack);
            Ok(())
        }
        Command::StopGuard { hosts } => {
            let ack = client.stop_guard(&hosts).await?;
            output::print_ack(&ack);
            Ok(())
        }
        Command::Policy {
            policy,
            enabled,
            disabled,
        } => {
            apply_policy_args(&mut config, &policy);
            if enabled {
                config.auto_guard_enabled = Some(true);
            } else if disabled {
                config.auto_guard_enabled = Some(false);
            }
            save_policy(client, config.monitor_settings()).await
        }
        Command::Config { subcommand } => match subcommand {
            ConfigCommand::Show => {
                println!("# {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigCommand::Save => {
                config.save(&config_path)?;
                info!("Settings written to {}", config_path.display());
                Ok(())
            }
        },
    }
}

fn apply_policy_args(config: &mut Config, policy: &PolicyArgs) {
    if let Some(t) = policy.threshold {
        config.active_power_threshold = Some(t);
    }
    if let Some(i) = policy.interval {
        config.guard_interval_minutes = Some(i);
    }
}

async fn watch(
    client: HttpGuardClient,
    settings: MonitorSettings,
    query: ViewQuery,
    event_limit: usize,
) -> Result<()> {
    info!(
        "Watching {} (refresh {:?}, auto-guard {})",
        client.base_url(),
        settings.refresh_interval,
        if settings.auto_guard_enabled { "on" } else { "off" }
    );

    let monitor = Monitor::new(Arc::new(client), settings);
    let mut notifications = monitor.subscribe();
    monitor.start();

    let mut render = tokio::time::interval(settings.refresh_interval);
    // Let the first poll land before the first render.
    render.reset_after(Duration::from_millis(500));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
            received = notifications.recv() => match received {
                Ok(n) => output::print_notification(&n),
                Err(RecvError::Lagged(missed)) => warn!("Dropped {} notification(s)", missed),
                Err(RecvError::Closed) => break,
            },
            _ = render.tick() => render_dashboard(&monitor, &query, event_limit).await,
        }
    }

    monitor.stop().await;
    Ok(())
}

async fn render_dashboard(monitor: &Monitor, query: &ViewQuery, event_limit: usize) {
    let snapshot = monitor.snapshot().await;

    if snapshot.busy.initial_loading && snapshot.nodes.is_empty() {
        println!("Loading node data...");
        return;
    }
    if let Some(error) = &snapshot.error {
        println!("\n!! {}", error);
    }

    output::print_overview(&FleetStats::from_nodes(&snapshot.nodes));
    output::print_nodes(&filter_and_sort(&snapshot.nodes, query));
    output::print_events(&snapshot.events, event_limit);
}

async fn save_policy(client: HttpGuardClient, settings: MonitorSettings) -> Result<()> {
    let monitor = Monitor::new(Arc::new(client), settings);
    let outcome = monitor.save_policy().await;

    // Oldest first reads naturally on a terminal.
    let mut events = monitor.events().await;
    events.reverse();
    output::print_events(&events, events.len());
    monitor.stop().await;

    if outcome == ActionOutcome::Failed {
        anyhow::bail!("Guard policy was not saved");
    }
    Ok(())
}
