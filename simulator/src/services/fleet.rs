use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;
use std::time::{Duration, Instant};
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::types::{GpuReading, NodeReport, PolicyUpdate};

const GPU_MEMORY_MB: u32 = 16000;
/// Power samples older than this are dropped.
const HISTORY_WINDOW: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error, PartialEq)]
pub enum FleetError {
    #[error("active_power_threshold must be a positive number of watts, got {0}")]
    InvalidThreshold(f64),

    #[error("guard_interval_minutes must be at least 1")]
    InvalidInterval,
}

/// Power profile a simulated node draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Idle,
    Busy,
}

impl Load {
    fn power_range(self) -> Range<f64> {
        match self {
            Load::Idle => 20.0..60.0,
            Load::Busy => 150.0..250.0,
        }
    }

    fn utilization_range(self) -> Range<f64> {
        match self {
            Load::Idle => 0.0..15.0,
            Load::Busy => 50.0..100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub nodes: usize,
    pub gpus_per_node: u32,
    /// The first `idle_nodes` nodes draw idle power
    pub idle_nodes: usize,
    /// The last `offline_nodes` nodes report offline and stop sampling
    pub offline_nodes: usize,
    pub active_power_threshold: f64,
    pub guard_interval_minutes: u32,
    pub seed: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            nodes: 5,
            gpus_per_node: 8,
            idle_nodes: 2,
            offline_nodes: 0,
            active_power_threshold: 100.0,
            guard_interval_minutes: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicyState {
    pub enabled: bool,
    pub active_power_threshold: f64,
    pub guard_interval_minutes: u32,
}

struct SimNode {
    hostname: String,
    online: bool,
    load: Load,
    guard_running: bool,
    last_updated: String,
    gpus: Vec<GpuReading>,
    power_history: Vec<VecDeque<(Instant, f64)>>,
}

impl SimNode {
    fn new(hostname: String, gpu_count: u32, load: Load, online: bool) -> Self {
        let gpus = (0..gpu_count)
            .map(|index| GpuReading {
                index,
                name: format!("Simulated GPU {}", index),
                temperature: 0.0,
                utilization: 0.0,
                memory_used: 0.0,
                memory_total: f64::from(GPU_MEMORY_MB),
                power_draw: 0.0,
            })
            .collect();

        Self {
            hostname,
            online,
            load,
            guard_running: false,
            last_updated: wall_clock(),
            gpus,
            power_history: vec![VecDeque::new(); gpu_count as usize],
        }
    }

    fn sample(&mut self, rng: &mut StdRng, now: Instant) {
        let load = self.load;
        for (gpu, history) in self.gpus.iter_mut().zip(self.power_history.iter_mut()) {
            gpu.temperature = rng.random_range(30.0..80.0);
            gpu.utilization = rng.random_range(load.utilization_range());
            gpu.memory_used = f64::from(rng.random_range(0..=GPU_MEMORY_MB));
            gpu.power_draw = rng.random_range(load.power_range());
            record_power(history, now, gpu.power_draw);
        }
        self.last_updated = wall_clock();
    }

    /// True when any GPU has no sample inside the guard window or averages
    /// below the active power threshold over it.
    fn need_guard(&self, now: Instant, policy: &PolicyState) -> bool {
        let window = Duration::from_secs(u64::from(policy.guard_interval_minutes) * 60);

        self.power_history.iter().any(|history| {
            let recent: Vec<f64> = history
                .iter()
                .filter(|(at, _)| now.saturating_duration_since(*at) <= window)
                .map(|(_, watts)| *watts)
                .collect();

            if recent.is_empty() {
                return true;
            }
            let average = recent.iter().sum::<f64>() / recent.len() as f64;
            average < policy.active_power_threshold
        })
    }

    fn report(&self, now: Instant, policy: &PolicyState) -> NodeReport {
        NodeReport {
            hostname: self.hostname.clone(),
            is_online: self.online,
            guard_running: self.guard_running,
            need_guard: self.need_guard(now, policy),
            last_updated: self.last_updated.clone(),
            gpus: self.gpus.clone(),
        }
    }
}

fn record_power(history: &mut VecDeque<(Instant, f64)>, now: Instant, watts: f64) {
    history.push_back((now, watts));
    while let Some((at, _)) = history.front() {
        if now.saturating_duration_since(*at) > HISTORY_WINDOW {
            history.pop_front();
        } else {
            break;
        }
    }
}

fn wall_clock() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

fn targets(nodes: &[SimNode], hostnames: &[String]) -> Vec<usize> {
    if hostnames.is_empty() {
        return (0..nodes.len()).collect();
    }
    for name in hostnames {
        if !nodes.iter().any(|n| &n.hostname == name) {
            warn!("Ignoring unknown host {}", name);
        }
    }
    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| hostnames.contains(&n.hostname))
        .map(|(i, _)| i)
        .collect()
}

struct FleetState {
    nodes: Vec<SimNode>,
    policy: PolicyState,
    rng: StdRng,
}

/// Simulated GPU fleet shared by the HTTP handlers.
pub struct Fleet {
    state: Mutex<FleetState>,
}

impl Fleet {
    pub fn new(config: &FleetConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let offline_from = config.nodes.saturating_sub(config.offline_nodes);
        let nodes = (0..config.nodes)
            .map(|i| {
                let load = if i < config.idle_nodes {
                    Load::Idle
                } else {
                    Load::Busy
                };
                SimNode::new(
                    format!("fake-node-{}", i),
                    config.gpus_per_node,
                    load,
                    i < offline_from,
                )
            })
            .collect();

        Self {
            state: Mutex::new(FleetState {
                nodes,
                policy: PolicyState {
                    enabled: true,
                    active_power_threshold: config.active_power_threshold,
                    guard_interval_minutes: config.guard_interval_minutes.max(1),
                },
                rng,
            }),
        }
    }

    pub async fn node_count(&self) -> usize {
        self.state.lock().await.nodes.len()
    }

    /// Take a fresh reading on every online node and report the whole fleet.
    pub async fn sample(&self) -> Vec<NodeReport> {
        self.sample_at(Instant::now()).await
    }

    async fn sample_at(&self, now: Instant) -> Vec<NodeReport> {
        let mut state = self.state.lock().await;
        let FleetState { nodes, policy, rng } = &mut *state;

        for node in nodes.iter_mut().filter(|n| n.online) {
            node.sample(rng, now);
        }
        debug!("Sampled {} node(s)", nodes.len());

        let policy = *policy;
        nodes.iter().map(|n| n.report(now, &policy)).collect()
    }

    /// Start guards on `hostnames` (every node when empty). Returns whether
    /// each node ended up guarded.
    pub async fn start_guard(&self, hostnames: &[String]) -> BTreeMap<String, bool> {
        let mut state = self.state.lock().await;

        for i in targets(&state.nodes, hostnames) {
            let node = &mut state.nodes[i];
            if !node.online {
                warn!("[{}] Offline, cannot start guard", node.hostname);
            } else if node.guard_running {
                info!("[{}] Guard already running", node.hostname);
            } else {
                node.guard_running = true;
                node.last_updated = wall_clock();
                info!("[{}] Guard started", node.hostname);
            }
        }

        state
            .nodes
            .iter()
            .map(|n| (n.hostname.clone(), n.guard_running))
            .collect()
    }

    /// Stop guards on `hostnames` (every node when empty). Returns whether
    /// each node ended up unguarded.
    pub async fn stop_guard(&self, hostnames: &[String]) -> BTreeMap<String, bool> {
        let mut state = self.state.lock().await;

        for i in targets(&state.nodes, hostnames) {
            let node = &mut state.nodes[i];
            if node.guard_running {
                node.guard_running = false;
                node.last_updated = wall_clock();
                info!("[{}] Guard stopped", node.hostname);
            } else {
                info!("[{}] Guard not running", node.hostname);
            }
        }

        state
            .nodes
            .iter()
            .map(|n| (n.hostname.clone(), !n.guard_running))
            .collect()
    }

    pub async fn update_policy(&self, update: PolicyUpdate) -> Result<PolicyState, FleetError> {
        if !update.active_power_threshold.is_finite() || update.active_power_threshold <= 0.0 {
            return Err(FleetError::InvalidThreshold(update.active_power_threshold));
        }
        if update.guard_interval_minutes == 0 {
            return Err(FleetError::InvalidInterval);
        }

        let mut state = self.state.lock().await;
        state.policy = PolicyState {
            enabled: update.enabled,
            active_power_threshold: update.active_power_threshold,
            guard_interval_minutes: update.guard_interval_minutes,
        };
        info!(
            "Guard policy updated: enabled={}, threshold={}W, interval={}min",
            update.enabled, update.active_power_threshold, update.guard_interval_minutes
        );
        Ok(state.policy)
    }

    pub async fn policy(&self) -> PolicyState {
        self.state.lock().await.policy
    }
}
