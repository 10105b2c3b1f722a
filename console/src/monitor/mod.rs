//! Node-monitoring controller.
//!
//! A [`Monitor`] owns the last fetched node snapshot, the event log and the
//! guard settings, polls the backend on a timer, starts guards on nodes that
//! need them when auto-guard is on, and runs the manual guard actions.
//! Every backend failure is caught here and turned into an event; nothing is
//! propagated to callers as an error.

mod actions;
mod poller;
mod settings;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api_client::GuardApi;
use crate::error::ApiError;
use crate::event_log::EventLog;
use crate::stats::FleetStats;
use crate::types::{Event, EventKind, Node, Notification};
use crate::view::{filter_and_sort, ViewQuery};

pub use actions::ActionOutcome;
pub use settings::{
    clamp_guard_interval, clamp_refresh_interval, clamp_threshold, MonitorSettings,
    GUARD_INTERVAL_RANGE, MIN_REFRESH_INTERVAL, POWER_THRESHOLD_RANGE,
};

const NOTIFICATION_CAPACITY: usize = 64;

/// Result of one call into the poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Snapshot replaced; lists the hosts auto-guard started guards on.
    Refreshed { auto_guarded: Vec<String> },
    /// Fetch or auto-guard start failed; the previous snapshot is kept.
    Failed,
    /// Another poll was running; it will run one more pass for this request.
    Queued,
    /// Timer tick dropped because another poll was running.
    Skipped,
    /// Monitor was stopped while the poll was in flight; result thrown away.
    Discarded,
}

/// Point-in-time view of the busy flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyState {
    pub initial_loading: bool,
    pub refreshing: bool,
    pub starting_all: bool,
    pub stopping_all: bool,
    pub saving_policy: bool,
}

#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub nodes: Arc<Vec<Node>>,
    pub error: Option<String>,
    pub events: Vec<Event>,
    pub busy: BusyState,
    pub settings: MonitorSettings,
}

struct MonitorState {
    nodes: Arc<Vec<Node>>,
    error: Option<String>,
    events: EventLog,
    settings: MonitorSettings,
}

#[derive(Default)]
struct BusyFlags {
    initial_loading: AtomicBool,
    refreshing: AtomicBool,
    starting_all: AtomicBool,
    stopping_all: AtomicBool,
    saving_policy: AtomicBool,
}

/// Raises a flag for its lifetime.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }

    /// Raise the flag only if nobody holds it.
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    api: Arc<dyn GuardApi>,
    state: RwLock<MonitorState>,
    busy: BusyFlags,
    poll_in_flight: AtomicBool,
    rerun_requested: AtomicBool,
    has_loaded: AtomicBool,
    notifications: broadcast::Sender<Notification>,
    refresh_tx: watch::Sender<Duration>,
    shutdown: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to one monitoring session. Clones refer to the same session.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(api: Arc<dyn GuardApi>, settings: MonitorSettings) -> Self {
        let settings = settings.clamped();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (refresh_tx, _) = watch::channel(settings.refresh_interval);

        let busy = BusyFlags::default();
        busy.initial_loading.store(true, Ordering::SeqCst);

        Self {
            inner: Arc::new(Inner {
                api,
                state: RwLock::new(MonitorState {
                    nodes: Arc::new(Vec::new()),
                    error: None,
                    events: EventLog::new(),
                    settings,
                }),
                busy,
                poll_in_flight: AtomicBool::new(false),
                rerun_requested: AtomicBool::new(false),
                has_loaded: AtomicBool::new(false),
                notifications,
                refresh_tx,
                shutdown: CancellationToken::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Poll cycle
    // ------------------------------------------------------------------------

    /// Fetch the fleet and run auto-guard.
    ///
    /// If a poll is already running the request is queued behind it and
    /// `PollOutcome::Queued` is returned straight away.
    pub async fn load_nodes(&self) -> PollOutcome {
        self.run_exclusive(true).await
    }

    async fn run_exclusive(&self, queue_if_busy: bool) -> PollOutcome {
        let inner = &self.inner;
        if self.is_stopped() {
            return PollOutcome::Discarded;
        }

        let mut last = None;
        loop {
            let in_flight = match BusyGuard::try_acquire(&inner.poll_in_flight) {
                Some(g) => g,
                None if last.is_some() => break,
                None if !queue_if_busy => {
                    debug!("Poll already in flight, skipping tick");
                    return PollOutcome::Skipped;
                }
                None => {
                    inner.rerun_requested.store(true, Ordering::SeqCst);
                    // The running poll may have finished between the two checks.
                    match BusyGuard::try_acquire(&inner.poll_in_flight) {
                        Some(g) => g,
                        None => {
                            debug!("Poll already in flight, queued one more pass");
                            return PollOutcome::Queued;
                        }
                    }
                }
            };

            inner.rerun_requested.store(false, Ordering::SeqCst);
            last = Some(self.poll_cycle().await);
            drop(in_flight);

            if inner.shutdown.is_cancelled() || !inner.rerun_requested.load(Ordering::SeqCst) {
                break;
            }
        }

        last.unwrap_or(PollOutcome::Skipped)
    }

    async fn poll_cycle(&self) -> PollOutcome {
        let inner = &self.inner;
        let first = !inner.has_loaded.load(Ordering::SeqCst);
        let _busy = if first {
            BusyGuard::acquire(&inner.busy.initial_loading)
        } else {
            BusyGuard::acquire(&inner.busy.refreshing)
        };

        {
            let mut state = inner.state.write().await;
            if first {
                state.events.push("Loading node data...", EventKind::Info);
            }
            state.error = None;
        }

        let result = self.refresh_and_auto_guard().await;
        inner.has_loaded.store(true, Ordering::SeqCst);

        if self.is_stopped() {
            debug!("Monitor stopped during poll, discarding result");
            return PollOutcome::Discarded;
        }

        match result {
            Ok(auto_guarded) => PollOutcome::Refreshed { auto_guarded },
            Err(e) => {
                let message = format!("Failed to load node data or run auto-guard: {}", e);
                {
                    let mut state = inner.state.write().await;
                    state.error = Some(message.clone());
                    state.events.push(message.clone(), EventKind::Error);
                }
                self.notify("Load failed", message, EventKind::Error);
                PollOutcome::Failed
            }
        }
    }

    async fn refresh_and_auto_guard(&self) -> Result<Vec<String>, ApiError> {
        let inner = &self.inner;

        let nodes = inner.api.fetch_nodes().await?;
        if self.is_stopped() {
            return Ok(Vec::new());
        }

        let candidates = {
            let mut state = inner.state.write().await;
            state.nodes = Arc::new(nodes);
            state.events.push("Node data refreshed.", EventKind::Info);

            if !state.settings.auto_guard_enabled {
                return Ok(Vec::new());
            }

            let candidates = auto_guard_candidates(&state.nodes);
            if candidates.is_empty() {
                state
                    .events
                    .push("Auto-guard: no nodes need guarding.", EventKind::Info);
                return Ok(Vec::new());
            }
            candidates
        };

        let message = format!(
            "Auto-guard: {} need guarding, starting guards...",
            candidates.join(", ")
        );
        self.record(message.clone(), EventKind::Info).await;
        self.notify("Auto-guard: starting", message, EventKind::Info);

        let ack = inner.api.start_guard(&candidates).await?;
        let nodes = inner.api.fetch_nodes().await?;
        if self.is_stopped() {
            return Ok(Vec::new());
        }

        // Hosts missing from the ack are taken as started.
        let (refused, started): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|host| ack.results.get(host) == Some(&false));

        {
            let mut state = inner.state.write().await;
            state.nodes = Arc::new(nodes);
            if !refused.is_empty() {
                state.events.push(
                    format!("Auto-guard: backend did not start guards on {}.", refused.join(", ")),
                    EventKind::Warning,
                );
            }
        }

        if !started.is_empty() {
            let message = format!("Auto-guard: now guarding {}.", started.join(", "));
            self.record(message.clone(), EventKind::Success).await;
            self.notify("Auto-guard: started", message, EventKind::Success);
        }

        Ok(started)
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub async fn settings(&self) -> MonitorSettings {
        self.inner.state.read().await.settings
    }

    pub async fn set_active_power_threshold(&self, watts: f64) {
        let watts = clamp_threshold(watts);
        let mut state = self.inner.state.write().await;
        state.settings.active_power_threshold = watts;
        state.events.push(
            format!("Settings: active power threshold set to {} W.", watts),
            EventKind::Info,
        );
    }

    pub async fn set_guard_interval_minutes(&self, minutes: u32) {
        let minutes = clamp_guard_interval(minutes);
        let mut state = self.inner.state.write().await;
        state.settings.guard_interval_minutes = minutes;
        state.events.push(
            format!("Settings: guard interval set to {} min.", minutes),
            EventKind::Info,
        );
    }

    pub async fn set_auto_guard_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.write().await;
        state.settings.auto_guard_enabled = enabled;
        let message = if enabled {
            "Settings: auto-guard enabled."
        } else {
            "Settings: auto-guard disabled."
        };
        state.events.push(message, EventKind::Info);
    }

    /// Change the polling period. A running poller re-arms at the new period
    /// and polls once right away.
    pub async fn set_refresh_interval(&self, period: Duration) {
        let period = clamp_refresh_interval(period);
        {
            let mut state = self.inner.state.write().await;
            state.settings.refresh_interval = period;
            state.events.push(
                format!("Settings: refresh interval set to {} ms.", period.as_millis()),
                EventKind::Info,
            );
        }
        self.inner.refresh_tx.send_replace(period);
    }

    // ------------------------------------------------------------------------
    // Event log and notifications
    // ------------------------------------------------------------------------

    pub async fn add_event(&self, message: impl Into<String>, kind: EventKind) {
        self.record(message, kind).await;
    }

    /// Empty the log, leaving a single entry that records the clear.
    pub async fn clear_events(&self) {
        let mut state = self.inner.state.write().await;
        state.events.clear();
        state.events.push("Event log cleared.", EventKind::Info);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    async fn record(&self, message: impl Into<String>, kind: EventKind) {
        self.inner.state.write().await.events.push(message, kind);
    }

    fn notify(&self, title: &str, description: impl Into<String>, kind: EventKind) {
        // No subscribers is fine.
        let _ = self.inner.notifications.send(Notification {
            title: title.to_string(),
            description: description.into(),
            kind,
        });
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    pub async fn nodes(&self) -> Arc<Vec<Node>> {
        self.inner.state.read().await.nodes.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.state.read().await.error.clone()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.inner.state.read().await.events.to_vec()
    }

    pub fn busy(&self) -> BusyState {
        let b = &self.inner.busy;
        BusyState {
            initial_loading: b.initial_loading.load(Ordering::SeqCst),
            refreshing: b.refreshing.load(Ordering::SeqCst),
            starting_all: b.starting_all.load(Ordering::SeqCst),
            stopping_all: b.stopping_all.load(Ordering::SeqCst),
            saving_policy: b.saving_policy.load(Ordering::SeqCst),
        }
    }

    pub async fn stats(&self) -> FleetStats {
        FleetStats::from_nodes(&self.nodes().await)
    }

    pub async fn view(&self, query: &ViewQuery) -> Vec<Node> {
        let nodes = self.nodes().await;
        filter_and_sort(&nodes, query).into_iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        let state = self.inner.state.read().await;
        MonitorSnapshot {
            nodes: state.nodes.clone(),
            error: state.error.clone(),
            events: state.events.to_vec(),
            busy: self.busy(),
            settings: state.settings,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Hosts auto-guard should start: flagged as needing a guard and not already
/// running one.
pub fn auto_guard_candidates(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| n.need_guard && !n.guard_running)
        .map(|n| n.hostname.clone())
        .collect()
}
