use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Node Telemetry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gpu {
    pub index: u32,
    pub name: String,
    /// Watts
    pub power_draw: f64,
    /// Percent, 0-100
    pub utilization: f64,
    /// Celsius
    pub temperature: f64,
    /// MB
    pub memory_used: f64,
    /// MB
    pub memory_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    #[serde(rename = "is_online", alias = "isOnline", default = "default_online")]
    pub is_online: bool,
    pub guard_running: bool,
    pub need_guard: bool,
    pub gpus: Vec<Gpu>,
    #[serde(default)]
    pub last_updated: String,
}

fn default_online() -> bool {
    true
}

// ============================================================================
// Guard Control
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GuardRequest<'a> {
    pub hostnames: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardPolicy {
    pub enabled: bool,
    pub active_power_threshold: f64,
    pub guard_interval_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardPolicyRequest {
    pub policy: GuardPolicy,
}

/// Acknowledgement returned by every guard endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardAck {
    #[serde(default)]
    pub status: String,
    /// Hostname -> requested state reached
    #[serde(default)]
    pub results: BTreeMap<String, bool>,
}

// ============================================================================
// Event Log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Info => "info",
            EventKind::Success => "success",
            EventKind::Warning => "warning",
            EventKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

/// Transient user-facing message published alongside significant events.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub kind: EventKind,
}
