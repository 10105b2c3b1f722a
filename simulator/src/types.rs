use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Telemetry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuReading {
    pub index: u32,
    pub name: String,
    pub temperature: f64,
    pub utilization: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub power_draw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub hostname: String,
    pub is_online: bool,
    pub guard_running: bool,
    pub need_guard: bool,
    pub last_updated: String,
    pub gpus: Vec<GpuReading>,
}

// ============================================================================
// Guard Control Types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardRequest {
    /// Empty means every node
    #[serde(default)]
    pub hostnames: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyUpdate {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub active_power_threshold: f64,
    pub guard_interval_minutes: u32,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardPolicyRequest {
    pub policy: PolicyUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, bool>>,
}

impl GuardResponse {
    pub fn success(results: Option<BTreeMap<String, bool>>) -> Self {
        Self {
            status: "success".to_string(),
            results,
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub nodes: usize,
}
