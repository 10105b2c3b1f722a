use serde::Serialize;

use crate::types::Node;

/// Fleet-wide overview figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetStats {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub guarded_nodes: usize,
    pub need_guard_nodes: usize,
    pub total_gpus: usize,
    /// Mean power draw across every GPU, 0 when the fleet has none.
    pub average_gpu_power_draw: f64,
    /// Mean utilization across GPUs doing any work; idle (0%) GPUs are left out.
    pub average_gpu_utilization: f64,
}

impl FleetStats {
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut stats = FleetStats {
            total_nodes: nodes.len(),
            ..Default::default()
        };

        let mut power_sum = 0.0;
        let mut active_util_sum = 0.0;
        let mut active_gpus = 0usize;

        for node in nodes {
            if node.is_online {
                stats.online_nodes += 1;
            }
            if node.guard_running {
                stats.guarded_nodes += 1;
            }
            if node.need_guard {
                stats.need_guard_nodes += 1;
            }

            stats.total_gpus += node.gpus.len();
            for gpu in &node.gpus {
                power_sum += gpu.power_draw;
                if gpu.utilization > 0.0 {
                    active_util_sum += gpu.utilization;
                    active_gpus += 1;
                }
            }
        }

        if stats.total_gpus > 0 {
            stats.average_gpu_power_draw = power_sum / stats.total_gpus as f64;
        }
        if active_gpus > 0 {
            stats.average_gpu_utilization = active_util_sum / active_gpus as f64;
        }

        stats
    }
}
