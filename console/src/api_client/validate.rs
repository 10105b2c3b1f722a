use std::collections::HashSet;

use crate::error::ApiError;
use crate::types::Node;

/// Schema checks serde cannot express on its own.
pub fn validate_nodes(nodes: &[Node]) -> Result<(), ApiError> {
    let mut seen = HashSet::with_capacity(nodes.len());

    for node in nodes {
        if node.hostname.trim().is_empty() {
            return Err(ApiError::Validation("node with empty hostname".to_string()));
        }
        if !seen.insert(node.hostname.as_str()) {
            return Err(ApiError::Validation(format!(
                "duplicate hostname: {}",
                node.hostname
            )));
        }

        for gpu in &node.gpus {
            if !(0.0..=100.0).contains(&gpu.utilization) {
                return Err(ApiError::Validation(format!(
                    "{} GPU {}: utilization {} outside 0-100",
                    node.hostname, gpu.index, gpu.utilization
                )));
            }
            if gpu.power_draw < 0.0 {
                return Err(ApiError::Validation(format!(
                    "{} GPU {}: negative power draw {}",
                    node.hostname, gpu.index, gpu.power_draw
                )));
            }
            if gpu.memory_used < 0.0 || gpu.memory_total < 0.0 {
                return Err(ApiError::Validation(format!(
                    "{} GPU {}: negative memory figures",
                    node.hostname, gpu.index
                )));
            }
        }
    }

    Ok(())
}
