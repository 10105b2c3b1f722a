use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::types::Node;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Guarding,
    NotGuarding,
    NeedsGuard,
    Online,
    Offline,
}

impl StatusFilter {
    fn matches(&self, node: &Node) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Guarding => node.guard_running,
            StatusFilter::NotGuarding => !node.guard_running,
            StatusFilter::NeedsGuard => node.need_guard,
            StatusFilter::Online => node.is_online,
            StatusFilter::Offline => !node.is_online,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "all" => Ok(StatusFilter::All),
            "guarding" => Ok(StatusFilter::Guarding),
            "not_guarding" | "notguarding" => Ok(StatusFilter::NotGuarding),
            "needs_guard" | "needsguard" => Ok(StatusFilter::NeedsGuard),
            "online" => Ok(StatusFilter::Online),
            "offline" => Ok(StatusFilter::Offline),
            other => Err(format!(
                "unknown status filter '{}' (expected all, guarding, not_guarding, needs_guard, online, offline)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Hostname,
    TotalGpus,
    GuardedNodes,
    NeedGuard,
}

impl SortKey {
    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        match self {
            SortKey::Hostname => a
                .hostname
                .to_lowercase()
                .cmp(&b.hostname.to_lowercase())
                .then_with(|| a.hostname.cmp(&b.hostname)),
            SortKey::TotalGpus => b.gpus.len().cmp(&a.gpus.len()),
            // `true` sorts after `false`, so compare b to a for true-first.
            SortKey::GuardedNodes => b.guard_running.cmp(&a.guard_running),
            SortKey::NeedGuard => b.need_guard.cmp(&a.need_guard),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "hostname" => Ok(SortKey::Hostname),
            "totalgpus" => Ok(SortKey::TotalGpus),
            "guardednodes" => Ok(SortKey::GuardedNodes),
            "needguard" => Ok(SortKey::NeedGuard),
            _ => Err(format!(
                "unknown sort key '{}' (expected hostname, totalGpus, guardedNodes, needGuard)",
                s
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::Hostname => "hostname",
            SortKey::TotalGpus => "totalGpus",
            SortKey::GuardedNodes => "guardedNodes",
            SortKey::NeedGuard => "needGuard",
        };
        f.write_str(s)
    }
}

/// Presentation parameters for the node list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub status: StatusFilter,
    pub text: String,
    pub sort: SortKey,
}

/// Filter by status, then by hostname substring, then stable-sort.
///
/// The input slice is never reordered.
pub fn filter_and_sort<'a>(nodes: &'a [Node], query: &ViewQuery) -> Vec<&'a Node> {
    let needle = query.text.to_lowercase();

    let mut out: Vec<&Node> = nodes
        .iter()
        .filter(|n| query.status.matches(n))
        .filter(|n| needle.is_empty() || n.hostname.to_lowercase().contains(&needle))
        .collect();

    out.sort_by(|a, b| query.sort.compare(a, b));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gpu;

    fn gpu(index: u32) -> Gpu {
        Gpu {
            index,
            name: "H100".to_string(),
            power_draw: 100.0,
            utilization: 10.0,
            temperature: 40.0,
            memory_used: 0.0,
            memory_total: 81920.0,
        }
    }

    fn node(hostname: &str, guard_running: bool, need_guard: bool, gpus: u32, online: bool) -> Node {
        Node {
            hostname: hostname.to_string(),
            is_online: online,
            guard_running,
            need_guard,
            gpus: (0..gpus).map(gpu).collect(),
            last_updated: String::new(),
        }
    }

    fn hostnames(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.hostname.clone()).collect()
    }

    fn fleet() -> Vec<Node> {
        vec![
            node("gpu-03", false, true, 4, true),
            node("GPU-01", true, false, 8, true),
            node("cpu-02", false, false, 0, false),
            node("gpu-04", true, true, 8, true),
        ]
    }

    #[test]
    fn test_hostname_and_need_guard_ordering() {
        let nodes = vec![node("b", false, true, 1, true), node("a", true, false, 1, true)];

        let by_name = filter_and_sort(&nodes, &ViewQuery::default());
        assert_eq!(hostnames(&by_name), vec!["a", "b"]);

        let query = ViewQuery {
            sort: SortKey::NeedGuard,
            ..Default::default()
        };
        assert_eq!(hostnames(&filter_and_sort(&nodes, &query)), vec!["b", "a"]);
    }

    #[test]
    fn test_hostname_sort_ignores_case() {
        let nodes = vec![
            node("gpu-03", false, false, 1, true),
            node("GPU-01", false, false, 1, true),
            node("cpu-02", false, false, 1, true),
        ];
        assert_eq!(
            hostnames(&filter_and_sort(&nodes, &ViewQuery::default())),
            vec!["cpu-02", "GPU-01", "gpu-03"]
        );

        // Names equal apart from case still get a fixed order.
        let twins = vec![node("node-a", false, false, 1, true), node("NODE-A", false, false, 1, true)];
        assert_eq!(
            hostnames(&filter_and_sort(&twins, &ViewQuery::default())),
            vec!["NODE-A", "node-a"]
        );
    }

    #[test]
    fn test_status_filters() {
        let nodes = fleet();
        let run = |status| {
            let q = ViewQuery {
                status,
                ..Default::default()
            };
            hostnames(&filter_and_sort(&nodes, &q))
        };

        assert_eq!(run(StatusFilter::All).len(), 4);
        assert_eq!(run(StatusFilter::Guarding), vec!["GPU-01", "gpu-04"]);
        assert_eq!(run(StatusFilter::NotGuarding), vec!["cpu-02", "gpu-03"]);
        assert_eq!(run(StatusFilter::NeedsGuard), vec!["gpu-03", "gpu-04"]);
        assert_eq!(run(StatusFilter::Online).len(), 3);
        assert_eq!(run(StatusFilter::Offline), vec!["cpu-02"]);
    }

    #[test]
    fn test_text_filter_is_case_insensitive() {
        let nodes = fleet();
        let q = ViewQuery {
            text: "gPu".to_string(),
            ..Default::default()
        };
        assert_eq!(
            hostnames(&filter_and_sort(&nodes, &q)),
            vec!["GPU-01", "gpu-03", "gpu-04"]
        );
    }

    #[test]
    fn test_filters_compose_before_sort() {
        let nodes = fleet();
        let q = ViewQuery {
            status: StatusFilter::NeedsGuard,
            text: "gpu".to_string(),
            sort: SortKey::TotalGpus,
        };
        assert_eq!(hostnames(&filter_and_sort(&nodes, &q)), vec!["gpu-04", "gpu-03"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let nodes = vec![
            node("z", true, false, 2, true),
            node("y", false, false, 2, true),
            node("x", true, false, 2, true),
        ];

        let q = ViewQuery {
            sort: SortKey::TotalGpus,
            ..Default::default()
        };
        assert_eq!(hostnames(&filter_and_sort(&nodes, &q)), vec!["z", "y", "x"]);

        let q = ViewQuery {
            sort: SortKey::GuardedNodes,
            ..Default::default()
        };
        assert_eq!(hostnames(&filter_and_sort(&nodes, &q)), vec!["z", "x", "y"]);
    }

    #[test]
    fn test_reapplying_is_idempotent() {
        let nodes = fleet();
        for sort in [
            SortKey::Hostname,
            SortKey::TotalGpus,
            SortKey::GuardedNodes,
            SortKey::NeedGuard,
        ] {
            let q = ViewQuery {
                sort,
                ..Default::default()
            };
            let once: Vec<Node> = filter_and_sort(&nodes, &q).into_iter().cloned().collect();
            let twice: Vec<Node> = filter_and_sort(&once, &q).into_iter().cloned().collect();
            assert_eq!(once, twice, "sort key {}", sort);
        }
    }

    #[test]
    fn test_input_is_not_mutated() {
        let nodes = fleet();
        let before = nodes.clone();
        let _ = filter_and_sort(
            &nodes,
            &ViewQuery {
                sort: SortKey::NeedGuard,
                ..Default::default()
            },
        );
        assert_eq!(nodes, before);
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("needs_guard".parse::<StatusFilter>(), Ok(StatusFilter::NeedsGuard));
        assert_eq!("not-guarding".parse::<StatusFilter>(), Ok(StatusFilter::NotGuarding));
        assert!("sleeping".parse::<StatusFilter>().is_err());

        assert_eq!("totalGpus".parse::<SortKey>(), Ok(SortKey::TotalGpus));
        assert_eq!("guarded_nodes".parse::<SortKey>(), Ok(SortKey::GuardedNodes));
        assert_eq!("needGuard".parse::<SortKey>(), Ok(SortKey::NeedGuard));
        assert!("power".parse::<SortKey>().is_err());
    }
}
