use crate::stats::FleetStats;
use crate::types::{Event, EventKind, GuardAck, Node, Notification};

pub fn print_overview(stats: &FleetStats) {
    println!("\n=== Fleet Overview ===");
    println!(
        "  Nodes: {} ({} online)   Guarded: {}   Need guard: {}",
        stats.total_nodes, stats.online_nodes, stats.guarded_nodes, stats.need_guard_nodes
    );
    println!(
        "  GPUs: {}   Avg power: {:.1} W   Avg active utilization: {:.1}%",
        stats.total_gpus, stats.average_gpu_power_draw, stats.average_gpu_utilization
    );
}

pub fn print_nodes(nodes: &[&Node]) {
    println!("\n[Nodes]");
    if nodes.is_empty() {
        println!("  (No nodes match)");
        return;
    }

    println!(
        "  {:<32} {:<8} {:<8} {:<11} {:>5} {:>10} {:>8}  {:<19}",
        "Hostname", "Online", "Guard", "Need guard", "GPUs", "Power W", "Util %", "Last updated"
    );
    for node in nodes {
        let power: f64 = node.gpus.iter().map(|g| g.power_draw).sum();
        let util = if node.gpus.is_empty() {
            0.0
        } else {
            node.gpus.iter().map(|g| g.utilization).sum::<f64>() / node.gpus.len() as f64
        };
        println!(
            "  {:<32} {:<8} {:<8} {:<11} {:>5} {:>10.1} {:>8.1}  {:<19}",
            node.hostname,
            yes_no(node.is_online),
            if node.guard_running { "RUNNING" } else { "-" },
            yes_no(node.need_guard),
            node.gpus.len(),
            power,
            util,
            node.last_updated
        );
    }
}

pub fn print_events(events: &[Event], limit: usize) {
    println!("\n[Events]");
    if events.is_empty() {
        println!("  (No events)");
        return;
    }
    for event in events.iter().take(limit) {
        println!("  {} {:<7} {}", event.timestamp, label(event.kind), event.message);
    }
}

pub fn print_notification(n: &Notification) {
    println!(">> [{}] {}: {}", label(n.kind), n.title, n.description);
}

pub fn print_ack(ack: &GuardAck) {
    match serde_json::to_string_pretty(ack) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{:?}", ack),
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Info => "INFO",
        EventKind::Success => "OK",
        EventKind::Warning => "WARN",
        EventKind::Error => "ERROR",
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
