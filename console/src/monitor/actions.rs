use tracing::debug;

use super::{BusyGuard, Monitor};
use crate::types::EventKind;

/// How a manual guard action ended. Failures are already in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Failed,
}

impl Monitor {
    async fn hostnames(&self) -> Vec<String> {
        self.nodes().await.iter().map(|n| n.hostname.clone()).collect()
    }

    /// Start guards on every node of the current snapshot, then refresh.
    pub async fn start_all_guards(&self) -> ActionOutcome {
        let result = {
            let _busy = BusyGuard::acquire(&self.inner.busy.starting_all);
            let hostnames = self.hostnames().await;
            self.inner.api.start_guard(&hostnames).await
        };

        match result {
            Ok(ack) => {
                debug!("start_guard ack: status={} results={:?}", ack.status, ack.results);
                let message = "Manual action: all guards started.";
                self.record(message, EventKind::Success).await;
                self.notify("Action succeeded", message, EventKind::Success);
                self.load_nodes().await;
                ActionOutcome::Completed
            }
            Err(e) => {
                let message = format!("Failed to start all guards: {}", e);
                self.record(message.clone(), EventKind::Error).await;
                self.notify("Action failed", message, EventKind::Error);
                ActionOutcome::Failed
            }
        }
    }

    /// Stop guards on every node of the current snapshot, then refresh.
    pub async fn stop_all_guards(&self) -> ActionOutcome {
        let result = {
            let _busy = BusyGuard::acquire(&self.inner.busy.stopping_all);
            let hostnames = self.hostnames().await;
            self.inner.api.stop_guard(&hostnames).await
        };

        match result {
            Ok(ack) => {
                debug!("stop_guard ack: status={} results={:?}", ack.status, ack.results);
                let message = "Manual action: all guards stopped.";
                self.record(message, EventKind::Warning).await;
                self.notify("Action succeeded", message, EventKind::Info);
                self.load_nodes().await;
                ActionOutcome::Completed
            }
            Err(e) => {
                let message = format!("Failed to stop all guards: {}", e);
                self.record(message.clone(), EventKind::Error).await;
                self.notify("Action failed", message, EventKind::Error);
                ActionOutcome::Failed
            }
        }
    }

    /// Push the working policy to the backend. When auto-guard is enabled a
    /// refresh runs straight away so its effect shows without waiting a tick.
    pub async fn save_policy(&self) -> ActionOutcome {
        let (result, enabled) = {
            let _busy = BusyGuard::acquire(&self.inner.busy.saving_policy);
            let policy = self.settings().await.policy();
            (
                self.inner.api.update_guard_policy(&policy).await,
                policy.enabled,
            )
        };

        match result {
            Ok(_) => {
                let message = "Guard policy saved.";
                self.record(message, EventKind::Success).await;
                self.notify("Action succeeded", message, EventKind::Success);

                if enabled {
                    self.record("Auto-guard policy enabled.", EventKind::Info)
                        .await;
                    self.load_nodes().await;
                } else {
                    self.record("Auto-guard policy disabled.", EventKind::Warning)
                        .await;
                }
                ActionOutcome::Completed
            }
            Err(e) => {
                let message = format!("Failed to save guard policy: {}", e);
                self.record(message.clone(), EventKind::Error).await;
                self.notify("Action failed", message, EventKind::Error);
                ActionOutcome::Failed
            }
        }
    }
}
