use std::sync::MutexGuard;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::Monitor;

impl Monitor {
    /// Poll once now and then every refresh interval until [`Monitor::stop`].
    ///
    /// Returns false if the poller is already running or the monitor has been
    /// stopped; a stopped monitor cannot be restarted.
    pub fn start(&self) -> bool {
        if self.is_stopped() {
            warn!("Monitor already stopped, ignoring start");
            return false;
        }

        let mut slot = self.poller_slot();
        if slot.is_some() {
            return false;
        }

        let monitor = self.clone();
        *slot = Some(tokio::spawn(async move { monitor.poll_loop().await }));
        true
    }

    /// Tear the poller down. Requests already on the wire are left to finish
    /// and their results are dropped.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();

        let handle = self.poller_slot().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Poller task ended abnormally: {}", e);
            }
        }
        info!("Monitor stopped");
    }

    fn poller_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn poll_loop(self) {
        let mut refresh_rx = self.inner.refresh_tx.subscribe();

        loop {
            let period = *refresh_rx.borrow_and_update();
            info!("Polling node data every {:?}", period);

            // First tick fires immediately, so (re)arming also polls right away.
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.inner.shutdown.cancelled() => {
                        info!("Poller shutting down");
                        return;
                    }
                    changed = refresh_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                    _ = ticker.tick() => {
                        // Ticks run on their own task; one that lands while a
                        // poll is in flight is dropped.
                        let monitor = self.clone();
                        tokio::spawn(async move {
                            monitor.run_exclusive(false).await;
                        });
                    }
                }
            }
        }
    }
}
