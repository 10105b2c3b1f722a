use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use guardwatch::{HttpGuardClient, Monitor, MonitorSettings};
use guardwatch_simulator::{serve, Fleet, FleetConfig};

/// Find a free TCP port by binding to port 0
pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port 0");
    listener.local_addr().unwrap().port()
}

/// Wait for a TCP port to accept connections
pub async fn wait_for_port(port: u16, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for port {} to be ready", port);
        }
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// A simulated guard backend served in-process on an ephemeral port
pub struct TestBackend {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestBackend {
    /// `nodes` GPU hosts with 2 GPUs each; the first `idle` draw idle power.
    pub async fn start(nodes: usize, idle: usize) -> Self {
        Self::with_config(FleetConfig {
            nodes,
            gpus_per_node: 2,
            idle_nodes: idle,
            offline_nodes: 0,
            seed: Some(42),
            ..Default::default()
        })
        .await
    }

    pub async fn with_config(config: FleetConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind backend listener");
        let port = listener.local_addr().unwrap().port();

        let (tx, rx) = oneshot::channel::<()>();
        let fleet = Arc::new(Fleet::new(&config));
        let server = tokio::spawn(serve(listener, fleet, async {
            let _ = rx.await;
        }));

        wait_for_port(port, Duration::from_secs(5)).await;

        Self {
            port,
            shutdown: Some(tx),
            server: Some(server),
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn client(&self) -> HttpGuardClient {
        HttpGuardClient::new(&self.url(), Duration::from_secs(5)).expect("Failed to build client")
    }

    pub fn monitor(&self, settings: MonitorSettings) -> Monitor {
        Monitor::new(Arc::new(self.client()), settings)
    }

    /// Stop serving and wait for the server task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server
                .await
                .expect("Server task panicked")
                .expect("Server returned an error");
        }
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn hosts(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("fake-node-{}", i)).collect()
}
