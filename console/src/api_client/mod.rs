mod validate;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::types::{GuardAck, GuardPolicy, GuardPolicyRequest, GuardRequest, Node};

pub use validate::validate_nodes;

/// Operations the monitor needs from the guard backend.
///
/// An empty hostname list means "every node" for start/stop, following the
/// backend contract.
#[async_trait]
pub trait GuardApi: Send + Sync {
    async fn fetch_nodes(&self) -> Result<Vec<Node>, ApiError>;
    async fn start_guard(&self, hostnames: &[String]) -> Result<GuardAck, ApiError>;
    async fn stop_guard(&self, hostnames: &[String]) -> Result<GuardAck, ApiError>;
    async fn update_guard_policy(&self, policy: &GuardPolicy) -> Result<GuardAck, ApiError>;
}

#[derive(Clone)]
pub struct HttpGuardClient {
    base_url: Url,
    http: Client,
    user_agent: String,
    invert_online_flag: bool,
}

impl HttpGuardClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid base URL")?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("guardwatch/{}", env!("CARGO_PKG_VERSION")),
            invert_online_flag: false,
        })
    }

    /// Flip the server-reported online flag on every fetched node.
    ///
    /// Only for backends known to report the flag inverted; off by default.
    pub fn with_inverted_online_flag(mut self, invert: bool) -> Self {
        self.invert_online_flag = invert;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| {
            ApiError::Network(format!(
                "failed to join base_url={} with path={}: {}",
                self.base_url, path, e
            ))
        })
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path)?;
        let req_id = Uuid::new_v4().to_string();

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .header("user-agent", &self.user_agent)
            .header("x-request-id", &req_id);
        if let Some(b) = body {
            req = req.json(b);
        }

        debug!("HTTP {} {} (request_id={})", method, url, req_id);
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice::<T>(&bytes)
            .map_err(|e| ApiError::Validation(format!("{} {}: {}", method, url, e)))
    }
}

#[async_trait]
impl GuardApi for HttpGuardClient {
    async fn fetch_nodes(&self) -> Result<Vec<Node>, ApiError> {
        let mut nodes: Vec<Node> = self
            .send::<(), _>(Method::GET, "/api/nodes_data", None)
            .await?;
        validate_nodes(&nodes)?;

        if self.invert_online_flag {
            for node in &mut nodes {
                node.is_online = !node.is_online;
            }
        }

        debug!("Fetched {} node(s)", nodes.len());
        Ok(nodes)
    }

    async fn start_guard(&self, hostnames: &[String]) -> Result<GuardAck, ApiError> {
        info!("Requesting guard start on {}", describe_targets(hostnames));
        self.send(
            Method::POST,
            "/api/start_guard",
            Some(&GuardRequest { hostnames }),
        )
        .await
    }

    async fn stop_guard(&self, hostnames: &[String]) -> Result<GuardAck, ApiError> {
        info!("Requesting guard stop on {}", describe_targets(hostnames));
        self.send(
            Method::POST,
            "/api/stop_guard",
            Some(&GuardRequest { hostnames }),
        )
        .await
    }

    async fn update_guard_policy(&self, policy: &GuardPolicy) -> Result<GuardAck, ApiError> {
        info!(
            "Updating guard policy: enabled={}, threshold={}W, interval={}min",
            policy.enabled, policy.active_power_threshold, policy.guard_interval_minutes
        );
        self.send(
            Method::POST,
            "/api/guard_policy",
            Some(&GuardPolicyRequest { policy: *policy }),
        )
        .await
    }
}

fn describe_targets(hostnames: &[String]) -> String {
    if hostnames.is_empty() {
        "all nodes".to_string()
    } else {
        hostnames.join(", ")
    }
}
