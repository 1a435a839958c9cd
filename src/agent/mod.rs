// ABOUTME: Client for the agent running on the deployed VM.
// ABOUTME: The factory binds a client to a director id, mbus URL, and CA.

mod error;
mod http;

pub use error::AgentError;
pub use http::HttpAgentClient;

use crate::types::{DiskCid, MbusUrl};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// The agent's view of its jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub job_state: String,
}

impl AgentState {
    pub fn is_running(&self) -> bool {
        self.job_state == "running"
    }
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn ping(&self) -> Result<String, AgentError>;
    async fn stop(&self) -> Result<(), AgentError>;
    async fn apply(&self, spec: &Value) -> Result<(), AgentError>;
    async fn start(&self) -> Result<(), AgentError>;
    async fn get_state(&self) -> Result<AgentState, AgentError>;
    async fn mount_disk(&self, disk_cid: &DiskCid) -> Result<(), AgentError>;
    async fn unmount_disk(&self, disk_cid: &DiskCid) -> Result<(), AgentError>;
    async fn list_disk(&self) -> Result<Vec<DiskCid>, AgentError>;
    async fn migrate_disk(&self) -> Result<(), AgentError>;

    /// Run the drain scripts; returns seconds to wait (negative: poll again).
    async fn drain(&self, kind: &str) -> Result<i64, AgentError>;
}

pub trait AgentClientFactory: Send + Sync {
    fn new_agent_client(
        &self,
        director_id: &str,
        mbus_url: &str,
        ca_cert: &str,
    ) -> Result<Arc<dyn AgentClient>, AgentError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAgentClientFactory;

impl AgentClientFactory for HttpAgentClientFactory {
    fn new_agent_client(
        &self,
        director_id: &str,
        mbus_url: &str,
        ca_cert: &str,
    ) -> Result<Arc<dyn AgentClient>, AgentError> {
        let mbus = MbusUrl::parse(mbus_url).map_err(|source| AgentError::InvalidUrl {
            url: mbus_url.to_string(),
            source,
        })?;

        let mut builder = reqwest::Client::builder();
        if !ca_cert.trim().is_empty() {
            let cert = reqwest::Certificate::from_pem(ca_cert.as_bytes())
                .map_err(AgentError::InvalidCertificate)?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().map_err(AgentError::Client)?;

        Ok(Arc::new(HttpAgentClient::new(http, mbus, director_id)))
    }
}
