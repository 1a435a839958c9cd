// ABOUTME: Agent client speaking JSON over HTTPS to <mbus>/agent.
// ABOUTME: Long-running methods return a task id that is polled until done.

use super::error::AgentError;
use super::{AgentClient, AgentState};
use crate::types::{DiskCid, MbusUrl};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const TASK_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    method: &'a str,
    arguments: &'a [Value],
    reply_to: &'a str,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    exception: Option<AgentException>,
}

#[derive(Debug, Deserialize)]
struct AgentException {
    #[serde(default)]
    message: String,
}

pub struct HttpAgentClient {
    http: reqwest::Client,
    mbus: MbusUrl,
    reply_to: String,
    poll_interval: Duration,
}

impl HttpAgentClient {
    pub fn new(http: reqwest::Client, mbus: MbusUrl, reply_to: impl Into<String>) -> Self {
        Self {
            http,
            mbus,
            reply_to: reply_to.into(),
            poll_interval: TASK_POLL_INTERVAL,
        }
    }

    async fn send(&self, method: &str, arguments: &[Value]) -> Result<Value, AgentError> {
        let body = AgentRequest {
            method,
            arguments,
            reply_to: &self.reply_to,
        };
        let http_err = |source| AgentError::Http {
            method: method.to_string(),
            source,
        };

        let response = self
            .mbus
            .authorize(self.http.post(self.mbus.join("agent")))
            .json(&body)
            .send()
            .await
            .map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status {
                method: method.to_string(),
                status,
            });
        }

        let parsed: AgentResponse = response.json().await.map_err(http_err)?;
        if let Some(exception) = parsed.exception {
            return Err(AgentError::Exception {
                method: method.to_string(),
                message: exception.message,
            });
        }
        debug!(method, "agent responded");
        Ok(parsed.value)
    }

    /// Send a method that may run as an agent task and wait for its result.
    async fn send_async(&self, method: &str, arguments: &[Value]) -> Result<Value, AgentError> {
        let mut value = self.send(method, arguments).await?;
        while let Some(task_id) = running_task_id(&value) {
            tokio::time::sleep(self.poll_interval).await;
            value = self.send("get_task", &[json!(task_id)]).await?;
        }
        Ok(value)
    }
}

fn running_task_id(value: &Value) -> Option<String> {
    let state = value.get("state")?.as_str()?;
    if state != "running" {
        return None;
    }
    value
        .get("agent_task_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn unexpected(method: &str, value: &Value) -> AgentError {
    AgentError::UnexpectedResponse {
        method: method.to_string(),
        response: value.to_string(),
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ping(&self) -> Result<String, AgentError> {
        match self.send("ping", &[]).await? {
            Value::String(s) => Ok(s),
            other => Err(unexpected("ping", &other)),
        }
    }

    async fn stop(&self) -> Result<(), AgentError> {
        self.send_async("stop", &[]).await.map(drop)
    }

    async fn apply(&self, spec: &Value) -> Result<(), AgentError> {
        self.send_async("apply", std::slice::from_ref(spec))
            .await
            .map(drop)
    }

    async fn start(&self) -> Result<(), AgentError> {
        self.send("start", &[]).await.map(drop)
    }

    async fn get_state(&self) -> Result<AgentState, AgentError> {
        let value = self.send("get_state", &[]).await?;
        serde_json::from_value(value.clone()).map_err(|_| unexpected("get_state", &value))
    }

    async fn mount_disk(&self, disk_cid: &DiskCid) -> Result<(), AgentError> {
        self.send_async("mount_disk", &[json!(disk_cid.as_str())])
            .await
            .map(drop)
    }

    async fn unmount_disk(&self, disk_cid: &DiskCid) -> Result<(), AgentError> {
        self.send_async("unmount_disk", &[json!(disk_cid.as_str())])
            .await
            .map(drop)
    }

    async fn list_disk(&self) -> Result<Vec<DiskCid>, AgentError> {
        let value = self.send("list_disk", &[]).await?;
        let cids: Vec<String> =
            serde_json::from_value(value.clone()).map_err(|_| unexpected("list_disk", &value))?;
        Ok(cids.into_iter().map(DiskCid::new).collect())
    }

    async fn migrate_disk(&self) -> Result<(), AgentError> {
        self.send_async("migrate_disk", &[]).await.map(drop)
    }

    async fn drain(&self, kind: &str) -> Result<i64, AgentError> {
        let value = self.send_async("drain", &[json!(kind), json!({})]).await?;
        value.as_i64().ok_or_else(|| unexpected("drain", &value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_task_is_detected() {
        let running = json!({"agent_task_id": "t-1", "state": "running"});
        assert_eq!(running_task_id(&running).as_deref(), Some("t-1"));
        assert_eq!(running_task_id(&json!("stopped")), None);
        assert_eq!(running_task_id(&json!({"state": "done"})), None);
    }

    #[test]
    fn response_exception_is_optional() {
        let ok: AgentResponse = serde_json::from_str(r#"{"value":"pong"}"#).unwrap();
        assert_eq!(ok.value, json!("pong"));
        assert!(ok.exception.is_none());

        let err: AgentResponse =
            serde_json::from_str(r#"{"exception":{"message":"boom"}}"#).unwrap();
        assert_eq!(err.exception.unwrap().message, "boom");
    }
}
