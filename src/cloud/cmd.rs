// ABOUTME: Runs the installed CPI executable with a JSON request on stdin.
// ABOUTME: One process per call; stdout carries the JSON response.

use super::error::CloudError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const CPI_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/sbin";
const ISOLATED_ENV_VAR: &str = "BOSH_CPI_USE_ISOLATED_ENV";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CmdContext {
    pub director_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm: Option<CmdVm>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CmdVm {
    pub stemcell: CmdStemcell,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CmdStemcell {
    pub api_version: u32,
}

impl CmdContext {
    pub fn new(director_uuid: impl Into<String>, stemcell_api_version: u32) -> Self {
        Self {
            director_uuid: director_uuid.into(),
            vm: Some(CmdVm {
                stemcell: CmdStemcell {
                    api_version: stemcell_api_version,
                },
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct CmdInput<'a> {
    method: &'a str,
    arguments: &'a [Value],
    context: &'a CmdContext,
    api_version: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CmdError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ok_to_retry: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CmdOutput {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<CmdError>,
    #[serde(default)]
    pub log: String,
}

/// Locations of an installed CPI job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpiJob {
    pub job_path: PathBuf,
    pub jobs_dir: PathBuf,
    pub packages_dir: PathBuf,
}

impl CpiJob {
    pub fn executable_path(&self) -> PathBuf {
        self.job_path.join("bin").join("cpi")
    }
}

#[derive(Debug, Clone)]
pub struct CpiCmdRunner {
    cpi: CpiJob,
}

impl CpiCmdRunner {
    pub fn new(cpi: CpiJob) -> Self {
        Self { cpi }
    }

    pub async fn run(
        &self,
        context: &CmdContext,
        method: &str,
        api_version: u32,
        arguments: &[Value],
    ) -> Result<CmdOutput, CloudError> {
        let input = serde_json::to_vec(&CmdInput {
            method,
            arguments,
            context,
            api_version,
        })
        .map_err(CloudError::Marshal)?;

        let path = self.cpi.executable_path();
        let mut cmd = Command::new(&path);
        if use_isolated_env()? {
            cmd.env_clear();
        }
        cmd.env("BOSH_PACKAGES_DIR", &self.cpi.packages_dir)
            .env("BOSH_JOBS_DIR", &self.cpi.jobs_dir)
            .env("PATH", CPI_PATH)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let exec_err = |source| CloudError::Exec {
            path: path.clone(),
            source,
        };
        let mut child = cmd.spawn().map_err(exec_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(exec_err)?;
        }
        let output = child.wait_with_output().await.map_err(exec_err)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            cpi = %path.display(),
            method,
            exit_code = ?output.status.code(),
            %stderr,
            "executed external CPI command"
        );

        let parsed: CmdOutput =
            serde_json::from_str(&stdout).map_err(|source| CloudError::Unmarshal {
                stdout,
                stderr,
                source,
            })?;
        if !parsed.log.is_empty() {
            debug!(method, log = %parsed.log, "CPI log");
        }
        Ok(parsed)
    }
}

fn use_isolated_env() -> Result<bool, CloudError> {
    match std::env::var(ISOLATED_ENV_VAR) {
        Err(_) => Ok(true),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(CloudError::IsolatedEnv(value)),
        },
    }
}
