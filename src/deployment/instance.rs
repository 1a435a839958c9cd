// ABOUTME: The single instance (`<job>/0`) running on the environment's VM.
// ABOUTME: Stage-reported shutdown, delete, start, and job update sequences.

use super::error::DeployError;
use super::vm::Vm;
use crate::manifest::Update;
use crate::stage::Stage;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// How long an existing VM's agent gets to answer before it is written off.
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);
pub const PING_DELAY: Duration = Duration::from_millis(500);

/// Interval between job state polls.
const RUNNING_POLL_DELAY: Duration = Duration::from_secs(1);

pub struct Instance {
    job_name: String,
    index: usize,
    vm: Vm,
}

impl Instance {
    pub fn new(job_name: impl Into<String>, index: usize, vm: Vm) -> Self {
        Self {
            job_name: job_name.into(),
            index,
            vm,
        }
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// `<job>/<index>`, the name used in progress output.
    pub fn name(&self) -> String {
        format!("{}/{}", self.job_name, self.index)
    }

    /// Drain and stop the jobs. An unreachable agent is logged and skipped.
    ///
    /// Returns whether the agent answered.
    pub async fn shutdown(&self, skip_drain: bool, stage: &Stage) -> Result<bool, DeployError> {
        let vm = &self.vm;
        let waited = stage
            .perform(format!("Waiting for the agent on VM '{}'", vm.cid()), || {
                vm.wait_until_ready(PING_TIMEOUT, PING_DELAY)
            })
            .await;
        if let Err(e) = waited {
            warn!(vm = %vm.cid(), error = %e, "gave up waiting for agent");
            return Ok(false);
        }

        let name = self.name();
        if !skip_drain {
            stage
                .perform(format!("Draining jobs on instance '{name}'"), || vm.drain())
                .await?;
        }
        stage
            .perform(format!("Stopping jobs on instance '{name}'"), || vm.stop())
            .await?;
        Ok(true)
    }

    /// Shut the instance down, unmount its disks, and delete the VM.
    pub async fn delete(&self, skip_drain: bool, stage: &Stage) -> Result<(), DeployError> {
        let vm = &self.vm;
        if vm.exists().await? && self.shutdown(skip_drain, stage).await? {
            for disk in vm.disks().await? {
                let disk = &disk;
                stage
                    .perform(format!("Unmounting disk '{disk}'"), || async move {
                        vm.unmount_disk(disk).await
                    })
                    .await?;
            }
        }

        // The CPI may still own resources for a VM it no longer reports.
        stage
            .perform_skippable(format!("Deleting VM '{}'", vm.cid()), || async move {
                match vm.delete().await {
                    Ok(()) => Ok(None),
                    Err(DeployError::Cloud(e)) if e.is_vm_not_found() => {
                        Ok(Some("VM not found".to_string()))
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// Wait for the agent, start the jobs, and watch them come up.
    pub async fn start(&self, update: &Update, stage: &Stage) -> Result<(), DeployError> {
        let vm = &self.vm;
        stage
            .perform(format!("Waiting for the agent on VM '{}'", vm.cid()), || {
                vm.wait_until_ready(PING_TIMEOUT, PING_DELAY)
            })
            .await?;
        stage
            .perform(format!("Starting jobs on instance '{}'", self.name()), || {
                vm.start()
            })
            .await?;
        self.wait_until_running(update, stage).await
    }

    /// Stop the jobs, apply `spec`, and start them again.
    pub async fn update_jobs(
        &self,
        spec: &Value,
        update: &Update,
        stage: &Stage,
    ) -> Result<(), DeployError> {
        let vm = &self.vm;
        stage
            .perform(format!("Updating instance '{}'", self.name()), || async move {
                vm.stop().await?;
                vm.apply(spec).await?;
                vm.start().await
            })
            .await?;
        self.wait_until_running(update, stage).await
    }

    async fn wait_until_running(&self, update: &Update, stage: &Stage) -> Result<(), DeployError> {
        let vm = &self.vm;
        let watch = update.update_watch_time;
        stage
            .perform(
                format!("Waiting for instance '{}' to be running", self.name()),
                || async move {
                    tokio::time::sleep(watch.start()).await;
                    vm.wait_to_be_running(poll_attempts(watch.start(), watch.end()), RUNNING_POLL_DELAY)
                        .await
                },
            )
            .await
    }
}

/// One poll per second across the watch window, at least one.
fn poll_attempts(start: Duration, end: Duration) -> u32 {
    let window = end.saturating_sub(start).as_secs();
    u32::try_from(window).unwrap_or(u32::MAX).max(1)
}
