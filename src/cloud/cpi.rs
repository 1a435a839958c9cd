// ABOUTME: The Cloud implementation backed by an installed CPI executable.
// ABOUTME: Maps each cloud operation to a CPI method and decodes its result.

use super::cmd::{CmdContext, CpiCmdRunner};
use super::error::CloudError;
use super::{Cloud, CpiInfo};
use crate::config::Properties;
use crate::types::{DiskCid, StemcellCid, VmCid};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// API version used until `info` reports what the CPI supports.
const DEFAULT_CPI_API_VERSION: u32 = 1;

pub struct CpiCloud {
    runner: CpiCmdRunner,
    context: CmdContext,
    api_version: Mutex<u32>,
}

impl CpiCloud {
    pub fn new(runner: CpiCmdRunner, context: CmdContext) -> Self {
        Self {
            runner,
            context,
            api_version: Mutex::new(DEFAULT_CPI_API_VERSION),
        }
    }

    async fn call(&self, method: &str, arguments: Vec<Value>) -> Result<Value, CloudError> {
        let api_version = *self.api_version.lock();
        let output = self
            .runner
            .run(&self.context, method, api_version, &arguments)
            .await?;
        match output.error {
            Some(error) => Err(CloudError::Cpi {
                method: method.to_string(),
                error_type: error.error_type,
                message: error.message,
                ok_to_retry: error.ok_to_retry,
            }),
            None => Ok(output.result),
        }
    }

    async fn call_for_string(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<String, CloudError> {
        match self.call(method, arguments).await? {
            Value::String(s) => Ok(s),
            Value::Array(items) => match items.into_iter().next() {
                // api v2 create_vm returns [cid, network_settings]
                Some(Value::String(s)) => Ok(s),
                other => Err(unexpected(method, &other.unwrap_or_default())),
            },
            other => Err(unexpected(method, &other)),
        }
    }
}

fn unexpected(method: &str, result: &Value) -> CloudError {
    CloudError::UnexpectedResult {
        method: method.to_string(),
        result: result.to_string(),
    }
}

#[async_trait]
impl Cloud for CpiCloud {
    async fn info(&self) -> Result<CpiInfo, CloudError> {
        let result = self.call("info", Vec::new()).await?;
        let info: CpiInfo =
            serde_json::from_value(result.clone()).map_err(|_| unexpected("info", &result))?;
        // Later calls speak the highest version both sides understand.
        *self.api_version.lock() = info.api_version.clamp(
            DEFAULT_CPI_API_VERSION,
            crate::cpi::MAX_SUPPORTED_CPI_API_VERSION,
        );
        Ok(info)
    }

    async fn create_stemcell(
        &self,
        image_path: &Path,
        cloud_properties: &Properties,
    ) -> Result<StemcellCid, CloudError> {
        let cid = self
            .call_for_string(
                "create_stemcell",
                vec![
                    json!(image_path.display().to_string()),
                    Value::Object(cloud_properties.clone()),
                ],
            )
            .await?;
        Ok(StemcellCid::new(cid))
    }

    async fn delete_stemcell(&self, cid: &StemcellCid) -> Result<(), CloudError> {
        self.call("delete_stemcell", vec![json!(cid.as_str())])
            .await
            .map(drop)
    }

    async fn has_vm(&self, cid: &VmCid) -> Result<bool, CloudError> {
        match self.call("has_vm", vec![json!(cid.as_str())]).await? {
            Value::Bool(found) => Ok(found),
            other => Err(unexpected("has_vm", &other)),
        }
    }

    async fn create_vm(
        &self,
        agent_id: &str,
        stemcell_cid: &StemcellCid,
        cloud_properties: &Properties,
        networks: &Properties,
        disk_cids: &[DiskCid],
        env: &Properties,
    ) -> Result<VmCid, CloudError> {
        let disk_cids: Vec<&str> = disk_cids.iter().map(|c| c.as_str()).collect();
        let cid = self
            .call_for_string(
                "create_vm",
                vec![
                    json!(agent_id),
                    json!(stemcell_cid.as_str()),
                    Value::Object(cloud_properties.clone()),
                    Value::Object(networks.clone()),
                    json!(disk_cids),
                    Value::Object(env.clone()),
                ],
            )
            .await?;
        Ok(VmCid::new(cid))
    }

    async fn set_vm_metadata(
        &self,
        cid: &VmCid,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        match self
            .call("set_vm_metadata", vec![json!(cid.as_str()), json!(metadata)])
            .await
        {
            Err(e) if e.is_not_implemented() => Ok(()),
            other => other.map(drop),
        }
    }

    async fn delete_vm(&self, cid: &VmCid) -> Result<(), CloudError> {
        self.call("delete_vm", vec![json!(cid.as_str())])
            .await
            .map(drop)
    }

    async fn create_disk(
        &self,
        size_mb: u64,
        cloud_properties: &Properties,
        vm_cid: &VmCid,
    ) -> Result<DiskCid, CloudError> {
        let cid = self
            .call_for_string(
                "create_disk",
                vec![
                    json!(size_mb),
                    Value::Object(cloud_properties.clone()),
                    json!(vm_cid.as_str()),
                ],
            )
            .await?;
        Ok(DiskCid::new(cid))
    }

    async fn attach_disk(&self, vm_cid: &VmCid, disk_cid: &DiskCid) -> Result<(), CloudError> {
        self.call(
            "attach_disk",
            vec![json!(vm_cid.as_str()), json!(disk_cid.as_str())],
        )
        .await
        .map(drop)
    }

    async fn detach_disk(&self, vm_cid: &VmCid, disk_cid: &DiskCid) -> Result<(), CloudError> {
        self.call(
            "detach_disk",
            vec![json!(vm_cid.as_str()), json!(disk_cid.as_str())],
        )
        .await
        .map(drop)
    }

    async fn delete_disk(&self, cid: &DiskCid) -> Result<(), CloudError> {
        self.call("delete_disk", vec![json!(cid.as_str())])
            .await
            .map(drop)
    }
}
