// ABOUTME: The deployment manifest for a single-VM environment.
// ABOUTME: Networks, resource pools, disk pools, one job, and the update policy.

use super::error::ManifestError;
use super::installation::ReleaseJobRef;
use super::release_set::{ReleaseSetManifest, has_supported_scheme, is_blank};
use crate::config::Properties;
use crate::release::ReleaseManager;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeploymentManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub update: Update,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub resource_pools: Vec<ResourcePool>,
    #[serde(default)]
    pub disk_pools: Vec<DiskPool>,
    #[serde(default, alias = "instance_groups")]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Update policy. Only the watch time matters for a single instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_watch_time: WatchTime,
}

/// How long to wait for jobs to report running, in milliseconds:
/// either a single number or a `start-end` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTime {
    pub start: u64,
    pub end: u64,
}

impl Default for WatchTime {
    fn default() -> Self {
        Self {
            start: 0,
            end: 300_000,
        }
    }
}

impl WatchTime {
    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start)
    }

    pub fn end(&self) -> Duration {
        Duration::from_millis(self.end)
    }
}

impl<'de> Deserialize<'de> for WatchTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u64),
            Range(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Self { start: ms, end: ms }),
            Raw::Range(raw) => {
                let parse = |s: &str| {
                    s.trim()
                        .parse::<u64>()
                        .map_err(<D::Error as serde::de::Error>::custom)
                };
                match raw.split_once('-') {
                    Some((start, end)) => Ok(Self {
                        start: parse(start)?,
                        end: parse(end)?,
                    }),
                    None => {
                        let ms = parse(&raw)?;
                        Ok(Self { start: ms, end: ms })
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub network_type: String,
    #[serde(default)]
    pub cloud_properties: Properties,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

pub const NETWORK_MANUAL: &str = "manual";
pub const NETWORK_DYNAMIC: &str = "dynamic";
pub const NETWORK_VIP: &str = "vip";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Subnet {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub static_ips: Vec<String>,
    #[serde(default)]
    pub cloud_properties: Properties,
}

impl Subnet {
    /// Dotted netmask of the subnet range, if it is a valid IPv4 CIDR.
    pub fn netmask(&self) -> Option<Ipv4Addr> {
        parse_cidr(&self.range).map(|(_, prefix)| Ipv4Addr::from(prefix_mask(prefix)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourcePool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub cloud_properties: Properties,
    #[serde(default)]
    pub env: Properties,
    #[serde(default)]
    pub stemcell: StemcellRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StemcellRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DiskPool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub disk_size: i64,
    #[serde(default)]
    pub cloud_properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instances: i64,
    #[serde(default)]
    pub lifecycle: String,
    #[serde(default, alias = "jobs")]
    pub templates: Vec<ReleaseJobRef>,
    #[serde(default)]
    pub networks: Vec<JobNetwork>,
    #[serde(default)]
    pub persistent_disk: i64,
    #[serde(default)]
    pub persistent_disk_pool: String,
    #[serde(default)]
    pub resource_pool: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobNetwork {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub static_ips: Vec<String>,
    #[serde(default)]
    pub default: Vec<String>,
}

impl DeploymentManifest {
    pub fn job(&self) -> Option<&Job> {
        self.jobs.first()
    }

    pub fn resource_pool(&self, name: &str) -> Option<&ResourcePool> {
        self.resource_pools.iter().find(|p| p.name == name)
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }

    /// The stemcell of the job's resource pool (or the first pool).
    pub fn stemcell(&self) -> Option<&StemcellRef> {
        self.job()
            .and_then(|job| self.resource_pool(&job.resource_pool))
            .or_else(|| self.resource_pools.first())
            .map(|pool| &pool.stemcell)
    }

    /// Persistent disk wanted by `job_name`: a named disk pool wins over a bare size.
    pub fn disk_pool(&self, job_name: &str) -> Result<Option<DiskPool>, ManifestError> {
        let Some(job) = self.jobs.iter().find(|j| j.name == job_name) else {
            return Ok(None);
        };

        if !job.persistent_disk_pool.is_empty() {
            return self
                .disk_pools
                .iter()
                .find(|p| p.name == job.persistent_disk_pool)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    ManifestError::Invalid(vec![format!(
                        "Could not find persistent disk pool '{}' for job '{}'",
                        job.persistent_disk_pool, job.name
                    )])
                });
        }

        if job.persistent_disk > 0 {
            return Ok(Some(DiskPool {
                name: String::new(),
                disk_size: job.persistent_disk,
                cloud_properties: Properties::new(),
            }));
        }

        Ok(None)
    }

    /// Network settings handed to the CPI for `job_name`, keyed by network name.
    pub fn network_interfaces(&self, job_name: &str) -> Result<Properties, ManifestError> {
        let Some(job) = self.jobs.iter().find(|j| j.name == job_name) else {
            return Ok(Properties::new());
        };

        let mut interfaces = Properties::new();
        for job_network in &job.networks {
            let network = self.network(&job_network.name).ok_or_else(|| {
                ManifestError::Invalid(vec![format!(
                    "Could not find network '{}' for job '{}'",
                    job_network.name, job.name
                )])
            })?;
            let ip = job_network.static_ips.first();

            let mut iface = Properties::new();
            iface.insert("type".into(), network.network_type.clone().into());
            let mut cloud_properties = network.cloud_properties.clone();
            match network.network_type.as_str() {
                NETWORK_MANUAL => {
                    if let Some(subnet) = network.subnets.first() {
                        if let Some(ip) = ip {
                            iface.insert("ip".into(), ip.clone().into());
                        }
                        if let Some(netmask) = subnet.netmask() {
                            iface.insert("netmask".into(), netmask.to_string().into());
                        }
                        iface.insert("gateway".into(), subnet.gateway.clone().into());
                        if !subnet.dns.is_empty() {
                            iface.insert("dns".into(), subnet.dns.clone().into());
                        }
                        cloud_properties.extend(subnet.cloud_properties.clone());
                    }
                }
                NETWORK_VIP => {
                    if let Some(ip) = ip {
                        iface.insert("ip".into(), ip.clone().into());
                    }
                }
                _ => {
                    if !network.dns.is_empty() {
                        iface.insert("dns".into(), network.dns.clone().into());
                    }
                }
            }
            if !job_network.default.is_empty() {
                iface.insert("default".into(), job_network.default.clone().into());
            }
            iface.insert("cloud_properties".into(), cloud_properties.into());
            interfaces.insert(network.name.clone(), iface.into());
        }
        Ok(interfaces)
    }

    /// Structural validation against the release set.
    pub fn validate(&self, release_set: &ReleaseSetManifest) -> Result<(), ManifestError> {
        let mut errors = Vec::new();

        if is_blank(&self.name) {
            errors.push("name must be provided".to_string());
        }

        for (idx, network) in self.networks.iter().enumerate() {
            validate_network(idx, network, &mut errors);
        }

        let network_names: HashSet<&str> = self.networks.iter().map(|n| n.name.as_str()).collect();
        for (idx, pool) in self.resource_pools.iter().enumerate() {
            if is_blank(&pool.name) {
                errors.push(format!("resource_pools[{idx}].name must be provided"));
            }
            if is_blank(&pool.network) {
                errors.push(format!("resource_pools[{idx}].network must be provided"));
            } else if !network_names.contains(pool.network.as_str()) {
                errors.push(format!(
                    "resource_pools[{idx}].network must be the name of a network"
                ));
            }

            if is_blank(&pool.stemcell.url) {
                errors.push(format!("resource_pools[{idx}].stemcell.url must be provided"));
            }
            if !has_supported_scheme(&pool.stemcell.url) {
                errors.push(format!(
                    "resource_pools[{idx}].stemcell.url must be a valid URL (file:// or http(s)://)"
                ));
            }
            if pool.stemcell.url.starts_with("http")
                && pool.stemcell.sha1.as_deref().is_none_or(is_blank)
            {
                errors.push(format!(
                    "resource_pools[{idx}].stemcell.sha1 must be provided for http URL"
                ));
            }
        }

        for (idx, pool) in self.disk_pools.iter().enumerate() {
            if is_blank(&pool.name) {
                errors.push(format!("disk_pools[{idx}].name must be provided"));
            }
            if pool.disk_size <= 0 {
                errors.push(format!("disk_pools[{idx}].disk_size must be > 0"));
            }
        }

        if self.jobs.len() > 1 {
            errors.push("jobs must be of size 1".to_string());
        }

        let disk_pool_names: HashSet<&str> =
            self.disk_pools.iter().map(|p| p.name.as_str()).collect();
        let resource_pool_names: HashSet<&str> =
            self.resource_pools.iter().map(|p| p.name.as_str()).collect();

        for (idx, job) in self.jobs.iter().enumerate() {
            if is_blank(&job.name) {
                errors.push(format!("jobs[{idx}].name must be provided"));
            }
            if job.persistent_disk < 0 {
                errors.push(format!("jobs[{idx}].persistent_disk must be >= 0"));
            }
            if !job.persistent_disk_pool.is_empty()
                && !disk_pool_names.contains(job.persistent_disk_pool.as_str())
            {
                errors.push(format!(
                    "jobs[{idx}].persistent_disk_pool must be the name of a disk pool"
                ));
            }
            if job.instances < 0 {
                errors.push(format!("jobs[{idx}].instances must be >= 0"));
            }
            if job.networks.is_empty() {
                errors.push(format!("jobs[{idx}].networks must be a non-empty array"));
            }
            if is_blank(&job.resource_pool) {
                errors.push(format!("jobs[{idx}].resource_pool must be provided"));
            } else if !resource_pool_names.contains(job.resource_pool.as_str()) {
                errors.push(format!(
                    "jobs[{idx}].resource_pool must be the name of a resource pool"
                ));
            }

            for (net_idx, network) in job.networks.iter().enumerate() {
                if is_blank(&network.name) {
                    errors.push(format!(
                        "jobs[{idx}].networks[{net_idx}].name must be provided"
                    ));
                }
                for (ip_idx, ip) in network.static_ips.iter().enumerate() {
                    if ip.parse::<IpAddr>().is_err() {
                        errors.push(format!(
                            "jobs[{idx}].networks[{net_idx}].static_ips[{ip_idx}] must be a valid IP"
                        ));
                    }
                }
                for (def_idx, value) in network.default.iter().enumerate() {
                    if value != "dns" && value != "gateway" {
                        errors.push(format!(
                            "jobs[{idx}].networks[{net_idx}].default[{def_idx}] must be 'dns' or 'gateway'"
                        ));
                    }
                }
            }

            if !job.lifecycle.is_empty() && job.lifecycle != "service" {
                errors.push(format!(
                    "jobs[{idx}].lifecycle must be 'service' ('{}' not supported)",
                    job.lifecycle
                ));
            }

            let mut template_names = HashSet::new();
            for (t_idx, template) in job.templates.iter().enumerate() {
                if is_blank(&template.name) {
                    errors.push(format!("jobs[{idx}].templates[{t_idx}].name must be provided"));
                }
                if !template_names.insert(template.name.as_str()) {
                    errors.push(format!(
                        "jobs[{idx}].templates[{t_idx}].name '{}' must be unique",
                        template.name
                    ));
                }
                if is_blank(&template.release) {
                    errors.push(format!(
                        "jobs[{idx}].templates[{t_idx}].release must be provided"
                    ));
                } else if release_set.find_by_name(&template.release).is_none() {
                    errors.push(format!(
                        "jobs[{idx}].templates[{t_idx}].release '{}' must refer to release in releases",
                        template.release
                    ));
                }
            }
        }

        ManifestError::from_errors(errors)
    }

    /// Check that every job template exists in the fetched releases.
    pub fn validate_release_jobs(&self, releases: &ReleaseManager) -> Result<(), ManifestError> {
        let mut errors = Vec::new();

        for (idx, job) in self.jobs.iter().enumerate() {
            for (t_idx, template) in job.templates.iter().enumerate() {
                match releases.find(&template.release) {
                    None => errors.push(format!(
                        "jobs[{idx}].templates[{t_idx}].release '{}' must refer to release in releases",
                        template.release
                    )),
                    Some(release) if release.find_job_by_name(&template.name).is_none() => {
                        errors.push(format!(
                            "jobs[{idx}].templates[{t_idx}] must refer to a job in '{}', but there is no job named '{}'",
                            release.name, template.name
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        ManifestError::from_errors(errors)
    }
}

fn validate_network(idx: usize, network: &Network, errors: &mut Vec<String>) {
    if is_blank(&network.name) {
        errors.push(format!("networks[{idx}].name must be provided"));
    }

    match network.network_type.as_str() {
        NETWORK_DYNAMIC | NETWORK_VIP => {}
        NETWORK_MANUAL => {
            if network.subnets.len() != 1 {
                errors.push(format!("networks[{idx}].subnets must be of size 1"));
                return;
            }
            let subnet = &network.subnets[0];
            let range = if is_blank(&subnet.range) {
                errors.push(format!("networks[{idx}].subnets[0].range must be provided"));
                None
            } else {
                let parsed = parse_cidr(&subnet.range);
                if parsed.is_none() {
                    errors.push(format!("networks[{idx}].subnets[0].range must be an ip range"));
                }
                parsed
            };
            validate_gateway(idx, &subnet.gateway, range, errors);
        }
        _ => errors.push(format!(
            "networks[{idx}].type must be 'manual', 'dynamic', or 'vip'"
        )),
    }
}

fn validate_gateway(
    idx: usize,
    gateway: &str,
    range: Option<(Ipv4Addr, u8)>,
    errors: &mut Vec<String>,
) {
    if is_blank(gateway) {
        errors.push(format!("networks[{idx}].subnets[0].gateway must be provided"));
        return;
    }
    let Some((network, prefix)) = range else {
        return;
    };
    let Ok(gateway_ip) = gateway.parse::<Ipv4Addr>() else {
        errors.push(format!("networks[{idx}].subnets[0].gateway must be an ip"));
        return;
    };

    let mask = prefix_mask(prefix);
    let network_addr = u32::from(network) & mask;
    let broadcast = network_addr | !mask;
    let gw = u32::from(gateway_ip);
    let range_display = format!("{}/{}", Ipv4Addr::from(network_addr), prefix);

    if gw & mask != network_addr {
        errors.push(format!(
            "subnet gateway '{gateway}' must be within the specified range '{range_display}'"
        ));
    }
    if gw == network_addr {
        errors.push(format!(
            "subnet gateway can't be the network address '{gateway_ip}'"
        ));
    }
    if gw == broadcast {
        errors.push(format!(
            "subnet gateway can't be the broadcast address '{gateway_ip}'"
        ));
    }
}

fn parse_cidr(range: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = range.trim().split_once('/')?;
    let addr = addr.parse::<Ipv4Addr>().ok()?;
    let prefix = prefix.parse::<u8>().ok().filter(|p| *p <= 32)?;
    Some((addr, prefix))
}

fn prefix_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(raw: &str) -> DeploymentManifest {
        serde_yaml::from_str(raw).unwrap()
    }

    fn release_set() -> ReleaseSetManifest {
        serde_yaml::from_str("releases:\n- name: bosh\n  url: file://bosh.tgz\n").unwrap()
    }

    const VALID: &str = r#"
name: bosh
networks:
- name: default
  type: manual
  subnets:
  - range: 10.0.0.0/24
    gateway: 10.0.0.1
resource_pools:
- name: vms
  network: default
  stemcell:
    url: file://stemcell.tgz
disk_pools:
- name: disks
  disk_size: 32768
instance_groups:
- name: bosh
  instances: 1
  jobs:
  - {name: director, release: bosh}
  resource_pool: vms
  persistent_disk_pool: disks
  networks:
  - name: default
    static_ips: [10.0.0.6]
"#;

    #[test]
    fn instance_groups_and_jobs_aliases_parse() {
        let m = manifest(VALID);
        assert_eq!(m.jobs.len(), 1);
        assert_eq!(m.jobs[0].templates[0].name, "director");
        assert!(m.validate(&release_set()).is_ok());
    }

    #[test]
    fn watch_time_accepts_range_and_number() {
        let m = manifest("update:\n  update_watch_time: 1000-60000\n");
        assert_eq!(m.update.update_watch_time, WatchTime { start: 1000, end: 60000 });

        let m = manifest("update:\n  update_watch_time: 5000\n");
        assert_eq!(m.update.update_watch_time, WatchTime { start: 5000, end: 5000 });
    }

    #[test]
    fn reports_every_problem() {
        let m = manifest(
            r#"
networks:
- name: n
  type: bogus
resource_pools:
- name: vms
  network: missing
  stemcell: {url: "ftp://x"}
disk_pools:
- name: d
  disk_size: 0
"#,
        );
        let err = m.validate(&release_set()).unwrap_err().to_string();
        assert!(err.contains("name must be provided"));
        assert!(err.contains("networks[0].type must be 'manual', 'dynamic', or 'vip'"));
        assert!(err.contains("resource_pools[0].network must be the name of a network"));
        assert!(err.contains("resource_pools[0].stemcell.url must be a valid URL"));
        assert!(err.contains("disk_pools[0].disk_size must be > 0"));
    }

    #[test]
    fn gateway_must_be_inside_range() {
        let mut m = manifest(VALID);
        m.networks[0].subnets[0].gateway = "10.0.1.1".to_string();
        let err = m.validate(&release_set()).unwrap_err().to_string();
        assert!(err.contains("subnet gateway '10.0.1.1' must be within the specified range '10.0.0.0/24'"));
    }

    #[test]
    fn http_stemcell_requires_sha1() {
        let mut m = manifest(VALID);
        m.resource_pools[0].stemcell.url = "https://example.com/stemcell.tgz".to_string();
        let err = m.validate(&release_set()).unwrap_err().to_string();
        assert!(err.contains("resource_pools[0].stemcell.sha1 must be provided for http URL"));
    }

    #[test]
    fn named_disk_pool_wins_over_size() {
        let m = manifest(VALID);
        let pool = m.disk_pool("bosh").unwrap().unwrap();
        assert_eq!(pool.disk_size, 32768);
        assert_eq!(m.disk_pool("other").unwrap(), None);
    }

    #[test]
    fn manual_network_interface_uses_static_ip_and_subnet() {
        let m = manifest(VALID);
        let ifaces = m.network_interfaces("bosh").unwrap();
        let iface = &ifaces["default"];
        assert_eq!(iface["type"], "manual");
        assert_eq!(iface["ip"], "10.0.0.6");
        assert_eq!(iface["netmask"], "255.255.255.0");
        assert_eq!(iface["gateway"], "10.0.0.1");
    }

    #[test]
    fn stemcell_comes_from_job_resource_pool() {
        let m = manifest(VALID);
        assert_eq!(m.stemcell().unwrap().url, "file://stemcell.tgz");
    }
}
