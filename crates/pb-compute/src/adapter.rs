use std::future::Future;
use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use profitbricks_api::{
    CreateFirewallRuleProperties, CreateFirewallRuleRequest, CreateIpBlockProperties,
    CreateIpBlockRequest, CreateNicProperties, CreateNicRequest, CreateServerProperties,
    CreateServerRequest, CreateVolumeProperties, CreateVolumeRequest, IdRef, ImageType,
};
use tracing::{debug, error, info, warn};

use crate::client::CloudApi;
use crate::config::{AdapterConfig, ComputeConfig};
use crate::functions::{self, Location};
use crate::hardware::{self, Hardware};
use crate::password;
use crate::predicates::Waiters;
use crate::provisioning::{ProvisioningJob, ProvisioningManager};
use crate::types::{
    DataCenterAndId, LoginCredentials, NicRef, NodeAndInitialCredentials, PartialFailure,
    Provisionable, ServerInDataCenter, ServerRuntimeStatus, Template, VolumeRef,
};
use crate::{CreateStage, Error, Result};

const DEFAULT_LOGIN_USER: &str = "root";

/// Resources created so far by one create-node run; what rollback deletes.
#[derive(Debug, Default)]
struct Provisioned {
    volume_ids: Vec<String>,
    server_id: Option<String>,
    ip_block_id: Option<String>,
}

/// Node lifecycle operations against one ProfitBricks account.
///
/// Holds no mutable state of its own; all mutations go through the shared
/// [`ProvisioningManager`].
pub struct ComputeServiceAdapter {
    api: Arc<dyn CloudApi>,
    manager: Arc<ProvisioningManager>,
    waiters: Waiters,
    config: AdapterConfig,
}

impl ComputeServiceAdapter {
    pub fn new(api: Arc<dyn CloudApi>, manager: Arc<ProvisioningManager>, config: AdapterConfig) -> Self {
        Self {
            waiters: Waiters::new(api.clone(), config.poll),
            api,
            manager,
            config,
        }
    }

    /// Adapter talking to the real API with a fresh provisioning manager.
    pub fn from_config(config: &ComputeConfig) -> Self {
        Self::new(
            Arc::new(config.client()),
            Arc::new(ProvisioningManager::new()),
            config.adapter.clone(),
        )
    }

    pub fn manager(&self) -> &Arc<ProvisioningManager> {
        &self.manager
    }

    /// Submit a mutating call to the datacenter's queue.
    async fn provision<T, F, Fut>(&self, datacenter_id: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn CloudApi>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let api = self.api.clone();
        self.manager
            .provision(ProvisioningJob::new(datacenter_id, move || work(api)))
            .await
    }

    // ── Create ───────────────────────────────────────────────────────

    /// Provision volumes, server and network for a new node, then reboot it.
    ///
    /// Failure of the boot volume, the server, the IP block or the NIC is
    /// fatal: everything created so far is deleted and the triggering error is
    /// returned wrapped in [`Error::Fatal`]. Failures of extra volumes,
    /// attachments and firewall rules are skipped and reported in
    /// [`NodeAndInitialCredentials::skipped`].
    pub async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials> {
        let dc = template.location.id.clone();
        let options = &template.options;
        let hardware = &template.hardware;

        if hardware.volumes_gb.is_empty() {
            return Err(Error::InvalidId(format!("hardware {} has no volumes", hardware.id())));
        }

        let region = match &template.location.region {
            Some(region) => region.clone(),
            None => self
                .api
                .get_datacenter(&dc)
                .await?
                .and_then(|d| d.properties.location)
                .ok_or_else(|| Error::not_found("datacenter", dc.as_str()))?,
        };

        let credentials = LoginCredentials {
            user: options
                .login_user
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_LOGIN_USER.into()),
            password: options
                .login_password
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(password::generate),
            private_key: options.login_private_key.clone(),
        };

        info!(group, name, datacenter_id = %dc, hardware = %hardware.id(), "creating node");

        let mut progress = Provisioned::default();
        let mut skipped = Vec::new();

        // Volumes: the first carries the image and is required.
        for (i, size_gb) in hardware.volumes_gb.iter().enumerate() {
            let is_boot = i == 0;
            let req = CreateVolumeRequest {
                properties: CreateVolumeProperties {
                    name: format!("{name}-disk-{}", i + 1),
                    size: *size_gb as f32,
                    volume_type: self.config.volume_type,
                    image: is_boot.then(|| template.image_id.clone()),
                    image_password: is_boot.then(|| credentials.password.clone()),
                    licence_type: None,
                    ssh_keys: None,
                },
            };
            debug!(datacenter_id = %dc, volume = %req.properties.name, size_gb, "provisioning volume");

            let dc_id = dc.clone();
            let created = self
                .provision(&dc, move |api| async move { api.create_volume(&dc_id, &req).await })
                .await;
            match created {
                Ok(volume) => {
                    debug!(datacenter_id = %dc, volume_id = %volume.id, "volume provisioned");
                    progress.volume_ids.push(volume.id);
                }
                Err(e) if is_boot => {
                    error!(datacenter_id = %dc, error = %e, "failed to provision boot volume");
                    return Err(Error::fatal(CreateStage::ProvisionBootVolume, e));
                }
                Err(e) => {
                    warn!(datacenter_id = %dc, index = i, error = %e, "failed to provision volume; skipping");
                    skipped.push(PartialFailure {
                        stage: CreateStage::ProvisionVolume,
                        resource_id: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let boot_volume_id = progress.volume_ids[0].clone();
        self.waiters
            .await_volume_available(&VolumeRef::new(&dc, &boot_volume_id))
            .await;

        // Server with the boot volume.
        let req = CreateServerRequest {
            properties: CreateServerProperties {
                name: name.to_string(),
                cores: hardware.cores,
                ram: hardware.ram_mb,
                boot_volume: Some(IdRef { id: boot_volume_id }),
                availability_zone: None,
            },
        };
        let dc_id = dc.clone();
        let server = match self
            .provision(&dc, move |api| async move { api.create_server(&dc_id, &req).await })
            .await
        {
            Ok(server) => server,
            Err(e) => return Err(self.abort(&dc, &progress, CreateStage::ProvisionServer, e).await),
        };
        let server_id = server.id;
        progress.server_id = Some(server_id.clone());
        debug!(datacenter_id = %dc, server_id = %server_id, "server provisioned");

        let node_id = DataCenterAndId::new(&dc, &server_id);
        let server_ref = node_id.server_ref();
        self.waiters.await_server_available(&server_ref).await;
        self.waiters.await_datacenter_available(&dc).await;

        // Public IP and NIC.
        let lan_id = self.lan_id(&options.networks);
        let req = CreateIpBlockRequest {
            properties: CreateIpBlockProperties {
                name: format!("{name} block"),
                location: region,
                size: 1,
            },
        };
        let ip_block = match self
            .provision(&dc, move |api| async move { api.create_ip_block(&req).await })
            .await
        {
            Ok(block) => block,
            Err(e) => return Err(self.abort(&dc, &progress, CreateStage::AllocateIpBlock, e).await),
        };
        progress.ip_block_id = Some(ip_block.id.clone());
        debug!(datacenter_id = %dc, ip_block_id = %ip_block.id, ips = ?ip_block.properties.ips, "ip block allocated");

        let port_ranges = port_ranges(&options.inbound_ports);
        let req = CreateNicRequest {
            properties: CreateNicProperties {
                name: Some(format!("{name} nic")),
                ips: ip_block.properties.ips,
                dhcp: true,
                lan: lan_id,
                firewall_active: !port_ranges.is_empty(),
            },
        };
        let (dc_id, srv_id) = (dc.clone(), server_id.clone());
        let nic = match self
            .provision(&dc, move |api| async move { api.create_nic(&dc_id, &srv_id, &req).await })
            .await
        {
            Ok(nic) => nic,
            Err(e) => return Err(self.abort(&dc, &progress, CreateStage::ProvisionNic, e).await),
        };
        self.waiters
            .await_nic_available(&NicRef::new(&dc, &server_id, &nic.id))
            .await;

        for (start, end) in port_ranges {
            let req = CreateFirewallRuleRequest {
                properties: CreateFirewallRuleProperties {
                    name: format!("{name} tcp {start}-{end}"),
                    protocol: "TCP".into(),
                    source_ip: None,
                    port_range_start: start,
                    port_range_end: end,
                },
            };
            let (dc_id, srv_id, nic_id) = (dc.clone(), server_id.clone(), nic.id.clone());
            let created = self
                .provision(&dc, move |api| async move {
                    api.create_firewall_rule(&dc_id, &srv_id, &nic_id, &req).await
                })
                .await;
            if let Err(e) = created {
                warn!(datacenter_id = %dc, nic_id = %nic.id, start, end, error = %e, "failed to create firewall rule; skipping");
                skipped.push(PartialFailure {
                    stage: CreateStage::CreateFirewallRule,
                    resource_id: Some(nic.id.clone()),
                    reason: e.to_string(),
                });
            }
        }

        // Remaining volumes; an unattachable volume is deleted.
        for volume_id in progress.volume_ids.iter().skip(1) {
            let (dc_id, srv_id, vol_id) = (dc.clone(), server_id.clone(), volume_id.clone());
            let attached = self
                .provision(&dc, move |api| async move {
                    api.attach_volume(&dc_id, &srv_id, &vol_id).await
                })
                .await;
            match attached {
                Ok(()) => debug!(datacenter_id = %dc, server_id = %server_id, volume_id = %volume_id, "volume attached"),
                Err(e) => {
                    warn!(datacenter_id = %dc, volume_id = %volume_id, error = %e, "failed to attach volume; deleting it");
                    self.destroy_volume(&dc, volume_id).await;
                    skipped.push(PartialFailure {
                        stage: CreateStage::AttachVolume,
                        resource_id: Some(volume_id.clone()),
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.waiters.await_datacenter_available(&dc).await;
        self.waiters.await_server_available(&server_ref).await;

        // The backend applies NIC and volume changes only after a restart,
        // so this reboot is unconditional.
        let encoded = node_id.slash_encode();
        tokio::time::sleep(self.config.pre_reboot_pause).await;
        let (dc_id, srv_id) = (dc.clone(), server_id.clone());
        let rebooted = self
            .provision(&dc, move |api| async move { api.reboot_server(&dc_id, &srv_id).await })
            .await;
        if let Err(e) = rebooted {
            warn!(node_id = %encoded, error = %e, "post-create reboot failed; continuing");
            skipped.push(PartialFailure {
                stage: CreateStage::Reboot,
                resource_id: Some(server_id.clone()),
                reason: e.to_string(),
            });
        }
        self.waiters.await_server_available(&server_ref).await;
        tokio::time::sleep(self.config.post_reboot_pause).await;

        let node = self.get_node(&encoded).await?;
        info!(node_id = %encoded, skipped = skipped.len(), "node created");

        Ok(NodeAndInitialCredentials {
            node,
            id: encoded,
            credentials,
            skipped,
        })
    }

    fn lan_id(&self, networks: &[String]) -> u32 {
        let Some(first) = networks.first() else {
            return self.config.default_lan_id;
        };
        match first.trim().parse() {
            Ok(lan) => lan,
            Err(_) => {
                warn!(network = %first, default = self.config.default_lan_id, "network is not a LAN id; using default");
                self.config.default_lan_id
            }
        }
    }

    /// Roll back a failed create and return the fatal error for the caller.
    async fn abort(&self, dc: &str, progress: &Provisioned, stage: CreateStage, cause: Error) -> Error {
        error!(datacenter_id = %dc, stage = %stage, error = %cause, "node creation failed; rolling back");

        if let Some(server_id) = &progress.server_id {
            self.destroy_server(dc, server_id).await;
        }
        for volume_id in &progress.volume_ids {
            self.destroy_volume(dc, volume_id).await;
        }
        if let Some(ip_block_id) = &progress.ip_block_id {
            self.destroy_ip_block(dc, ip_block_id).await;
        }

        Error::fatal(stage, cause)
    }

    // ── Catalog ──────────────────────────────────────────────────────

    pub fn list_hardware_profiles(&self) -> Vec<Hardware> {
        hardware::list_hardware_profiles()
    }

    /// HDD images and snapshots, fetched concurrently.
    pub async fn list_images(&self) -> Result<Vec<Provisionable>> {
        let (images, snapshots) = tokio::try_join!(self.api.list_images(), self.api.list_snapshots())?;
        debug!(images = images.len(), snapshots = snapshots.len(), "images fetched");

        Ok(images
            .into_iter()
            .filter(|i| i.properties.image_type == Some(ImageType::Hdd))
            .map(Provisionable::Image)
            .chain(snapshots.into_iter().map(Provisionable::Snapshot))
            .collect())
    }

    /// Looks in images first, then snapshots.
    pub async fn get_image(&self, id: &str) -> Result<Provisionable> {
        if let Some(image) = self.api.get_image(id).await? {
            return Ok(Provisionable::Image(image));
        }
        debug!(image_id = %id, "not an image; trying snapshots");
        if let Some(snapshot) = self.api.get_snapshot(id).await? {
            return Ok(Provisionable::Snapshot(snapshot));
        }
        Err(Error::not_found("image", id))
    }

    /// Every datacenter, with details fetched in parallel.
    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        let datacenters = self.api.list_datacenters().await?;

        let detailed: Vec<Option<_>> = stream::iter(datacenters)
            .map(|dc| async move { self.api.get_datacenter(&dc.id).await })
            .buffered(self.config.user_threads)
            .try_collect()
            .await?;

        Ok(detailed.iter().flatten().map(functions::location).collect())
    }

    // ── Nodes ────────────────────────────────────────────────────────

    pub async fn get_node(&self, id: &str) -> Result<ServerInDataCenter> {
        let node_id: DataCenterAndId = id.parse()?;
        match self.api.get_server(&node_id.datacenter_id, &node_id.id).await? {
            Some(server) => Ok(ServerInDataCenter::new(server, node_id.datacenter_id)),
            None => Err(Error::not_found("node", id)),
        }
    }

    /// Servers across every datacenter. Any failed datacenter fails the listing.
    pub async fn list_nodes(&self) -> Result<Vec<ServerInDataCenter>> {
        let datacenters = self.api.list_datacenters().await?;

        let per_dc: Vec<Vec<ServerInDataCenter>> = stream::iter(datacenters)
            .map(|dc| async move {
                let servers = self.api.list_servers(&dc.id).await?;
                Ok::<_, Error>(
                    servers
                        .into_iter()
                        .map(|s| ServerInDataCenter::new(s, dc.id.clone()))
                        .collect::<Vec<_>>(),
                )
            })
            .buffered(self.config.user_threads)
            .try_collect()
            .await?;

        Ok(per_dc.into_iter().flatten().collect())
    }

    /// Fetches the given nodes in parallel. Any missing node fails the call.
    pub async fn list_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<ServerInDataCenter>> {
        stream::iter(ids.iter().cloned())
            .map(|id| async move { self.get_node(&id).await })
            .buffered(self.config.user_threads)
            .try_collect()
            .await
    }

    /// No-op while the server is busy or deploying.
    pub async fn reboot_node(&self, id: &str) -> Result<()> {
        let node = self.get_node(id).await?;
        if let Some(state) = node.provisioning_state().filter(|s| s.is_transitional()) {
            debug!(node_id = %id, state = %state, "server is transitioning; skipping reboot");
            return Ok(());
        }

        let server = node.id().server_ref();
        let (dc_id, srv_id) = (server.datacenter_id.clone(), server.server_id.clone());
        self.provision(&server.datacenter_id, move |api| async move {
            api.reboot_server(&dc_id, &srv_id).await
        })
        .await?;
        info!(node_id = %id, "node rebooted");

        self.waiters.await_server_available(&server).await;
        Ok(())
    }

    /// No-op when the server is already running.
    pub async fn resume_node(&self, id: &str) -> Result<()> {
        let node = self.get_node(id).await?;
        if node.runtime_status() == Some(ServerRuntimeStatus::Running) {
            debug!(node_id = %id, "server already running");
            return Ok(());
        }

        let server = node.id().server_ref();
        let (dc_id, srv_id) = (server.datacenter_id.clone(), server.server_id.clone());
        self.provision(&server.datacenter_id, move |api| async move {
            api.start_server(&dc_id, &srv_id).await
        })
        .await?;
        info!(node_id = %id, "node resumed");

        self.waiters.await_server_running(&server).await;
        Ok(())
    }

    /// No-op when the server is already shut off. A soft SHUTDOWN still
    /// gets a hard stop, since only SHUTOFF ends billing.
    pub async fn suspend_node(&self, id: &str) -> Result<()> {
        let node = self.get_node(id).await?;
        if node.runtime_status() == Some(ServerRuntimeStatus::Shutoff) {
            debug!(node_id = %id, "server already shut off");
            return Ok(());
        }

        let server = node.id().server_ref();
        let (dc_id, srv_id) = (server.datacenter_id.clone(), server.server_id.clone());
        self.provision(&server.datacenter_id, move |api| async move {
            api.stop_server(&dc_id, &srv_id).await
        })
        .await?;
        info!(node_id = %id, "node suspended");

        self.waiters.await_server_suspended(&server).await;
        Ok(())
    }

    /// Best-effort delete of every attached volume and then the server.
    ///
    /// Individual delete failures are logged. Fails with
    /// [`Error::InvariantViolation`] if the server still exists afterwards.
    /// Unknown nodes are a no-op.
    pub async fn destroy_node(&self, id: &str) -> Result<()> {
        let node_id: DataCenterAndId = id.parse()?;
        let dc = &node_id.datacenter_id;

        let Some(server) = self.api.get_server(dc, &node_id.id).await? else {
            debug!(node_id = %id, "node already gone");
            return Ok(());
        };

        for volume in server.volumes() {
            self.destroy_volume(dc, &volume.id).await;
        }
        self.destroy_server(dc, &node_id.id).await;

        if !self.waiters.await_server_gone(&node_id.server_ref()).await {
            return Err(Error::InvariantViolation(format!(
                "server {id} still present after delete"
            )));
        }
        info!(node_id = %id, "node destroyed");
        Ok(())
    }

    // ── Best-effort cleanup ──────────────────────────────────────────

    async fn destroy_volume(&self, dc: &str, volume_id: &str) -> bool {
        let (dc_id, vol_id) = (dc.to_string(), volume_id.to_string());
        match self
            .provision(dc, move |api| async move { api.delete_volume(&dc_id, &vol_id).await })
            .await
        {
            Ok(()) => {
                debug!(datacenter_id = %dc, volume_id = %volume_id, "volume deleted");
                true
            }
            Err(e) => {
                warn!(datacenter_id = %dc, volume_id = %volume_id, error = %e, "failed to delete volume");
                false
            }
        }
    }

    async fn destroy_server(&self, dc: &str, server_id: &str) -> bool {
        let (dc_id, srv_id) = (dc.to_string(), server_id.to_string());
        match self
            .provision(dc, move |api| async move { api.delete_server(&dc_id, &srv_id).await })
            .await
        {
            Ok(()) => {
                debug!(datacenter_id = %dc, server_id = %server_id, "server deleted");
                true
            }
            Err(e) => {
                warn!(datacenter_id = %dc, server_id = %server_id, error = %e, "failed to delete server");
                false
            }
        }
    }

    async fn destroy_ip_block(&self, dc: &str, ip_block_id: &str) -> bool {
        let block_id = ip_block_id.to_string();
        match self
            .provision(dc, move |api| async move { api.delete_ip_block(&block_id).await })
            .await
        {
            Ok(()) => {
                debug!(ip_block_id = %ip_block_id, "ip block released");
                true
            }
            Err(e) => {
                warn!(ip_block_id = %ip_block_id, error = %e, "failed to release ip block");
                false
            }
        }
    }
}

/// Sorted, de-duplicated ports collapsed into inclusive contiguous ranges.
fn port_ranges(ports: &[u16]) -> Vec<(u16, u16)> {
    let mut sorted = ports.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<(u16, u16)> = Vec::new();
    for port in sorted {
        match ranges.last_mut() {
            Some((_, end)) if u32::from(*end) + 1 == u32::from(port) => *end = port,
            _ => ranges.push((port, port)),
        }
    }
    ranges
}
