use async_trait::async_trait;
use profitbricks_api::{
    CreateFirewallRuleRequest, CreateIpBlockRequest, CreateNicRequest, CreateServerRequest,
    CreateVolumeRequest, DataCenter, FirewallRule, Image, IpBlock, Nic, ProfitBricksClient, Server,
    Snapshot, Volume,
};

use crate::Result;

/// Remote resource operations the adapter depends on.
///
/// `get_*` methods return `Ok(None)` for absent resources. Deletes of absent
/// resources succeed.
#[async_trait]
pub trait CloudApi: Send + Sync + 'static {
    // ── Datacenters ──
    async fn list_datacenters(&self) -> Result<Vec<DataCenter>>;
    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<DataCenter>>;

    // ── Volumes ──
    async fn create_volume(&self, datacenter_id: &str, req: &CreateVolumeRequest) -> Result<Volume>;
    async fn get_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<Option<Volume>>;
    async fn delete_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<()>;

    // ── Servers ──
    async fn create_server(&self, datacenter_id: &str, req: &CreateServerRequest) -> Result<Server>;
    /// Server with its volumes and NICs expanded.
    async fn get_server(&self, datacenter_id: &str, server_id: &str) -> Result<Option<Server>>;
    async fn list_servers(&self, datacenter_id: &str) -> Result<Vec<Server>>;
    async fn delete_server(&self, datacenter_id: &str, server_id: &str) -> Result<()>;
    async fn attach_volume(&self, datacenter_id: &str, server_id: &str, volume_id: &str) -> Result<()>;
    async fn reboot_server(&self, datacenter_id: &str, server_id: &str) -> Result<()>;
    async fn start_server(&self, datacenter_id: &str, server_id: &str) -> Result<()>;
    async fn stop_server(&self, datacenter_id: &str, server_id: &str) -> Result<()>;

    // ── Networking ──
    async fn create_nic(&self, datacenter_id: &str, server_id: &str, req: &CreateNicRequest) -> Result<Nic>;
    async fn get_nic(&self, datacenter_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>>;
    async fn create_ip_block(&self, req: &CreateIpBlockRequest) -> Result<IpBlock>;
    async fn delete_ip_block(&self, ip_block_id: &str) -> Result<()>;
    async fn create_firewall_rule(
        &self,
        datacenter_id: &str,
        server_id: &str,
        nic_id: &str,
        req: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule>;

    // ── Images ──
    async fn list_images(&self) -> Result<Vec<Image>>;
    async fn get_image(&self, image_id: &str) -> Result<Option<Image>>;
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>>;
    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>>;
}

#[async_trait]
impl CloudApi for ProfitBricksClient {
    async fn list_datacenters(&self) -> Result<Vec<DataCenter>> {
        Ok(ProfitBricksClient::list_datacenters(self).await?)
    }

    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<DataCenter>> {
        Ok(ProfitBricksClient::get_datacenter(self, datacenter_id).await?)
    }

    async fn create_volume(&self, datacenter_id: &str, req: &CreateVolumeRequest) -> Result<Volume> {
        Ok(ProfitBricksClient::create_volume(self, datacenter_id, req).await?)
    }

    async fn get_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<Option<Volume>> {
        Ok(ProfitBricksClient::get_volume(self, datacenter_id, volume_id).await?)
    }

    async fn delete_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::delete_volume(self, datacenter_id, volume_id).await?)
    }

    async fn create_server(&self, datacenter_id: &str, req: &CreateServerRequest) -> Result<Server> {
        Ok(ProfitBricksClient::create_server(self, datacenter_id, req).await?)
    }

    async fn get_server(&self, datacenter_id: &str, server_id: &str) -> Result<Option<Server>> {
        Ok(ProfitBricksClient::get_server(self, datacenter_id, server_id).await?)
    }

    async fn list_servers(&self, datacenter_id: &str) -> Result<Vec<Server>> {
        Ok(ProfitBricksClient::list_servers(self, datacenter_id).await?)
    }

    async fn delete_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::delete_server(self, datacenter_id, server_id).await?)
    }

    async fn attach_volume(&self, datacenter_id: &str, server_id: &str, volume_id: &str) -> Result<()> {
        ProfitBricksClient::attach_volume(self, datacenter_id, server_id, volume_id).await?;
        Ok(())
    }

    async fn reboot_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::reboot_server(self, datacenter_id, server_id).await?)
    }

    async fn start_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::start_server(self, datacenter_id, server_id).await?)
    }

    async fn stop_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::stop_server(self, datacenter_id, server_id).await?)
    }

    async fn create_nic(&self, datacenter_id: &str, server_id: &str, req: &CreateNicRequest) -> Result<Nic> {
        Ok(ProfitBricksClient::create_nic(self, datacenter_id, server_id, req).await?)
    }

    async fn get_nic(&self, datacenter_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>> {
        Ok(ProfitBricksClient::get_nic(self, datacenter_id, server_id, nic_id).await?)
    }

    async fn create_ip_block(&self, req: &CreateIpBlockRequest) -> Result<IpBlock> {
        Ok(ProfitBricksClient::create_ip_block(self, req).await?)
    }

    async fn delete_ip_block(&self, ip_block_id: &str) -> Result<()> {
        Ok(ProfitBricksClient::delete_ip_block(self, ip_block_id).await?)
    }

    async fn create_firewall_rule(
        &self,
        datacenter_id: &str,
        server_id: &str,
        nic_id: &str,
        req: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule> {
        Ok(ProfitBricksClient::create_firewall_rule(self, datacenter_id, server_id, nic_id, req).await?)
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        Ok(ProfitBricksClient::list_images(self).await?)
    }

    async fn get_image(&self, image_id: &str) -> Result<Option<Image>> {
        Ok(ProfitBricksClient::get_image(self, image_id).await?)
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        Ok(ProfitBricksClient::list_snapshots(self).await?)
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>> {
        Ok(ProfitBricksClient::get_snapshot(self, snapshot_id).await?)
    }
}
