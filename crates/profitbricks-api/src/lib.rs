//! Typed Rust client for the ProfitBricks Cloud API (v4).
//!
//! Covers the subset needed to provision virtual machines:
//! datacenters, volumes, servers (incl. attach and power actions),
//! NICs, IP blocks, firewall rules, images and snapshots.

mod types;

pub use types::*;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;

pub const DEFAULT_ENDPOINT: &str = "https://api.profitbricks.com/cloudapi/v4";

/// Depth that returns a server together with its volumes and NICs.
const SERVER_DEPTH: u8 = 5;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("profitbricks api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("profitbricks api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the ProfitBricks Cloud REST API.
#[derive(Clone)]
pub struct ProfitBricksClient {
    endpoint: String,
    auth: String,
    http: reqwest::Client,
}

impl ProfitBricksClient {
    pub fn new(username: &str, password: &str) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, username, password)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, username: &str, password: &str) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth: format!("Basic {}", BASE64.encode(format!("{username}:{password}"))),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() && status.as_u16() != 404 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        depth: Option<u8>,
        endpoint: &'static str,
    ) -> Result<T> {
        let mut req = self.http.get(self.url(path)).header("Authorization", &self.auth);
        if let Some(depth) = depth {
            req = req.query(&[("depth", depth)]);
        }
        let resp = req.send().await?;

        Self::check(resp, endpoint).await?.json().await.map_err(Error::from)
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        depth: Option<u8>,
        endpoint: &'static str,
    ) -> Result<Option<T>> {
        let mut req = self.http.get(self.url(path)).header("Authorization", &self.auth);
        if let Some(depth) = depth {
            req = req.query(&[("depth", depth)]);
        }
        let resp = req.send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }

        Self::check(resp, endpoint)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(Error::from)
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        endpoint: &'static str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .header("Authorization", &self.auth)
            .json(body)
            .send()
            .await?;

        Self::check(resp, endpoint).await?.json().await.map_err(Error::from)
    }

    /// POST to a server action endpoint (`reboot`, `start`, `stop`).
    async fn post_action(&self, path: &str, endpoint: &'static str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(path))
            .header("Authorization", &self.auth)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;

        Self::check(resp, endpoint).await?;
        Ok(())
    }

    async fn delete(&self, path: &str, endpoint: &'static str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(path))
            .header("Authorization", &self.auth)
            .send()
            .await?;

        Self::check_allow_404(resp, endpoint).await?;
        Ok(())
    }

    // ── Datacenters ──────────────────────────────────────────────────

    pub async fn list_datacenters(&self) -> Result<Vec<DataCenter>> {
        let list: Collection<DataCenter> = self
            .get_json("/datacenters", Some(1), "list datacenters")
            .await?;
        Ok(list.items)
    }

    pub async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<DataCenter>> {
        self.get_optional(&format!("/datacenters/{datacenter_id}"), Some(1), "get datacenter")
            .await
    }

    // ── Volumes ──────────────────────────────────────────────────────

    pub async fn create_volume(&self, datacenter_id: &str, req: &CreateVolumeRequest) -> Result<Volume> {
        self.post_json(&format!("/datacenters/{datacenter_id}/volumes"), req, "create volume")
            .await
    }

    pub async fn get_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<Option<Volume>> {
        self.get_optional(
            &format!("/datacenters/{datacenter_id}/volumes/{volume_id}"),
            None,
            "get volume",
        )
        .await
    }

    pub async fn delete_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<()> {
        self.delete(&format!("/datacenters/{datacenter_id}/volumes/{volume_id}"), "delete volume")
            .await
    }

    // ── Servers ──────────────────────────────────────────────────────

    pub async fn create_server(&self, datacenter_id: &str, req: &CreateServerRequest) -> Result<Server> {
        self.post_json(&format!("/datacenters/{datacenter_id}/servers"), req, "create server")
            .await
    }

    /// Fetch a server with its attached volumes and NICs.
    pub async fn get_server(&self, datacenter_id: &str, server_id: &str) -> Result<Option<Server>> {
        self.get_optional(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}"),
            Some(SERVER_DEPTH),
            "get server",
        )
        .await
    }

    pub async fn list_servers(&self, datacenter_id: &str) -> Result<Vec<Server>> {
        let list: Collection<Server> = self
            .get_json(
                &format!("/datacenters/{datacenter_id}/servers"),
                Some(SERVER_DEPTH),
                "list servers",
            )
            .await?;
        Ok(list.items)
    }

    pub async fn delete_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.delete(&format!("/datacenters/{datacenter_id}/servers/{server_id}"), "delete server")
            .await
    }

    pub async fn attach_volume(&self, datacenter_id: &str, server_id: &str, volume_id: &str) -> Result<Volume> {
        self.post_json(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/volumes"),
            &IdRef { id: volume_id.to_string() },
            "attach volume",
        )
        .await
    }

    pub async fn reboot_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.post_action(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/reboot"),
            "reboot server",
        )
        .await
    }

    pub async fn start_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.post_action(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/start"),
            "start server",
        )
        .await
    }

    pub async fn stop_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.post_action(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/stop"),
            "stop server",
        )
        .await
    }

    // ── NICs ─────────────────────────────────────────────────────────

    pub async fn create_nic(&self, datacenter_id: &str, server_id: &str, req: &CreateNicRequest) -> Result<Nic> {
        self.post_json(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/nics"),
            req,
            "create nic",
        )
        .await
    }

    pub async fn get_nic(&self, datacenter_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>> {
        self.get_optional(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/nics/{nic_id}"),
            None,
            "get nic",
        )
        .await
    }

    // ── IP blocks ────────────────────────────────────────────────────

    pub async fn create_ip_block(&self, req: &CreateIpBlockRequest) -> Result<IpBlock> {
        self.post_json("/ipblocks", req, "create ip block").await
    }

    pub async fn delete_ip_block(&self, ip_block_id: &str) -> Result<()> {
        self.delete(&format!("/ipblocks/{ip_block_id}"), "delete ip block").await
    }

    // ── Firewall rules ───────────────────────────────────────────────

    pub async fn create_firewall_rule(
        &self,
        datacenter_id: &str,
        server_id: &str,
        nic_id: &str,
        req: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule> {
        self.post_json(
            &format!("/datacenters/{datacenter_id}/servers/{server_id}/nics/{nic_id}/firewallrules"),
            req,
            "create firewall rule",
        )
        .await
    }

    pub async fn list_firewall_rules(
        &self,
        datacenter_id: &str,
        server_id: &str,
        nic_id: &str,
    ) -> Result<Vec<FirewallRule>> {
        let list: Collection<FirewallRule> = self
            .get_json(
                &format!("/datacenters/{datacenter_id}/servers/{server_id}/nics/{nic_id}/firewallrules"),
                Some(1),
                "list firewall rules",
            )
            .await?;
        Ok(list.items)
    }

    // ── Images and snapshots ─────────────────────────────────────────

    pub async fn list_images(&self) -> Result<Vec<Image>> {
        let list: Collection<Image> = self.get_json("/images", Some(1), "list images").await?;
        Ok(list.items)
    }

    pub async fn get_image(&self, image_id: &str) -> Result<Option<Image>> {
        self.get_optional(&format!("/images/{image_id}"), None, "get image")
            .await
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let list: Collection<Snapshot> = self
            .get_json("/snapshots", Some(1), "list snapshots")
            .await?;
        Ok(list.items)
    }

    pub async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>> {
        self.get_optional(&format!("/snapshots/{snapshot_id}"), None, "get snapshot")
            .await
    }
}
