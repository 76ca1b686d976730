use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Shared envelope types ────────────────────────────────────────────

/// Provisioning state reported in every resource's `metadata.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Available,
    Busy,
    Inactive,
    Deploying,
    Failed,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub state: Option<State>,
}

/// `{"items": [...]}` wrapper used by list endpoints and nested entities.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// Reference to another resource by id, as used in request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenceType {
    Windows,
    Windows2016,
    Linux,
    Other,
    Unknown,
    #[serde(other)]
    Unrecognized,
}

// ── Datacenters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DataCenter {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: DataCenterProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataCenterProperties {
    pub name: Option<String>,
    /// Region the datacenter lives in, e.g. `de/fra`.
    pub location: Option<String>,
    pub description: Option<String>,
    pub version: Option<i64>,
}

// ── Volumes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeType {
    Hdd,
    Ssd,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: VolumeProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProperties {
    pub name: Option<String>,
    pub size: Option<f32>,
    #[serde(rename = "type")]
    pub volume_type: Option<VolumeType>,
    pub image: Option<String>,
    pub licence_type: Option<LicenceType>,
    pub bus: Option<String>,
    pub device_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub properties: CreateVolumeProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeProperties {
    pub name: String,
    pub size: f32,
    #[serde(rename = "type")]
    pub volume_type: VolumeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licence_type: Option<LicenceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<Vec<String>>,
}

// ── Servers ──────────────────────────────────────────────────────────

/// Power state of a virtual machine (`properties.vmState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmState {
    Running,
    Shutoff,
    Shutdown,
    Paused,
    Blocked,
    Crashed,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: ServerProperties,
    #[serde(default)]
    pub entities: Option<ServerEntities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProperties {
    pub name: Option<String>,
    pub cores: Option<u32>,
    pub ram: Option<u32>,
    pub availability_zone: Option<String>,
    pub vm_state: Option<VmState>,
    pub boot_volume: Option<Volume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerEntities {
    #[serde(default)]
    pub volumes: Option<Collection<Volume>>,
    #[serde(default)]
    pub nics: Option<Collection<Nic>>,
}

impl Server {
    /// Volumes attached to the server, empty unless fetched with depth.
    pub fn volumes(&self) -> &[Volume] {
        self.entities
            .as_ref()
            .and_then(|e| e.volumes.as_ref())
            .map(|c| c.items.as_slice())
            .unwrap_or_default()
    }

    /// NICs attached to the server, empty unless fetched with depth.
    pub fn nics(&self) -> &[Nic] {
        self.entities
            .as_ref()
            .and_then(|e| e.nics.as_ref())
            .map(|c| c.items.as_slice())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Option<State> {
        self.metadata.as_ref().and_then(|m| m.state)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub properties: CreateServerProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerProperties {
    pub name: String,
    pub cores: u32,
    pub ram: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_volume: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

// ── NICs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Nic {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: NicProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    pub name: Option<String>,
    pub mac: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    pub dhcp: Option<bool>,
    pub lan: Option<u32>,
    pub firewall_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateNicRequest {
    pub properties: CreateNicProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNicProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ips: Vec<String>,
    pub dhcp: bool,
    pub lan: u32,
    pub firewall_active: bool,
}

// ── IP blocks ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IpBlock {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: IpBlockProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpBlockProperties {
    pub name: Option<String>,
    pub location: Option<String>,
    pub size: Option<u32>,
    #[serde(default)]
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpBlockRequest {
    pub properties: CreateIpBlockProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIpBlockProperties {
    pub name: String,
    pub location: String,
    pub size: u32,
}

// ── Firewall rules ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: FirewallRuleProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleProperties {
    pub name: Option<String>,
    pub protocol: Option<String>,
    pub source_ip: Option<String>,
    pub port_range_start: Option<u16>,
    pub port_range_end: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFirewallRuleRequest {
    pub properties: CreateFirewallRuleProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFirewallRuleProperties {
    pub name: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub port_range_start: u16,
    pub port_range_end: u16,
}

// ── Images and snapshots ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    Hdd,
    Cdrom,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: ImageProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProperties {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub size: Option<f32>,
    pub licence_type: Option<LicenceType>,
    pub image_type: Option<ImageType>,
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub properties: SnapshotProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProperties {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub size: Option<f32>,
    pub licence_type: Option<LicenceType>,
}
