use std::fmt;
use std::str::FromStr;

use profitbricks_api::{Image, Server, Snapshot, State, VmState};
use serde::Serialize;

use crate::hardware::Hardware;
use crate::{CreateStage, Error, Result};

// ── Resource references ──────────────────────────────────────────────

/// `(datacenter, volume)` key used for polling and job routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeRef {
    pub datacenter_id: String,
    pub volume_id: String,
}

impl VolumeRef {
    pub fn new(datacenter_id: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            datacenter_id: datacenter_id.into(),
            volume_id: volume_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerRef {
    pub datacenter_id: String,
    pub server_id: String,
}

impl ServerRef {
    pub fn new(datacenter_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            datacenter_id: datacenter_id.into(),
            server_id: server_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NicRef {
    pub datacenter_id: String,
    pub server_id: String,
    pub nic_id: String,
}

impl NicRef {
    pub fn new(
        datacenter_id: impl Into<String>,
        server_id: impl Into<String>,
        nic_id: impl Into<String>,
    ) -> Self {
        Self {
            datacenter_id: datacenter_id.into(),
            server_id: server_id.into(),
            nic_id: nic_id.into(),
        }
    }
}

/// Any resource whose provisioning state can be polled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    DataCenter(String),
    Volume(VolumeRef),
    Server(ServerRef),
    Nic(NicRef),
    Snapshot(String),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataCenter(id) => write!(f, "datacenter {id}"),
            Self::Volume(r) => write!(f, "volume {}/{}", r.datacenter_id, r.volume_id),
            Self::Server(r) => write!(f, "server {}/{}", r.datacenter_id, r.server_id),
            Self::Nic(r) => write!(f, "nic {}/{}/{}", r.datacenter_id, r.server_id, r.nic_id),
            Self::Snapshot(id) => write!(f, "snapshot {id}"),
        }
    }
}

impl From<VolumeRef> for ResourceRef {
    fn from(r: VolumeRef) -> Self {
        Self::Volume(r)
    }
}

impl From<ServerRef> for ResourceRef {
    fn from(r: ServerRef) -> Self {
        Self::Server(r)
    }
}

impl From<NicRef> for ResourceRef {
    fn from(r: NicRef) -> Self {
        Self::Nic(r)
    }
}

/// External node id: `<datacenterId>/<serverId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataCenterAndId {
    pub datacenter_id: String,
    pub id: String,
}

impl DataCenterAndId {
    pub fn new(datacenter_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            datacenter_id: datacenter_id.into(),
            id: id.into(),
        }
    }

    pub fn slash_encode(&self) -> String {
        self.to_string()
    }

    pub fn server_ref(&self) -> ServerRef {
        ServerRef::new(&self.datacenter_id, &self.id)
    }
}

impl fmt::Display for DataCenterAndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.datacenter_id, self.id)
    }
}

impl FromStr for DataCenterAndId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((dc, id)) if !dc.is_empty() && !id.is_empty() && !id.contains('/') => {
                Ok(Self::new(dc, id))
            }
            _ => Err(Error::InvalidId(format!(
                "expected <datacenterId>/<serverId>, got {s:?}"
            ))),
        }
    }
}

// ── States ───────────────────────────────────────────────────────────

/// Normalized provisioning state of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    Available,
    Busy,
    Inactive,
    Deploying,
    Failed,
    Unrecognized,
}

impl ProvisioningState {
    /// Busy or deploying: the backend is still applying a change.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Busy | Self::Deploying)
    }
}

impl From<State> for ProvisioningState {
    fn from(state: State) -> Self {
        match state {
            State::Available => Self::Available,
            State::Busy => Self::Busy,
            State::Inactive => Self::Inactive,
            State::Deploying => Self::Deploying,
            State::Failed => Self::Failed,
            State::Unrecognized => Self::Unrecognized,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "AVAILABLE",
            Self::Busy => "BUSY",
            Self::Inactive => "INACTIVE",
            Self::Deploying => "DEPLOYING",
            Self::Failed => "FAILED",
            Self::Unrecognized => "UNRECOGNIZED",
        };
        f.write_str(s)
    }
}

/// Power state of a server, orthogonal to its provisioning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerRuntimeStatus {
    Running,
    Shutoff,
    Shutdown,
    Paused,
    Blocked,
    Crashed,
    Unrecognized,
}

impl From<VmState> for ServerRuntimeStatus {
    fn from(state: VmState) -> Self {
        match state {
            VmState::Running => Self::Running,
            VmState::Shutoff => Self::Shutoff,
            VmState::Shutdown => Self::Shutdown,
            VmState::Paused => Self::Paused,
            VmState::Blocked => Self::Blocked,
            VmState::Crashed => Self::Crashed,
            VmState::Unrecognized => Self::Unrecognized,
        }
    }
}

// ── Nodes ────────────────────────────────────────────────────────────

/// A server together with the datacenter it lives in.
#[derive(Debug, Clone)]
pub struct ServerInDataCenter {
    pub server: Server,
    pub datacenter_id: String,
}

impl ServerInDataCenter {
    pub fn new(server: Server, datacenter_id: impl Into<String>) -> Self {
        Self {
            server,
            datacenter_id: datacenter_id.into(),
        }
    }

    pub fn id(&self) -> DataCenterAndId {
        DataCenterAndId::new(&self.datacenter_id, &self.server.id)
    }

    pub fn slash_encode(&self) -> String {
        self.id().slash_encode()
    }

    pub fn provisioning_state(&self) -> Option<ProvisioningState> {
        self.server.state().map(ProvisioningState::from)
    }

    pub fn runtime_status(&self) -> Option<ServerRuntimeStatus> {
        self.server.properties.vm_state.map(ServerRuntimeStatus::from)
    }
}

/// Something a boot volume can be created from.
#[derive(Debug, Clone)]
pub enum Provisionable {
    Image(Image),
    Snapshot(Snapshot),
}

impl Provisionable {
    pub fn id(&self) -> &str {
        match self {
            Self::Image(i) => &i.id,
            Self::Snapshot(s) => &s.id,
        }
    }
}

// ── Create request and result ────────────────────────────────────────

/// Where to place a new node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLocation {
    /// Datacenter id.
    pub id: String,
    /// Region of the datacenter (e.g. `de/fra`), looked up when absent.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    pub login_user: Option<String>,
    pub login_password: Option<String>,
    pub login_private_key: Option<String>,
    /// LAN ids; only the first is used.
    pub networks: Vec<String>,
    pub inbound_ports: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub location: TemplateLocation,
    pub image_id: String,
    pub hardware: Hardware,
    pub options: TemplateOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
    pub user: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// A non-critical step that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    pub stage: CreateStage,
    pub resource_id: Option<String>,
    pub reason: String,
}

/// Result of a completed create-node workflow.
#[derive(Debug, Clone)]
pub struct NodeAndInitialCredentials {
    pub node: ServerInDataCenter,
    /// Slash-encoded `<datacenterId>/<serverId>`.
    pub id: String,
    pub credentials: LoginCredentials,
    pub skipped: Vec<PartialFailure>,
}
