use pb_compute::functions::NodeMetadata;
use pb_compute::hardware::Hardware;
use pb_compute::types::{LoginCredentials, PartialFailure};
use serde::{Deserialize, Serialize};

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub group: String,
    pub name: Option<String>,
    pub location_id: String,
    pub image_id: String,
    pub hardware_id: String,
    #[serde(default)]
    pub extra_volumes_gb: Vec<u32>,
    pub login_user: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub inbound_ports: Vec<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ListNodesQuery {
    /// Comma-separated `<datacenterId>/<serverId>` ids.
    pub ids: Option<String>,
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HardwareResponse {
    pub id: String,
    pub cores: u32,
    pub ram_mb: u32,
    pub volumes_gb: Vec<u32>,
}

impl From<Hardware> for HardwareResponse {
    fn from(h: Hardware) -> Self {
        Self {
            id: h.id(),
            cores: h.cores,
            ram_mb: h.ram_mb,
            volumes_gb: h.volumes_gb,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedNodeResponse {
    pub node: NodeMetadata,
    pub credentials: LoginCredentials,
    pub skipped: Vec<PartialFailure>,
}
