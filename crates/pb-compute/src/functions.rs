//! Mapping from backend resources to the provider-neutral node, image and
//! location descriptions.

use std::net::IpAddr;

use profitbricks_api::{DataCenter, Image, ImageType, LicenceType, Snapshot, State, VmState};
use serde::Serialize;

use crate::hardware::format_id;
use crate::types::{Provisionable, ServerInDataCenter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    Ubuntu,
    Debian,
    Centos,
    Fedora,
    Rhel,
    Opensuse,
    Suse,
    Coreos,
    Unrecognized,
}

impl OsFamily {
    /// Families recognised by name, most specific first.
    const NAMED: [OsFamily; 10] = [
        Self::Windows,
        Self::Ubuntu,
        Self::Debian,
        Self::Centos,
        Self::Fedora,
        Self::Rhel,
        Self::Opensuse,
        Self::Suse,
        Self::Coreos,
        Self::Linux,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::Centos => "centos",
            Self::Fedora => "fedora",
            Self::Rhel => "rhel",
            Self::Opensuse => "opensuse",
            Self::Suse => "suse",
            Self::Coreos => "coreos",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn from_value(s: &str) -> Option<Self> {
        Self::NAMED.into_iter().find(|f| f.value().eq_ignore_ascii_case(s))
    }

    fn from_licence(licence: Option<LicenceType>) -> Self {
        match licence {
            Some(LicenceType::Windows | LicenceType::Windows2016) => Self::Windows,
            Some(LicenceType::Linux) => Self::Linux,
            _ => Self::Unrecognized,
        }
    }
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Running,
    Suspended,
    Pending,
    Error,
    Unrecognized,
}

impl From<Option<VmState>> for NodeStatus {
    fn from(state: Option<VmState>) -> Self {
        match state {
            Some(VmState::Running) => Self::Running,
            Some(VmState::Shutoff | VmState::Shutdown | VmState::Paused) => Self::Suspended,
            Some(VmState::Blocked) => Self::Pending,
            Some(VmState::Crashed) => Self::Error,
            Some(VmState::Unrecognized) | None => Self::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetadata {
    /// Slash-encoded `<datacenterId>/<serverId>`.
    pub id: String,
    pub name: Option<String>,
    pub group: Option<String>,
    pub location_id: String,
    pub backend_status: Option<String>,
    pub status: NodeStatus,
    pub hardware_id: String,
    pub cores: u32,
    pub ram_mb: u32,
    pub volume_ids: Vec<String>,
    pub os_family: OsFamily,
    pub private_addresses: Vec<String>,
    pub public_addresses: Vec<String>,
}

pub fn node_metadata(node: &ServerInDataCenter) -> NodeMetadata {
    let server = &node.server;
    let props = &server.properties;

    let cores = props.cores.unwrap_or_default();
    let ram_mb = props.ram.unwrap_or_default();
    let disk: f32 = server.volumes().iter().filter_map(|v| v.properties.size).sum();

    let os_family = props
        .boot_volume
        .as_ref()
        .map(|v| OsFamily::from_licence(v.properties.licence_type))
        .unwrap_or(OsFamily::Unrecognized);

    let (private_addresses, public_addresses): (Vec<String>, Vec<String>) = server
        .nics()
        .iter()
        .flat_map(|nic| nic.properties.ips.iter().cloned())
        .partition(|ip| is_private_address(ip));

    NodeMetadata {
        id: node.slash_encode(),
        name: props.name.clone(),
        group: props.name.as_deref().and_then(extract_group),
        location_id: node.datacenter_id.clone(),
        backend_status: node.provisioning_state().map(|s| s.to_string()),
        status: NodeStatus::from(props.vm_state),
        hardware_id: format_id(cores, ram_mb, disk.round() as u32),
        cores,
        ram_mb,
        volume_ids: server.volumes().iter().map(|v| v.id.clone()).collect(),
        os_family,
        private_addresses,
        public_addresses,
    }
}

/// `web-3f2a` -> `web`. Names without a `-` carry no group.
pub fn extract_group(name: &str) -> Option<String> {
    name.rsplit_once('-')
        .map(|(group, _)| group)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
}

fn is_private_address(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        Err(_) => false,
    }
}

// ── Images ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageStatus {
    Available,
    Pending,
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Image,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub id: String,
    pub kind: ImageKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: ImageStatus,
    pub os_family: OsFamily,
    pub os_version: String,
    pub is_64bit: bool,
}

pub fn image_metadata(provisionable: &Provisionable) -> ImageMetadata {
    match provisionable {
        Provisionable::Image(image) => from_image(image),
        Provisionable::Snapshot(snapshot) => from_snapshot(snapshot),
    }
}

// Image names look like `<os>-<version>-<subversion>-...-<date>`.
fn from_image(image: &Image) -> ImageMetadata {
    let props = &image.properties;
    let name = props.name.as_deref();

    let os_family = name
        .and_then(|n| n.split('-').next())
        .and_then(OsFamily::from_value)
        .unwrap_or_else(|| OsFamily::from_licence(props.licence_type));

    let is_64bit = match (props.image_type, name) {
        (Some(ImageType::Cdrom), Some(n)) if !n.is_empty() => {
            let n = n.to_ascii_lowercase();
            n.contains("x86_64") || n.contains("amd64")
        }
        _ => true,
    };

    ImageMetadata {
        id: image.id.clone(),
        kind: ImageKind::Image,
        name: props.name.clone(),
        description: props.description.clone(),
        location: props.location.clone(),
        status: ImageStatus::Available,
        os_family,
        os_version: name.map(parse_version).unwrap_or_default(),
        is_64bit,
    }
}

fn parse_version(name: &str) -> String {
    name.to_ascii_lowercase()
        .split('-')
        .skip(1)
        .find(|token| token.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .unwrap_or_default()
}

fn from_snapshot(snapshot: &Snapshot) -> ImageMetadata {
    let props = &snapshot.properties;
    let text = format!(
        "{}{}",
        props.name.as_deref().unwrap_or_default(),
        props.description.as_deref().unwrap_or_default()
    )
    .to_ascii_lowercase();

    let os_family = OsFamily::NAMED
        .into_iter()
        .find(|f| text.contains(f.value()))
        .unwrap_or_else(|| OsFamily::from_licence(props.licence_type));

    let status = match snapshot.metadata.as_ref().and_then(|m| m.state) {
        Some(State::Available) => ImageStatus::Available,
        Some(State::Busy | State::Inactive) => ImageStatus::Pending,
        _ => ImageStatus::Unrecognized,
    };

    ImageMetadata {
        id: snapshot.id.clone(),
        kind: ImageKind::Snapshot,
        name: props.name.clone(),
        description: props.description.clone(),
        location: props.location.clone(),
        status,
        os_family,
        os_version: "00.00".into(),
        is_64bit: true,
    }
}

// ── Locations ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Datacenter id.
    pub id: String,
    pub description: Option<String>,
    /// Region the datacenter belongs to, e.g. `us/las`.
    pub parent_region: Option<String>,
}

pub fn location(dc: &DataCenter) -> Location {
    Location {
        id: dc.id.clone(),
        description: dc.properties.name.clone(),
        parent_region: dc.properties.location.clone(),
    }
}
