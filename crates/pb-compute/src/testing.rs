//! In-memory `CloudApi` with failure injection and a call log.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use profitbricks_api::{
    Collection, CreateFirewallRuleRequest, CreateIpBlockRequest, CreateNicRequest,
    CreateServerRequest, CreateVolumeRequest, DataCenter, DataCenterProperties, FirewallRule,
    FirewallRuleProperties, Image, ImageProperties, ImageType, IpBlock, IpBlockProperties,
    LicenceType, Metadata, Nic, NicProperties, Server, ServerEntities, ServerProperties, Snapshot,
    SnapshotProperties, State, VmState, Volume, VolumeProperties,
};

use crate::client::CloudApi;
use crate::{Error, Result};

#[derive(Clone)]
struct FakeVolume {
    name: String,
    size: f32,
    state: State,
    licence: Option<LicenceType>,
}

#[derive(Clone)]
struct FakeNic {
    id: String,
    ips: Vec<String>,
    lan: u32,
    firewall_active: bool,
    rules: Vec<(u16, u16)>,
}

#[derive(Clone)]
struct FakeServer {
    name: String,
    cores: u32,
    ram: u32,
    state: State,
    vm_state: VmState,
    volumes: Vec<String>,
    nics: Vec<FakeNic>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    datacenters: BTreeMap<String, String>,
    volumes: HashMap<(String, String), FakeVolume>,
    servers: BTreeMap<(String, String), FakeServer>,
    ip_blocks: HashMap<String, Vec<String>>,
    images: Vec<Image>,
    snapshots: Vec<Snapshot>,
    log: Vec<String>,
    counters: HashMap<&'static str, usize>,
    failures: HashSet<(&'static str, usize)>,
    ignore_server_deletes: bool,
    busy_after_attach: bool,
    in_flight: HashMap<String, usize>,
    overlapping_mutations: usize,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Counts the call and reports whether it should fail.
    fn record(&mut self, op: &'static str, detail: String) -> Option<Error> {
        self.log.push(format!("{op} {detail}"));
        let n = {
            let counter = self.counters.entry(op).or_default();
            *counter += 1;
            *counter
        };
        self.failures
            .contains(&(op, n))
            .then(|| Error::Backend(format!("injected failure: {op} #{n}")))
    }

    fn volume(&self, dc: &str, id: &str) -> Option<Volume> {
        self.volumes.get(&(dc.to_string(), id.to_string())).map(|v| Volume {
            id: id.to_string(),
            metadata: Some(metadata(v.state)),
            properties: VolumeProperties {
                name: Some(v.name.clone()),
                size: Some(v.size),
                licence_type: v.licence,
                ..Default::default()
            },
        })
    }

    fn server(&self, dc: &str, id: &str) -> Option<Server> {
        let s = self.servers.get(&(dc.to_string(), id.to_string()))?;
        let volumes: Vec<Volume> = s.volumes.iter().filter_map(|v| self.volume(dc, v)).collect();
        let nics = s
            .nics
            .iter()
            .map(|n| Nic {
                id: n.id.clone(),
                metadata: Some(metadata(State::Available)),
                properties: NicProperties {
                    ips: n.ips.clone(),
                    lan: Some(n.lan),
                    firewall_active: Some(n.firewall_active),
                    ..Default::default()
                },
            })
            .collect();

        Some(Server {
            id: id.to_string(),
            metadata: Some(metadata(s.state)),
            properties: ServerProperties {
                name: Some(s.name.clone()),
                cores: Some(s.cores),
                ram: Some(s.ram),
                vm_state: Some(s.vm_state),
                boot_volume: volumes.first().cloned(),
                ..Default::default()
            },
            entities: Some(ServerEntities {
                volumes: Some(Collection { items: volumes }),
                nics: Some(Collection { items: nics }),
            }),
        })
    }

    fn server_mut(&mut self, dc: &str, id: &str) -> Result<&mut FakeServer> {
        self.servers
            .get_mut(&(dc.to_string(), id.to_string()))
            .ok_or_else(|| Error::Backend(format!("no server {dc}/{id}")))
    }
}

fn metadata(state: State) -> Metadata {
    Metadata {
        state: Some(state),
        ..Default::default()
    }
}

pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    // ── Seeding ──

    pub fn add_datacenter(&self, region: &str) -> String {
        let mut s = self.lock();
        let id = s.id("dc");
        s.datacenters.insert(id.clone(), region.to_string());
        id
    }

    pub fn add_volume(&self, dc: &str, size: f32, state: State) -> String {
        let mut s = self.lock();
        let id = s.id("vol");
        s.volumes.insert(
            (dc.to_string(), id.clone()),
            FakeVolume {
                name: id.clone(),
                size,
                state,
                licence: None,
            },
        );
        id
    }

    pub fn add_server(&self, dc: &str, name: &str, vm_state: VmState, volumes: &[String]) -> String {
        let mut s = self.lock();
        let id = s.id("srv");
        s.servers.insert(
            (dc.to_string(), id.clone()),
            FakeServer {
                name: name.to_string(),
                cores: 1,
                ram: 1024,
                state: State::Available,
                vm_state,
                volumes: volumes.to_vec(),
                nics: Vec::new(),
            },
        );
        id
    }

    pub fn add_image(&self, name: &str, image_type: ImageType) -> String {
        let mut s = self.lock();
        let id = s.id("img");
        s.images.push(Image {
            id: id.clone(),
            metadata: Some(metadata(State::Available)),
            properties: ImageProperties {
                name: Some(name.to_string()),
                image_type: Some(image_type),
                licence_type: Some(LicenceType::Linux),
                ..Default::default()
            },
        });
        id
    }

    pub fn add_snapshot(&self, name: &str, state: State) -> String {
        let mut s = self.lock();
        let id = s.id("snap");
        s.snapshots.push(Snapshot {
            id: id.clone(),
            metadata: Some(metadata(state)),
            properties: SnapshotProperties {
                name: Some(name.to_string()),
                ..Default::default()
            },
        });
        id
    }

    pub fn set_volume_state(&self, dc: &str, id: &str, state: State) {
        if let Some(v) = self.lock().volumes.get_mut(&(dc.to_string(), id.to_string())) {
            v.state = state;
        }
    }

    pub fn set_server_state(&self, dc: &str, id: &str, state: State) {
        if let Some(srv) = self.lock().servers.get_mut(&(dc.to_string(), id.to_string())) {
            srv.state = state;
        }
    }

    pub fn set_vm_state(&self, dc: &str, id: &str, vm_state: VmState) {
        if let Some(srv) = self.lock().servers.get_mut(&(dc.to_string(), id.to_string())) {
            srv.vm_state = vm_state;
        }
    }

    // ── Failure injection ──

    /// Fail the `nth` (1-based) call to `op`.
    pub fn fail_call(&self, op: &'static str, nth: usize) {
        self.lock().failures.insert((op, nth));
    }

    /// Server deletes report success but leave the server in place.
    pub fn ignore_server_deletes(&self) {
        self.lock().ignore_server_deletes = true;
    }

    /// Attaching a volume leaves the server BUSY.
    pub fn busy_after_attach(&self) {
        self.lock().busy_after_attach = true;
    }

    // ── Inspection ──

    pub fn calls(&self, op: &str) -> usize {
        let prefix = format!("{op} ");
        self.lock().log.iter().filter(|l| l.starts_with(&prefix)).count()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn volume_ids(&self, dc: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .lock()
            .volumes
            .keys()
            .filter(|(d, _)| d == dc)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn server_count(&self) -> usize {
        self.lock().servers.len()
    }

    pub fn ip_block_count(&self) -> usize {
        self.lock().ip_blocks.len()
    }

    pub fn firewall_rules(&self, dc: &str, server_id: &str) -> Vec<(u16, u16)> {
        self.lock()
            .servers
            .get(&(dc.to_string(), server_id.to_string()))
            .map(|s| s.nics.iter().flat_map(|n| n.rules.clone()).collect())
            .unwrap_or_default()
    }

    /// Mutations that overlapped another mutation on the same datacenter.
    pub fn overlapping_mutations(&self) -> usize {
        self.lock().overlapping_mutations
    }

    // ── Call plumbing ──

    async fn read<T>(
        &self,
        op: &'static str,
        detail: String,
        f: impl FnOnce(&mut FakeState) -> Result<T>,
    ) -> Result<T> {
        let mut s = self.lock();
        if let Some(e) = s.record(op, detail) {
            return Err(e);
        }
        f(&mut s)
    }

    /// Mutation on `dc`. Yields midway so overlapping calls are observable.
    async fn mutate<T>(
        &self,
        op: &'static str,
        dc: &str,
        detail: String,
        f: impl FnOnce(&mut FakeState) -> Result<T>,
    ) -> Result<T> {
        let injected = {
            let mut s = self.lock();
            let injected = s.record(op, detail);
            let busy = {
                let n = s.in_flight.entry(dc.to_string()).or_default();
                *n += 1;
                *n
            };
            if busy > 1 {
                s.overlapping_mutations += 1;
            }
            injected
        };

        tokio::task::yield_now().await;

        let mut s = self.lock();
        if let Some(n) = s.in_flight.get_mut(dc) {
            *n -= 1;
        }
        match injected {
            Some(e) => Err(e),
            None => f(&mut s),
        }
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn list_datacenters(&self) -> Result<Vec<DataCenter>> {
        self.read("list_datacenters", String::new(), |s| {
            Ok(s.datacenters
                .keys()
                .map(|id| DataCenter {
                    id: id.clone(),
                    metadata: None,
                    properties: DataCenterProperties::default(),
                })
                .collect())
        })
        .await
    }

    async fn get_datacenter(&self, datacenter_id: &str) -> Result<Option<DataCenter>> {
        self.read("get_datacenter", datacenter_id.to_string(), |s| {
            Ok(s.datacenters.get(datacenter_id).map(|region| DataCenter {
                id: datacenter_id.to_string(),
                metadata: Some(metadata(State::Available)),
                properties: DataCenterProperties {
                    name: Some(format!("{datacenter_id} name")),
                    location: Some(region.clone()),
                    ..Default::default()
                },
            }))
        })
        .await
    }

    async fn create_volume(&self, datacenter_id: &str, req: &CreateVolumeRequest) -> Result<Volume> {
        self.mutate("create_volume", datacenter_id, datacenter_id.to_string(), |s| {
            let id = s.id("vol");
            let key = (datacenter_id.to_string(), id.clone());
            s.volumes.insert(
                key,
                FakeVolume {
                    name: req.properties.name.clone(),
                    size: req.properties.size,
                    state: State::Available,
                    licence: req.properties.image.as_ref().map(|_| LicenceType::Linux),
                },
            );
            s.volume(datacenter_id, &id)
                .ok_or_else(|| Error::Backend("volume vanished".into()))
        })
        .await
    }

    async fn get_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<Option<Volume>> {
        self.read("get_volume", format!("{datacenter_id}/{volume_id}"), |s| {
            Ok(s.volume(datacenter_id, volume_id))
        })
        .await
    }

    async fn delete_volume(&self, datacenter_id: &str, volume_id: &str) -> Result<()> {
        self.mutate("delete_volume", datacenter_id, format!("{datacenter_id}/{volume_id}"), |s| {
            s.volumes.remove(&(datacenter_id.to_string(), volume_id.to_string()));
            for srv in s.servers.values_mut() {
                srv.volumes.retain(|v| v != volume_id);
            }
            Ok(())
        })
        .await
    }

    async fn create_server(&self, datacenter_id: &str, req: &CreateServerRequest) -> Result<Server> {
        self.mutate("create_server", datacenter_id, datacenter_id.to_string(), |s| {
            let id = s.id("srv");
            let props = &req.properties;
            s.servers.insert(
                (datacenter_id.to_string(), id.clone()),
                FakeServer {
                    name: props.name.clone(),
                    cores: props.cores,
                    ram: props.ram,
                    state: State::Available,
                    vm_state: VmState::Running,
                    volumes: props.boot_volume.iter().map(|b| b.id.clone()).collect(),
                    nics: Vec::new(),
                },
            );
            s.server(datacenter_id, &id)
                .ok_or_else(|| Error::Backend("server vanished".into()))
        })
        .await
    }

    async fn get_server(&self, datacenter_id: &str, server_id: &str) -> Result<Option<Server>> {
        self.read("get_server", format!("{datacenter_id}/{server_id}"), |s| {
            Ok(s.server(datacenter_id, server_id))
        })
        .await
    }

    async fn list_servers(&self, datacenter_id: &str) -> Result<Vec<Server>> {
        self.read("list_servers", datacenter_id.to_string(), |s| {
            Ok(s.servers
                .keys()
                .filter(|(dc, _)| dc == datacenter_id)
                .filter_map(|(dc, id)| s.server(dc, id))
                .collect())
        })
        .await
    }

    async fn delete_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.mutate("delete_server", datacenter_id, format!("{datacenter_id}/{server_id}"), |s| {
            if !s.ignore_server_deletes {
                s.servers.remove(&(datacenter_id.to_string(), server_id.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn attach_volume(&self, datacenter_id: &str, server_id: &str, volume_id: &str) -> Result<()> {
        self.mutate(
            "attach_volume",
            datacenter_id,
            format!("{datacenter_id}/{server_id}/{volume_id}"),
            |s| {
                let busy = s.busy_after_attach;
                let server = s.server_mut(datacenter_id, server_id)?;
                server.volumes.push(volume_id.to_string());
                if busy {
                    server.state = State::Busy;
                }
                Ok(())
            },
        )
        .await
    }

    async fn reboot_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.mutate("reboot_server", datacenter_id, format!("{datacenter_id}/{server_id}"), |s| {
            s.server_mut(datacenter_id, server_id)?.vm_state = VmState::Running;
            Ok(())
        })
        .await
    }

    async fn start_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.mutate("start_server", datacenter_id, format!("{datacenter_id}/{server_id}"), |s| {
            s.server_mut(datacenter_id, server_id)?.vm_state = VmState::Running;
            Ok(())
        })
        .await
    }

    async fn stop_server(&self, datacenter_id: &str, server_id: &str) -> Result<()> {
        self.mutate("stop_server", datacenter_id, format!("{datacenter_id}/{server_id}"), |s| {
            s.server_mut(datacenter_id, server_id)?.vm_state = VmState::Shutoff;
            Ok(())
        })
        .await
    }

    async fn create_nic(&self, datacenter_id: &str, server_id: &str, req: &CreateNicRequest) -> Result<Nic> {
        self.mutate("create_nic", datacenter_id, format!("{datacenter_id}/{server_id}"), |s| {
            let id = s.id("nic");
            let props = &req.properties;
            s.server_mut(datacenter_id, server_id)?.nics.push(FakeNic {
                id: id.clone(),
                ips: props.ips.clone(),
                lan: props.lan,
                firewall_active: props.firewall_active,
                rules: Vec::new(),
            });
            Ok(Nic {
                id,
                metadata: Some(metadata(State::Busy)),
                properties: NicProperties {
                    ips: props.ips.clone(),
                    lan: Some(props.lan),
                    firewall_active: Some(props.firewall_active),
                    ..Default::default()
                },
            })
        })
        .await
    }

    async fn get_nic(&self, datacenter_id: &str, server_id: &str, nic_id: &str) -> Result<Option<Nic>> {
        self.read("get_nic", format!("{datacenter_id}/{server_id}/{nic_id}"), |s| {
            Ok(s.server(datacenter_id, server_id)
                .and_then(|srv| srv.nics().iter().find(|n| n.id == nic_id).cloned()))
        })
        .await
    }

    async fn create_ip_block(&self, req: &CreateIpBlockRequest) -> Result<IpBlock> {
        let location = req.properties.location.clone();
        self.read("create_ip_block", location.clone(), |s| {
            let id = s.id("ipb");
            let ips: Vec<String> = (0..req.properties.size)
                .map(|i| format!("203.0.113.{}", (s.next_id + u64::from(i)) % 250 + 1))
                .collect();
            s.ip_blocks.insert(id.clone(), ips.clone());
            Ok(IpBlock {
                id,
                metadata: Some(metadata(State::Available)),
                properties: IpBlockProperties {
                    name: Some(req.properties.name.clone()),
                    location: Some(location),
                    size: Some(req.properties.size),
                    ips,
                },
            })
        })
        .await
    }

    async fn delete_ip_block(&self, ip_block_id: &str) -> Result<()> {
        self.read("delete_ip_block", ip_block_id.to_string(), |s| {
            s.ip_blocks.remove(ip_block_id);
            Ok(())
        })
        .await
    }

    async fn create_firewall_rule(
        &self,
        datacenter_id: &str,
        server_id: &str,
        nic_id: &str,
        req: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule> {
        self.mutate(
            "create_firewall_rule",
            datacenter_id,
            format!("{datacenter_id}/{server_id}/{nic_id}"),
            |s| {
                let id = s.id("fw");
                let props = &req.properties;
                let nic = s
                    .server_mut(datacenter_id, server_id)?
                    .nics
                    .iter_mut()
                    .find(|n| n.id == nic_id)
                    .ok_or_else(|| Error::Backend(format!("no nic {nic_id}")))?;
                nic.rules.push((props.port_range_start, props.port_range_end));
                Ok(FirewallRule {
                    id,
                    metadata: None,
                    properties: FirewallRuleProperties {
                        name: Some(props.name.clone()),
                        protocol: Some(props.protocol.clone()),
                        port_range_start: Some(props.port_range_start),
                        port_range_end: Some(props.port_range_end),
                        ..Default::default()
                    },
                })
            },
        )
        .await
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        self.read("list_images", String::new(), |s| Ok(s.images.clone())).await
    }

    async fn get_image(&self, image_id: &str) -> Result<Option<Image>> {
        self.read("get_image", image_id.to_string(), |s| {
            Ok(s.images.iter().find(|i| i.id == image_id).cloned())
        })
        .await
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.read("list_snapshots", String::new(), |s| Ok(s.snapshots.clone())).await
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>> {
        self.read("get_snapshot", snapshot_id.to_string(), |s| {
            Ok(s.snapshots.iter().find(|i| i.id == snapshot_id).cloned())
        })
        .await
    }
}

/// Formatted log output collected by a thread-local test subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Installs a subscriber writing into the returned buffer for as long as
    /// the guard lives on this thread.
    pub fn capture() -> (Self, tracing::subscriber::DefaultGuard) {
        let buf = Self::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (buf, tracing::subscriber::set_default(subscriber))
    }

    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
