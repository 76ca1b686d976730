//! Poll-and-compare checks against remote resource state, and the named
//! blocking waits the adapter uses between dependent steps.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::CloudApi;
use crate::retry::{PollPolicy, wait_until};
use crate::types::{NicRef, ProvisioningState, ResourceRef, ServerRef, ServerRuntimeStatus, VolumeRef};
use crate::Result;

/// Reports whether a resource has reached a fixed provisioning state.
///
/// Re-fetches on every call. Absent resources, resources with no state yet
/// and fetch errors all read as "not yet".
#[derive(Clone)]
pub struct ProvisioningStatePredicate {
    api: Arc<dyn CloudApi>,
    target: ProvisioningState,
}

impl ProvisioningStatePredicate {
    pub fn new(api: Arc<dyn CloudApi>, target: ProvisioningState) -> Self {
        Self { api, target }
    }

    pub async fn apply(&self, resource: &ResourceRef) -> bool {
        match self.current_state(resource).await {
            Ok(Some(state)) => {
                debug!(resource = %resource, state = %state, target = %self.target, "polled state");
                state == self.target
            }
            Ok(None) => {
                debug!(resource = %resource, "resource not found or has no state yet");
                false
            }
            Err(e) => {
                debug!(resource = %resource, error = %e, "state poll failed");
                false
            }
        }
    }

    async fn current_state(&self, resource: &ResourceRef) -> Result<Option<ProvisioningState>> {
        let state = match resource {
            ResourceRef::DataCenter(id) => self
                .api
                .get_datacenter(id)
                .await?
                .and_then(|dc| dc.metadata)
                .and_then(|m| m.state),
            ResourceRef::Volume(r) => self
                .api
                .get_volume(&r.datacenter_id, &r.volume_id)
                .await?
                .and_then(|v| v.metadata)
                .and_then(|m| m.state),
            ResourceRef::Server(r) => self
                .api
                .get_server(&r.datacenter_id, &r.server_id)
                .await?
                .and_then(|s| s.state()),
            ResourceRef::Nic(r) => self
                .api
                .get_nic(&r.datacenter_id, &r.server_id, &r.nic_id)
                .await?
                .and_then(|n| n.metadata)
                .and_then(|m| m.state),
            ResourceRef::Snapshot(id) => self
                .api
                .get_snapshot(id)
                .await?
                .and_then(|s| s.metadata)
                .and_then(|m| m.state),
        };
        Ok(state.map(ProvisioningState::from))
    }
}

/// Reports whether a server has reached a fixed runtime status.
#[derive(Clone)]
pub struct RuntimeStatusPredicate {
    api: Arc<dyn CloudApi>,
    target: ServerRuntimeStatus,
}

impl RuntimeStatusPredicate {
    pub fn new(api: Arc<dyn CloudApi>, target: ServerRuntimeStatus) -> Self {
        Self { api, target }
    }

    pub async fn apply(&self, server: &ServerRef) -> bool {
        match self.api.get_server(&server.datacenter_id, &server.server_id).await {
            Ok(Some(s)) => s.properties.vm_state.map(ServerRuntimeStatus::from) == Some(self.target),
            Ok(None) => false,
            Err(e) => {
                debug!(datacenter_id = %server.datacenter_id, server_id = %server.server_id, error = %e, "status poll failed");
                false
            }
        }
    }
}

/// Named blocking waits. Each returns `false` on timeout and logs a warning;
/// callers continue optimistically.
#[derive(Clone)]
pub struct Waiters {
    api: Arc<dyn CloudApi>,
    policy: PollPolicy,
}

impl Waiters {
    pub fn new(api: Arc<dyn CloudApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn await_datacenter_available(&self, datacenter_id: &str) -> bool {
        self.await_state(ResourceRef::DataCenter(datacenter_id.to_string()), ProvisioningState::Available)
            .await
    }

    pub async fn await_volume_available(&self, volume: &VolumeRef) -> bool {
        self.await_state(volume.clone().into(), ProvisioningState::Available).await
    }

    pub async fn await_server_available(&self, server: &ServerRef) -> bool {
        self.await_state(server.clone().into(), ProvisioningState::Available).await
    }

    pub async fn await_nic_available(&self, nic: &NicRef) -> bool {
        self.await_state(nic.clone().into(), ProvisioningState::Available).await
    }

    pub async fn await_snapshot_available(&self, snapshot_id: &str) -> bool {
        self.await_state(ResourceRef::Snapshot(snapshot_id.to_string()), ProvisioningState::Available)
            .await
    }

    pub async fn await_server_running(&self, server: &ServerRef) -> bool {
        self.await_status(server, ServerRuntimeStatus::Running).await
    }

    pub async fn await_server_suspended(&self, server: &ServerRef) -> bool {
        self.await_status(server, ServerRuntimeStatus::Shutoff).await
    }

    /// Waits for the server to stop resolving. Fetch errors read as "still there".
    pub async fn await_server_gone(&self, server: &ServerRef) -> bool {
        let api = &self.api;
        let gone = wait_until(&self.policy, || async move {
            matches!(api.get_server(&server.datacenter_id, &server.server_id).await, Ok(None))
        })
        .await;
        if !gone {
            warn!(datacenter_id = %server.datacenter_id, server_id = %server.server_id, "timed out waiting for server deletion");
        }
        gone
    }

    async fn await_state(&self, resource: ResourceRef, target: ProvisioningState) -> bool {
        let predicate = ProvisioningStatePredicate::new(self.api.clone(), target);
        let reached = wait_until(&self.policy, || predicate.apply(&resource)).await;
        if !reached {
            warn!(resource = %resource, target = %target, "timed out waiting for state; continuing");
        }
        reached
    }

    async fn await_status(&self, server: &ServerRef, target: ServerRuntimeStatus) -> bool {
        let predicate = RuntimeStatusPredicate::new(self.api.clone(), target);
        let reached = wait_until(&self.policy, || predicate.apply(server)).await;
        if !reached {
            warn!(
                datacenter_id = %server.datacenter_id,
                server_id = %server.server_id,
                target = ?target,
                "timed out waiting for server status; continuing"
            );
        }
        reached
    }
}
