//! Node lifecycle orchestration on top of the ProfitBricks Cloud API.
//!
//! The [`ComputeServiceAdapter`] composes remote calls into multi-step
//! workflows. Every mutating call goes through the [`ProvisioningManager`],
//! which serializes work per datacenter, and dependent steps are separated by
//! bounded polling through the [`Waiters`].

pub mod adapter;
pub mod client;
pub mod config;
pub mod functions;
pub mod hardware;
pub mod password;
pub mod predicates;
pub mod provisioning;
pub mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

pub use adapter::ComputeServiceAdapter;
pub use client::CloudApi;
pub use config::{AdapterConfig, ComputeConfig};
pub use predicates::Waiters;
pub use provisioning::{ProvisioningJob, ProvisioningManager};
pub use retry::{PollPolicy, wait_until};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("profitbricks api error: {0}")]
    Api(#[from] profitbricks_api::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("failed to {stage}: {source}")]
    Fatal {
        stage: CreateStage,
        #[source]
        source: Box<Error>,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("provisioning manager is closed")]
    ManagerClosed,

    #[error("provisioning job for datacenter {datacenter_id} aborted before completing")]
    JobAborted { datacenter_id: String },

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub(crate) fn fatal(stage: CreateStage, source: Error) -> Self {
        Self::Fatal {
            stage,
            source: Box::new(source),
        }
    }

    /// True for a typed not-found, including one wrapped in a fatal failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Fatal { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Steps of the create-node workflow that can fail or be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateStage {
    ProvisionBootVolume,
    ProvisionVolume,
    ProvisionServer,
    AllocateIpBlock,
    ProvisionNic,
    CreateFirewallRule,
    AttachVolume,
    Reboot,
}

impl CreateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisionBootVolume => "provision boot volume",
            Self::ProvisionVolume => "provision volume",
            Self::ProvisionServer => "provision server",
            Self::AllocateIpBlock => "allocate ip block",
            Self::ProvisionNic => "provision nic",
            Self::CreateFirewallRule => "create firewall rule",
            Self::AttachVolume => "attach volume",
            Self::Reboot => "reboot",
        }
    }
}

impl fmt::Display for CreateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
