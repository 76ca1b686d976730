use std::str::FromStr;
use std::time::Duration;

use profitbricks_api::{DEFAULT_ENDPOINT, VolumeType};

use crate::retry::PollPolicy;
use crate::{Error, Result};

/// Tuning for the adapter's workflows.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    pub poll: PollPolicy,
    /// LAN for the node's NIC when the template names none.
    pub default_lan_id: u32,
    /// Pause before the post-create reboot.
    pub pre_reboot_pause: Duration,
    /// Pause between the post-create reboot and the final fetch.
    pub post_reboot_pause: Duration,
    /// Max concurrent reads in list fan-outs.
    pub user_threads: usize,
    pub volume_type: VolumeType,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            default_lan_id: 1,
            pre_reboot_pause: Duration::from_secs(5),
            post_reboot_pause: Duration::from_secs(30),
            user_threads: 10,
            volume_type: VolumeType::Hdd,
        }
    }
}

/// Credentials, endpoint and adapter tuning.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    pub username: String,
    pub password: String,
    pub endpoint: String,
    pub adapter: AdapterConfig,
}

impl ComputeConfig {
    /// Load from env vars (and `.env`): `PROFITBRICKS_USERNAME` and
    /// `PROFITBRICKS_PASSWORD` are required, the rest have defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::MissingEnv(key.to_string()))
        };

        let defaults = AdapterConfig::default();
        let poll = PollPolicy::from_secs(
            parse_or(&lookup, "PROFITBRICKS_POLL_TIMEOUT_SECS", defaults.poll.timeout.as_secs())?,
            parse_or(&lookup, "PROFITBRICKS_POLL_PERIOD_SECS", defaults.poll.period.as_secs())?,
            parse_or(&lookup, "PROFITBRICKS_POLL_MAX_PERIOD_SECS", defaults.poll.max_period.as_secs())?,
        );
        if poll.period > poll.max_period {
            return Err(Error::InvalidConfig {
                key: "PROFITBRICKS_POLL_PERIOD_SECS".into(),
                value: format!("{} exceeds max period {}", poll.period.as_secs(), poll.max_period.as_secs()),
            });
        }

        let volume_type = match lookup("PROFITBRICKS_VOLUME_TYPE").as_deref() {
            None | Some("") => defaults.volume_type,
            Some(v) if v.eq_ignore_ascii_case("hdd") => VolumeType::Hdd,
            Some(v) if v.eq_ignore_ascii_case("ssd") => VolumeType::Ssd,
            Some(other) => {
                return Err(Error::InvalidConfig {
                    key: "PROFITBRICKS_VOLUME_TYPE".into(),
                    value: other.to_string(),
                });
            }
        };

        let user_threads: usize = parse_or(&lookup, "PROFITBRICKS_USER_THREADS", defaults.user_threads)?;
        if user_threads == 0 {
            return Err(Error::InvalidConfig {
                key: "PROFITBRICKS_USER_THREADS".into(),
                value: "0".into(),
            });
        }

        Ok(Self {
            username: required("PROFITBRICKS_USERNAME")?,
            password: required("PROFITBRICKS_PASSWORD")?,
            endpoint: lookup("PROFITBRICKS_ENDPOINT")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            adapter: AdapterConfig {
                poll,
                default_lan_id: parse_or(&lookup, "PROFITBRICKS_DEFAULT_LAN_ID", defaults.default_lan_id)?,
                pre_reboot_pause: Duration::from_secs(parse_or(
                    &lookup,
                    "PROFITBRICKS_PRE_REBOOT_PAUSE_SECS",
                    defaults.pre_reboot_pause.as_secs(),
                )?),
                post_reboot_pause: Duration::from_secs(parse_or(
                    &lookup,
                    "PROFITBRICKS_POST_REBOOT_PAUSE_SECS",
                    defaults.post_reboot_pause.as_secs(),
                )?),
                user_threads,
                volume_type,
            },
        })
    }

    pub fn client(&self) -> profitbricks_api::ProfitBricksClient {
        profitbricks_api::ProfitBricksClient::with_endpoint(&self.endpoint, &self.username, &self.password)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v.trim().parse().map_err(|_| Error::InvalidConfig {
            key: key.to_string(),
            value: v,
        }),
        _ => Ok(default),
    }
}
