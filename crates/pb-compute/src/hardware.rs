use crate::{Error, Result};

pub const MAX_CORES: u32 = 48;
pub const RAM_SIZES_MB: [u32; 9] = [
    1024,
    2 * 1024,
    4 * 1024,
    8 * 1024,
    10 * 1024,
    16 * 1024,
    24 * 1024,
    28 * 1024,
    32 * 1024,
];
pub const DISK_SIZES_GB: [u32; 10] = [10, 20, 30, 50, 80, 100, 150, 200, 250, 500];

/// Compute shape of a node. The first volume is the boot volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hardware {
    pub cores: u32,
    pub ram_mb: u32,
    pub volumes_gb: Vec<u32>,
}

impl Hardware {
    pub fn new(cores: u32, ram_mb: u32, volumes_gb: Vec<u32>) -> Self {
        Self {
            cores,
            ram_mb,
            volumes_gb,
        }
    }

    /// `cpu=C,ram=R,disk=D` where D is the total disk size in GB.
    pub fn id(&self) -> String {
        format_id(self.cores, self.ram_mb, self.total_disk_gb())
    }

    pub fn total_disk_gb(&self) -> u32 {
        self.volumes_gb.iter().sum()
    }

    /// Parse a profile id back into a single-volume hardware shape.
    pub fn from_id(id: &str) -> Result<Self> {
        let invalid = || Error::InvalidId(format!("expected cpu=C,ram=R,disk=D, got {id:?}"));

        let (mut cores, mut ram, mut disk) = (None, None, None);
        for part in id.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(invalid)?;
            let value = parse_size(value).ok_or_else(invalid)?;
            match key {
                "cpu" => cores = Some(value),
                "ram" => ram = Some(value),
                "disk" => disk = Some(value),
                _ => return Err(invalid()),
            }
        }

        match (cores, ram, disk) {
            (Some(c), Some(r), Some(d)) if c > 0 && r > 0 && d > 0 => Ok(Self::new(c, r, vec![d])),
            _ => Err(invalid()),
        }
    }

    pub fn with_extra_volumes(mut self, extra_gb: &[u32]) -> Self {
        self.volumes_gb.extend(extra_gb.iter().copied().filter(|&gb| gb > 0));
        self
    }
}

pub fn format_id(cores: u32, ram_mb: u32, disk_gb: u32) -> String {
    format!("cpu={cores},ram={ram_mb},disk={disk_gb}")
}

/// Accepts `20` as well as `20.000000`.
fn parse_size(s: &str) -> Option<u32> {
    if let Ok(v) = s.parse::<u32>() {
        return Some(v);
    }
    let v: f64 = s.parse().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64).then_some(v as u32)
}

/// Every supported cores x RAM x disk combination.
pub fn list_hardware_profiles() -> Vec<Hardware> {
    let mut profiles =
        Vec::with_capacity(MAX_CORES as usize * RAM_SIZES_MB.len() * DISK_SIZES_GB.len());
    for cores in 1..=MAX_CORES {
        for ram in RAM_SIZES_MB {
            for disk in DISK_SIZES_GB {
                profiles.push(Hardware::new(cores, ram, vec![disk]));
            }
        }
    }
    profiles
}
