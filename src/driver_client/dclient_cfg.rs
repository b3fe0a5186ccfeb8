use strum_macros::{Display, EnumString};

/// Environment variable selecting between the hardware card and CPU emulation.
pub const ACCEL_CONFIG_ENV: &str = "OCACCEL_CONFIG";
/// Environment variable that turns on register level tracing when nonzero.
pub const ACCEL_TRACE_ENV: &str = "OCACCEL_TRACE";

/// Framework flavour the card image was built with. Each flavour registers its
/// devices under a different name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardFamily {
    Snap,
    OcAccel,
}

/// Where to find the card: default device name, enumerated device naming and
/// the sysfs location of the global MMIO area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardConfig {
    pub(crate) default_device: &'static str,
    pub(crate) dev_dir: &'static str,
    pub(crate) sysfs_dir: &'static str,
    pub(crate) max_card: u32,
}

impl CardConfig {
    /// Create a new card config.
    pub fn card_cfg(family: CardFamily) -> Self {
        match family {
            CardFamily::Snap => snap_cfg(),
            CardFamily::OcAccel => ocaccel_cfg(),
        }
    }

    /// Device string handed to the card opener. Card 0 is the default system
    /// card, any other number names an enumerated device node.
    pub fn device_name(&self, card_no: u32) -> String {
        if card_no == 0 {
            self.default_device.to_string()
        } else {
            format!(
                "{}/{}.000{}:00:00.1.0",
                self.dev_dir, self.default_device, card_no
            )
        }
    }

    pub fn is_valid_card(&self, card_no: i64) -> bool {
        (0..=self.max_card as i64).contains(&card_no)
    }

    pub fn dev_dir(&self) -> &str {
        self.dev_dir
    }

    pub fn sysfs_dir(&self) -> &str {
        self.sysfs_dir
    }
}

fn snap_cfg() -> CardConfig {
    CardConfig {
        default_device: "IBM,oc-snap",
        dev_dir: "/dev/ocxl",
        sysfs_dir: "/sys/class/ocxl",
        max_card: 4,
    }
}

fn ocaccel_cfg() -> CardConfig {
    CardConfig {
        default_device: "IBM,oc-accel",
        dev_dir: "/dev/ocxl",
        sysfs_dir: "/sys/class/ocxl",
        max_card: 4,
    }
}

/// Backend that executes register accesses and jobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AccelMode {
    #[default]
    #[strum(serialize = "FPGA")]
    Fpga,
    #[strum(serialize = "CPU")]
    Cpu,
}

impl AccelMode {
    /// Reads the mode from [`ACCEL_CONFIG_ENV`], falling back to FPGA mode
    /// when unset or unknown.
    pub fn from_env() -> Self {
        match std::env::var(ACCEL_CONFIG_ENV) {
            Ok(val) => val.parse().unwrap_or_else(|_| {
                log::warn!("Unknown {}={:?}, using FPGA mode", ACCEL_CONFIG_ENV, val);
                AccelMode::Fpga
            }),
            Err(_) => AccelMode::Fpga,
        }
    }
}

/// Returns `true` when [`ACCEL_TRACE_ENV`] holds a nonzero number.
pub fn trace_enabled() -> bool {
    std::env::var(ACCEL_TRACE_ENV)
        .ok()
        .and_then(|v| crate::utils::parse_c_ulong(&v).ok())
        .map_or(false, |v| v != 0)
}
