use core_affinity::CoreId;
use std::{
    fs::{File, OpenOptions},
    io::{Error, Read},
    os::unix::prelude::OpenOptionsExt,
};

#[macro_export]
macro_rules! setter_log {
    ($data:expr, $from: expr) => {
        if $data.len() < 256 {
            log::trace!("Successfully set data [ {:?} ] to {:#X?}", $data, $from);
        } else {
            log::trace!(
                "Successfully set data of size [ {:?} ] to {:#X?}",
                $data.len(),
                $from
            );
        }
    };
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AccessFlags {
    RdMode = 0,   // rdonly channel
    WrMode = 1,   // wronly channel
    RdwrMode = 2, //rdwr channel
}

// ==== read/write ====
pub fn open_channel(path: &str, mode: AccessFlags) -> Result<File, Error> {
    let mut options = OpenOptions::new();
    if mode == AccessFlags::RdwrMode || mode == AccessFlags::RdMode {
        options.read(true);
    }

    if mode == AccessFlags::RdwrMode || mode == AccessFlags::WrMode {
        options.write(true);
    }

    if cfg!(unix) {
        options.custom_flags(libc::O_SYNC);
    }
    log::debug!("Opening channel {:?} in {:?}", path, mode);
    options.open(path)
}

pub fn read_binary_file(path: &str) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    log::debug!("Trying to open file: {:?}", path);
    let mut file = File::open(path)?;
    file.read_to_end(&mut buffer)?;

    Ok(buffer)
}

// ==== conversions ====

/// Rounds `n` up to the next multiple of `align`, which must be a power of two.
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Parses an unsigned number the way `strtoul(s, NULL, 0)` does: `0x` prefix
/// is hex, a leading `0` is octal, anything else decimal. A bare `0x` is 0.
/// Unlike `strtoul`, trailing garbage and empty input are errors.
pub fn parse_c_ulong(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Ok(0);
        }
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u64>()
    }
}

// ==== general ====
/// Formats an error followed by its chain of sources.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    msg
}

/// Initialises `env_logger` with `default_level` unless `RUST_LOG` says otherwise.
pub fn init_logger(default_level: log::LevelFilter) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.as_str()),
    )
    .format_timestamp(None)
    .try_init();
}

/// Pins the calling thread to a single CPU. Returns `false` when the CPU
/// does not exist or the affinity could not be set.
pub fn pin_to_cpu(cpu: usize) -> bool {
    let core = CoreId { id: cpu };
    let known = core_affinity::get_core_ids().map_or(false, |ids| ids.contains(&core));
    let pinned = known && core_affinity::set_for_current(core);
    if pinned {
        log::debug!("Pinned to cpu {}", cpu);
    }
    pinned
}
