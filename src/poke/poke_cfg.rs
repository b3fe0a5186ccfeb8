use std::{fmt, str::FromStr, time::Duration};

use crate::{error::*, utils::parse_c_ulong};

/// Register access width.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AccessWidth {
    W32,
    #[default]
    W64,
}

impl TryFrom<u64> for AccessWidth {
    type Error = AccelError;

    fn try_from(width: u64) -> Result<Self> {
        match width {
            32 => Ok(AccessWidth::W32),
            64 => Ok(AccessWidth::W64),
            _ => Err(AccelError::InvalidWidth {
                width: width as u32,
            }),
        }
    }
}

impl FromStr for AccessWidth {
    type Err = AccelError;

    fn from_str(s: &str) -> Result<Self> {
        let width = parse_c_ulong(s).map_err(|_| AccelError::InvalidWidth { width: 0 })?;
        AccessWidth::try_from(width)
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessWidth::W32 => write!(f, "32"),
            AccessWidth::W64 => write!(f, "64"),
        }
    }
}

/// Everything one poke run needs, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokeParams {
    /// Card number as given; validated before the card is opened.
    pub card: i64,
    /// CPU to pin the calling thread to before touching registers.
    pub cpu: Option<usize>,
    pub width: AccessWidth,
    pub interval: Duration,
    pub count: u64,
    pub read_back: bool,
    pub offset: u32,
    pub value: u64,
}

impl PokeParams {
    pub fn new(offset: u32, value: u64) -> Self {
        PokeParams {
            card: 0,
            cpu: None,
            width: AccessWidth::default(),
            interval: Duration::ZERO,
            count: 1,
            read_back: false,
            offset,
            value,
        }
    }
}

/// Final offset/value pair echoed after a successful run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PokeReport {
    pub offset: u32,
    pub value: u64,
    pub iterations: u64,
}

impl fmt::Display for PokeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:08x}] {:016x}", self.offset, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_parses_only_32_and_64() {
        assert_eq!("32".parse::<AccessWidth>().unwrap(), AccessWidth::W32);
        assert_eq!("0x40".parse::<AccessWidth>().unwrap(), AccessWidth::W64);
        assert!("16".parse::<AccessWidth>().is_err());
        assert!("wide".parse::<AccessWidth>().is_err());
    }

    #[test]
    fn report_zero_extends_value() {
        let report = PokeReport {
            offset: 0x100,
            value: 0xdead_beef,
            iterations: 3,
        };
        assert_eq!(report.to_string(), "[00000100] 00000000deadbeef");
    }
}
