//! This module provides register offsets for the action MMIO space of a card.
#![allow(non_camel_case_types)]

/// Offsets inside the per-process action MMIO space.
///
/// The first block follows the HLS control interface; the job descriptor is
/// copied to [`ACTION_ADDR::JOB_DATA`] before the action is started.
#[derive(Debug, Copy, Clone)]
pub enum ACTION_ADDR {
    /// bit 0: ap_start, bit 1: ap_done, bit 2: ap_idle, bit 3: ap_ready
    CONTROL = 0x00,
    GLOBAL_IRQ_ENABLE = 0x04,
    IRQ_ENABLE = 0x08,
    IRQ_STATUS = 0x0C,
    TYPE = 0x10,
    RELEASE = 0x14,
    /// Return code written by the action when it completes.
    RETC = 0x104,
    JOB_DATA = 0x110,
}

impl From<ACTION_ADDR> for u64 {
    fn from(addr: ACTION_ADDR) -> Self {
        addr as u64
    }
}

/// Raw register offset for callers that poke arbitrary addresses.
#[derive(Debug, Copy, Clone)]
pub struct RAW_OFFSET(pub u64);

impl From<RAW_OFFSET> for u64 {
    fn from(addr: RAW_OFFSET) -> Self {
        addr.0
    }
}

pub(crate) const ACTION_CONTROL_START: u32 = 0x01;
pub(crate) const ACTION_CONTROL_DONE: u32 = 0x02;
pub(crate) const ACTION_CONTROL_IDLE: u32 = 0x04;

/// Return code of a successfully completed action.
pub const ACTION_RETC_SUCCESS: u32 = 0x102;
