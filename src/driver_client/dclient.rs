//! This module provides the accelerator boundary used by both tools.
//!
//! [`Card`] is the narrow set of calls the tools make on a card: 32-bit action
//! register access, 64-bit global register access, action attach/detach and
//! synchronous job execution. [`CardHandle`] and [`AttachedAction`] own an open
//! card and an attached action and release them when dropped, so an early
//! return through `?` never leaks either.
//!
//! [`DeviceCard`] talks to the hardware through file channels on the device
//! node and on the sysfs global MMIO area.
use super::{dclient_cfg::*, dclient_code::*, job::*, software::SoftwareCard};
use crate::{
    error::*,
    utils::{open_channel, AccessFlags},
};
use std::{
    fmt::Debug,
    fs::File,
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
    thread::sleep,
    time::{Duration, Instant},
};

/// Interrupt options for an attached action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ActionFlags(u32);

impl ActionFlags {
    pub const NONE: ActionFlags = ActionFlags(0);
    /// Raise an interrupt when the action signals done.
    pub const DONE_IRQ: ActionFlags = ActionFlags(0x01);
    /// Raise an interrupt once the action is attached.
    pub const ATTACH_IRQ: ActionFlags = ActionFlags(0x02);

    pub fn contains(&self, other: ActionFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ActionFlags {
    type Output = ActionFlags;

    fn bitor(self, rhs: ActionFlags) -> ActionFlags {
        ActionFlags(self.0 | rhs.0)
    }
}

/// Operations the tools issue against an accelerator card.
pub trait Card {
    /// Device string the card was opened with.
    fn device(&self) -> &str;

    fn action_write32(&mut self, offset: u64, data: u32) -> Result<()>;
    fn action_read32(&mut self, offset: u64) -> Result<u32>;
    fn global_write64(&mut self, offset: u64, data: u64) -> Result<()>;
    fn global_read64(&mut self, offset: u64) -> Result<u64>;

    /// Waits up to `timeout` for an action of `action_type` to become
    /// available and claims it.
    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        timeout: Duration,
    ) -> Result<()>;
    fn detach_action(&mut self) -> Result<()>;

    /// Runs one job on the attached action and blocks until it completes or
    /// `timeout` elapses.
    fn execute_job(&mut self, job: &mut ImageFilterJob<'_>, timeout: Duration) -> Result<()>;
}

/// Opens cards by device string.
pub trait CardOpener {
    fn open(&self, device: &str) -> io::Result<Box<dyn Card>>;
}

/// Returns the opener for the requested backend.
pub fn card_opener(mode: AccelMode, cfg: &CardConfig) -> Box<dyn CardOpener> {
    match mode {
        AccelMode::Fpga => Box::new(DeviceOpener { cfg: cfg.clone() }),
        AccelMode::Cpu => Box::new(SoftwareOpener),
    }
}

/// An open card. The card is released when the handle is dropped.
pub struct CardHandle {
    card_no: u32,
    card: Box<dyn Card>,
}

impl CardHandle {
    /// Opens card `card_no` using the device naming of `cfg`.
    pub fn open(opener: &dyn CardOpener, cfg: &CardConfig, card_no: u32) -> Result<Self> {
        let device = cfg.device_name(card_no);
        log::debug!("Opening card {} as {:?}", card_no, device);
        let card = opener
            .open(&device)
            .map_err(|source| AccelError::CardOpen {
                card: card_no,
                device: device.clone(),
                source,
            })?;
        log::debug!("Opened card {} ({})", card_no, card.device());
        Ok(CardHandle { card_no, card })
    }

    pub fn card_no(&self) -> u32 {
        self.card_no
    }

    pub fn card(&mut self) -> &mut dyn Card {
        self.card.as_mut()
    }

    /// Attaches `action_type`; the returned guard detaches it on drop.
    pub fn attach(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        timeout: Duration,
    ) -> Result<AttachedAction<'_>> {
        self.card
            .attach_action(action_type, flags, timeout)
            .map_err(|e| {
                log::error!("Attach of action {:#010x} failed: {}", action_type, e);
                match e {
                    e @ AccelError::AttachTimeout { .. } => e,
                    _ => AccelError::AttachFailed {
                        card: self.card_no,
                        action_type,
                    },
                }
            })?;
        log::debug!("Attached action {:#010x} with flags {:?}", action_type, flags);
        Ok(AttachedAction {
            handle: self,
            action_type,
        })
    }
}

impl Drop for CardHandle {
    fn drop(&mut self) {
        log::debug!("Releasing card {} ({})", self.card_no, self.card.device());
    }
}

/// An action attached to an open card, detached when dropped.
pub struct AttachedAction<'a> {
    handle: &'a mut CardHandle,
    action_type: u32,
}

impl AttachedAction<'_> {
    pub fn action_type(&self) -> u32 {
        self.action_type
    }

    pub fn execute_job(&mut self, job: &mut ImageFilterJob<'_>, timeout: Duration) -> Result<()> {
        self.handle.card.execute_job(job, timeout)
    }
}

impl Drop for AttachedAction<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.handle.card.detach_action() {
            log::warn!("Detach of action {:#010x} failed: {}", self.action_type, e);
        } else {
            log::debug!("Detached action {:#010x}", self.action_type);
        }
    }
}

/// Opens [`DeviceCard`]s from `/dev/ocxl`.
pub struct DeviceOpener {
    cfg: CardConfig,
}

impl CardOpener for DeviceOpener {
    fn open(&self, device: &str) -> io::Result<Box<dyn Card>> {
        Ok(Box::new(DeviceCard::open(device, &self.cfg)?))
    }
}

/// Opens [`SoftwareCard`]s.
pub struct SoftwareOpener;

impl CardOpener for SoftwareOpener {
    fn open(&self, device: &str) -> io::Result<Box<dyn Card>> {
        Ok(Box::new(SoftwareCard::new(device)))
    }
}

/// The [`DeviceCard`] holds the file descriptors of one hardware card.
pub struct DeviceCard {
    device: String,
    /// Per-process action MMIO space (device node).
    action: File,
    /// Card wide MMIO space exported through sysfs.
    global: File,
    attached: Option<(u32, ActionFlags)>,
}

impl DeviceCard {
    /// Opens the device node matching `device` and its global MMIO area.
    ///
    /// `device` is either a path to a device node or a bare device name, in
    /// which case the first node in the device directory starting with that
    /// name is used.
    pub fn open(device: &str, cfg: &CardConfig) -> io::Result<Self> {
        let node = resolve_device(device, Path::new(cfg.dev_dir()))?;
        let node_name = node
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad device name"))?
            .to_string();
        let global_path = Path::new(cfg.sysfs_dir())
            .join(&node_name)
            .join("global_mmio_area");

        Ok(DeviceCard {
            device: device.to_string(),
            action: open_channel(&node.to_string_lossy(), AccessFlags::RdwrMode)?,
            global: open_channel(&global_path.to_string_lossy(), AccessFlags::RdwrMode)?,
            attached: None,
        })
    }

    fn ctrl_read_u32<T: Debug + Into<u64> + Copy>(&self, offset: T) -> Result<u32> {
        let mut task_label = [0, 0, 0, 0];
        let addr: u64 = offset.into();
        self.action
            .read_exact_at(&mut task_label, addr)
            .map_err(|e| AccelError::ReadError {
                offset: addr,
                source: e,
            })?;
        let res = u32::from_le_bytes(task_label);
        log::debug!("Getting data [ {:#X?} ] from label {:?}", res, offset);
        Ok(res)
    }

    fn ctrl_write_u32<T: Debug + Into<u64> + Copy>(&self, offset: T, data: u32) -> Result<()> {
        let addr: u64 = offset.into();
        self.action
            .write_all_at(&data.to_le_bytes(), addr)
            .map_err(|e| AccelError::WriteError {
                offset: addr,
                value: data as u64,
                source: e,
            })?;
        log::debug!("Successfully set data [ {:#X?} ] to label {:?}", data, offset);
        Ok(())
    }

    /// Writes `data` in 4 byte chunks; the action space only takes 32-bit accesses.
    fn ctrl_write<T: Debug + Into<u64> + Copy>(&self, offset: T, data: &[u8]) -> Result<()> {
        let addr: u64 = offset.into();
        data.chunks(4).enumerate().try_for_each(|(i, s_chunk)| {
            self.action
                .write_all_at(s_chunk, addr + (i * 4) as u64)
                .map_err(|e| AccelError::WriteError {
                    offset: addr + (i * 4) as u64,
                    value: 0,
                    source: e,
                })
        })?;

        crate::setter_log!(data, offset);
        Ok(())
    }

    /// Polls `ready` every millisecond until it holds or `deadline` passes.
    fn wait_until<F>(&self, deadline: Instant, mut ready: F) -> Result<bool>
    where
        F: FnMut(&Self) -> Result<bool>,
    {
        loop {
            if ready(self)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(Duration::from_millis(1));
        }
    }
}

impl Card for DeviceCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn action_write32(&mut self, offset: u64, data: u32) -> Result<()> {
        self.ctrl_write_u32(RAW_OFFSET(offset), data)
    }

    fn action_read32(&mut self, offset: u64) -> Result<u32> {
        self.ctrl_read_u32(RAW_OFFSET(offset))
    }

    fn global_write64(&mut self, offset: u64, data: u64) -> Result<()> {
        self.global
            .write_all_at(&data.to_le_bytes(), offset)
            .map_err(|e| AccelError::WriteError {
                offset,
                value: data,
                source: e,
            })?;
        log::debug!("Successfully set global [ {:#X?} ] to {:#X?}", data, offset);
        Ok(())
    }

    fn global_read64(&mut self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.global
            .read_exact_at(&mut buf, offset)
            .map_err(|e| AccelError::ReadError { offset, source: e })?;
        let res = u64::from_le_bytes(buf);
        log::debug!("Getting global [ {:#X?} ] from {:#X?}", res, offset);
        Ok(res)
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        timeout: Duration,
    ) -> Result<()> {
        // type match and idle share one timeout
        let deadline = Instant::now() + timeout;
        let mut found = 0;
        let matched = self.wait_until(deadline, |card| {
            found = card.ctrl_read_u32(ACTION_ADDR::TYPE)?;
            Ok(found == action_type)
        })?;
        if !matched {
            return Err(AccelError::AttachTimeout { action_type, found });
        }

        let idle = self.wait_until(deadline, |card| {
            Ok(card.ctrl_read_u32(ACTION_ADDR::CONTROL)? & ACTION_CONTROL_IDLE != 0)
        })?;
        if !idle {
            return Err(AccelError::AttachTimeout { action_type, found });
        }

        if flags.contains(ActionFlags::DONE_IRQ) {
            self.ctrl_write_u32(ACTION_ADDR::IRQ_ENABLE, 1)?;
            self.ctrl_write_u32(ACTION_ADDR::GLOBAL_IRQ_ENABLE, 1)?;
        }
        self.attached = Some((action_type, flags));
        Ok(())
    }

    fn detach_action(&mut self) -> Result<()> {
        match self.attached.take() {
            Some((_, flags)) => {
                if flags.contains(ActionFlags::DONE_IRQ) {
                    self.ctrl_write_u32(ACTION_ADDR::IRQ_ENABLE, 0)?;
                    self.ctrl_write_u32(ACTION_ADDR::GLOBAL_IRQ_ENABLE, 0)?;
                }
                Ok(())
            }
            None => Err(AccelError::NotAttached),
        }
    }

    fn execute_job(&mut self, job: &mut ImageFilterJob<'_>, timeout: Duration) -> Result<()> {
        let (_, flags) = self.attached.ok_or(AccelError::NotAttached)?;

        let desc = job.descriptor()?;
        log::debug!("Job descriptor: {:?}", desc);
        self.ctrl_write(ACTION_ADDR::JOB_DATA, &desc.to_bytes()?)?;
        self.ctrl_write_u32(ACTION_ADDR::CONTROL, ACTION_CONTROL_START)?;

        let done = self.wait_until(Instant::now() + timeout, |card| {
            Ok(card.ctrl_read_u32(ACTION_ADDR::CONTROL)? & ACTION_CONTROL_DONE != 0)
        })?;
        if flags.contains(ActionFlags::DONE_IRQ) {
            self.ctrl_write_u32(ACTION_ADDR::IRQ_STATUS, 1)?;
        }
        if !done {
            return Err(AccelError::JobTimeout {
                seconds: timeout.as_secs(),
            });
        }

        match self.ctrl_read_u32(ACTION_ADDR::RETC)? {
            ACTION_RETC_SUCCESS => Ok(()),
            retc => Err(AccelError::JobFailed { retc }),
        }
    }
}

fn resolve_device(device: &str, dev_dir: &Path) -> io::Result<PathBuf> {
    if device.contains('/') {
        return Ok(PathBuf::from(device));
    }

    let mut candidates = std::fs::read_dir(dev_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(device))
        })
        .collect::<Vec<PathBuf>>();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no device {} under {}", device, dev_dir.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_flags_contains() {
        let flags = ActionFlags::DONE_IRQ | ActionFlags::ATTACH_IRQ;
        assert!(flags.contains(ActionFlags::DONE_IRQ));
        assert!(flags.contains(ActionFlags::ATTACH_IRQ));
        assert!(!ActionFlags::DONE_IRQ.contains(ActionFlags::ATTACH_IRQ));
        assert!(!flags.contains(ActionFlags::NONE));
        assert_eq!(flags.bits(), 0x03);
    }

    fn scratch_card(name: &str) -> (DeviceCard, PathBuf) {
        let path = std::env::temp_dir().join(format!("{}-{}", name, std::process::id()));
        std::fs::write(&path, [0u8; 0x200]).unwrap();
        let card = DeviceCard {
            device: name.to_string(),
            action: open_channel(&path.to_string_lossy(), AccessFlags::RdwrMode).unwrap(),
            global: open_channel(&path.to_string_lossy(), AccessFlags::RdwrMode).unwrap(),
            attached: None,
        };
        (card, path)
    }

    #[test]
    fn attach_waits_at_most_one_timeout() {
        let (mut card, path) = scratch_card("ocxl-attach-deadline");
        let late_type = {
            let path = path.clone();
            std::thread::spawn(move || {
                sleep(Duration::from_millis(150));
                let regs = open_channel(&path.to_string_lossy(), AccessFlags::RdwrMode).unwrap();
                regs.write_all_at(&0x1014_1008u32.to_le_bytes(), ACTION_ADDR::TYPE as u64)
                    .unwrap();
            })
        };

        // type shows up late and the action never reports idle
        let start = Instant::now();
        let err = card
            .attach_action(0x1014_1008, ActionFlags::NONE, Duration::from_millis(250))
            .unwrap_err();
        let elapsed = start.elapsed();
        late_type.join().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, AccelError::AttachTimeout { found: 0x1014_1008, .. }));
        assert!(elapsed < Duration::from_millis(375), "attach took {:?}", elapsed);
        assert!(card.attached.is_none());
    }

    #[test]
    fn wait_until_checks_once_past_deadline() {
        let (card, path) = scratch_card("ocxl-wait-until");
        let mut polls = 0;
        let ready = card
            .wait_until(Instant::now(), |_| {
                polls += 1;
                Ok(false)
            })
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!ready);
        assert_eq!(polls, 1);
    }

    #[test]
    fn resolve_device_picks_first_matching_node() {
        let dir = std::env::temp_dir().join(format!("ocxl-resolve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "IBM,oc-accel.0005:00:00.1.0",
            "IBM,oc-accel.0004:00:00.1.0",
            "other.0001",
        ] {
            File::create(dir.join(name)).unwrap();
        }

        let found = resolve_device("IBM,oc-accel", &dir).unwrap();
        assert_eq!(found, dir.join("IBM,oc-accel.0004:00:00.1.0"));

        let err = resolve_device("IBM,oc-snap", &dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let explicit = resolve_device("/dev/ocxl/IBM,oc-snap.0001:00:00.1.0", &dir).unwrap();
        assert_eq!(explicit, PathBuf::from("/dev/ocxl/IBM,oc-snap.0001:00:00.1.0"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
