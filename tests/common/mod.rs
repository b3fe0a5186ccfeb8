#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, io, path::PathBuf, rc::Rc, time::Duration};

use ocaccel_tools::{driver_client::*, error::*};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String),
    Attach(u32, Duration),
    Detach,
    Execute {
        in_size: u32,
        out_size: u32,
        total_file_size: u32,
    },
    Write32(u64, u32),
    Read32(u64),
    Write64(u64, u64),
    Read64(u64),
    Release,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Failures the mock card injects.
#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    pub fail_open: bool,
    pub fail_attach: bool,
    pub job_retc: Option<u32>,
    /// Fail the n-th write (counting from 1).
    pub fail_write: Option<usize>,
    pub fail_read: bool,
    /// XORed into every value read back.
    pub corrupt_read: u64,
}

pub struct MockOpener {
    pub log: EventLog,
    pub behaviour: Behaviour,
}

impl MockOpener {
    pub fn new(behaviour: Behaviour) -> (Box<dyn CardOpener>, EventLog) {
        let log = EventLog::default();
        let opener = MockOpener {
            log: log.clone(),
            behaviour,
        };
        (Box::new(opener), log)
    }
}

impl CardOpener for MockOpener {
    fn open(&self, device: &str) -> io::Result<Box<dyn Card>> {
        self.log.borrow_mut().push(Event::Open(device.to_string()));
        if self.behaviour.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such card"));
        }
        Ok(Box::new(MockCard {
            device: device.to_string(),
            log: self.log.clone(),
            behaviour: self.behaviour.clone(),
            regs32: HashMap::new(),
            regs64: HashMap::new(),
            writes: 0,
        }))
    }
}

pub struct MockCard {
    device: String,
    log: EventLog,
    behaviour: Behaviour,
    regs32: HashMap<u64, u32>,
    regs64: HashMap<u64, u64>,
    writes: usize,
}

impl MockCard {
    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    fn count_write(&mut self, offset: u64, value: u64) -> Result<()> {
        self.writes += 1;
        if self.behaviour.fail_write == Some(self.writes) {
            return Err(AccelError::WriteError {
                offset,
                value,
                source: io::Error::new(io::ErrorKind::Other, "bus error"),
            });
        }
        Ok(())
    }

    fn check_read(&self, offset: u64) -> Result<()> {
        if self.behaviour.fail_read {
            return Err(AccelError::ReadError {
                offset,
                source: io::Error::new(io::ErrorKind::Other, "bus error"),
            });
        }
        Ok(())
    }
}

impl Card for MockCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn action_write32(&mut self, offset: u64, data: u32) -> Result<()> {
        self.record(Event::Write32(offset, data));
        self.count_write(offset, data as u64)?;
        self.regs32.insert(offset, data);
        Ok(())
    }

    fn action_read32(&mut self, offset: u64) -> Result<u32> {
        self.record(Event::Read32(offset));
        self.check_read(offset)?;
        let value = self.regs32.get(&offset).copied().unwrap_or(0);
        Ok(value ^ self.behaviour.corrupt_read as u32)
    }

    fn global_write64(&mut self, offset: u64, data: u64) -> Result<()> {
        self.record(Event::Write64(offset, data));
        self.count_write(offset, data)?;
        self.regs64.insert(offset, data);
        Ok(())
    }

    fn global_read64(&mut self, offset: u64) -> Result<u64> {
        self.record(Event::Read64(offset));
        self.check_read(offset)?;
        let value = self.regs64.get(&offset).copied().unwrap_or(0);
        Ok(value ^ self.behaviour.corrupt_read)
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        _flags: ActionFlags,
        timeout: Duration,
    ) -> Result<()> {
        self.record(Event::Attach(action_type, timeout));
        if self.behaviour.fail_attach {
            return Err(AccelError::NotAttached);
        }
        Ok(())
    }

    fn detach_action(&mut self) -> Result<()> {
        self.record(Event::Detach);
        Ok(())
    }

    fn execute_job(&mut self, job: &mut ImageFilterJob<'_>, _timeout: Duration) -> Result<()> {
        let desc = job.descriptor()?;
        self.record(Event::Execute {
            in_size: desc.in_size,
            out_size: desc.out_size,
            total_file_size: desc.total_file_size,
        });
        if let Some(retc) = self.behaviour.job_retc {
            return Err(AccelError::JobFailed { retc });
        }
        // invert so the output is distinguishable from the input
        job.source
            .as_slice()
            .iter()
            .zip(job.destination.as_mut_slice().iter_mut())
            .for_each(|(src, dst)| *dst = !src);
        Ok(())
    }
}

impl Drop for MockCard {
    fn drop(&mut self) {
        self.record(Event::Release);
    }
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.borrow().clone()
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ocaccel-{}-{}", std::process::id(), name))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
