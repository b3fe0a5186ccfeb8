use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccelError>;

#[derive(Error, Debug)]
pub enum AccelError {
    #[error("({card}) is a invalid card number")]
    InvalidCard { card: i64 },
    #[error("invalid access width {width}, expected 32 or 64")]
    InvalidWidth { width: u32 },
    #[error("failed to open card {card} ({device})")]
    CardOpen {
        card: u32,
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to attach action {action_type:#010x} on card {card}")]
    AttachFailed { card: u32, action_type: u32 },
    #[error("timeout while attaching action {action_type:#010x}: found {found:#010x}")]
    AttachTimeout { action_type: u32, found: u32 },
    #[error("no action attached")]
    NotAttached,
    #[error("job did not finish within {seconds} seconds")]
    JobTimeout { seconds: u64 },
    #[error("job failed with return code {retc:#x}")]
    JobFailed { retc: u32 },
    #[error("could not write {value:016x} to [{offset:08x}]")]
    WriteError {
        offset: u64,
        value: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to read data from offset [{offset:08x}]")]
    ReadError {
        offset: u64,
        #[source]
        source: io::Error,
    },
    #[error("read back failed at [{offset:08x}]")]
    ReadBackFailed {
        offset: u64,
        #[source]
        source: Box<AccelError>,
    },
    #[error("post verify failed {expected:016x}/{found:016x}")]
    VerifyFailed { expected: u64, found: u64 },
    #[error("invalid bitmap: {reason}")]
    InvalidBitmap { reason: String },
    #[error("source buffer of {source_len} bytes does not match destination of {destination_len} bytes")]
    BufferMismatch {
        source_len: usize,
        destination_len: usize,
    },
    #[error("failed to pack job descriptor: {0}")]
    Packing(#[from] packed_struct::PackingError),
    #[error("failed open file")]
    FileError(#[from] io::Error),
}

impl AccelError {
    /// Process exit status for this error. A failed job reports the
    /// accelerator return code, everything else is `EXIT_FAILURE`.
    pub fn exit_code(&self) -> u8 {
        match self {
            AccelError::JobFailed { retc } => match (*retc & 0xff) as u8 {
                0 => 1,
                code => code,
            },
            _ => 1,
        }
    }
}
