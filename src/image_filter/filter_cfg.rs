use std::{path::PathBuf, time::Duration};

/// Action type of the fixed-function image filter.
pub const IMAGE_FILTER_ACTION_TYPE: u32 = 0x1014_1008;
/// How long to wait for the action to become available.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 6000;

/// Everything one run of the filter needs, built once from the command line.
#[derive(Debug, Clone)]
pub struct FilterParams {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub card_no: u32,
    pub job_timeout: Duration,
}

impl FilterParams {
    pub fn new(input: PathBuf, output: Option<PathBuf>, card_no: u32) -> Self {
        FilterParams {
            input,
            output,
            card_no,
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }
}
