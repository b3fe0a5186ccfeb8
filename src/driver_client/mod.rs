pub mod dclient;
pub mod dclient_cfg;
pub mod dclient_code;
pub mod job;
pub mod software;

pub use dclient::*;
pub use dclient_cfg::{
    trace_enabled, AccelMode, CardConfig, CardFamily, ACCEL_CONFIG_ENV, ACCEL_TRACE_ENV,
};
pub use dclient_code::*;
pub use job::{ImageFilterJob, JobDescriptor, PixelMap, RowLayout};
pub use software::{filter_pixels, SoftwareCard};
