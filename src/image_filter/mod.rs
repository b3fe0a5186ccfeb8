pub mod bmp;
pub mod dma_buffer;
pub mod filter_api;
pub mod filter_cfg;

pub use bmp::{encode_bmp24, BmpHeader, BmpImage};
pub use dma_buffer::*;
pub use filter_api::*;
pub use filter_cfg::*;
