//! Host-side tools for OpenCAPI accelerator cards.
//!
//! The [driver client](crate::driver_client) is the boundary to the card: it
//! opens cards, attaches actions, runs jobs and accesses MMIO registers either
//! on hardware or on a CPU emulation. On top of it sit the
//! [image filter](crate::image_filter) demo and the [register poke](crate::poke)
//! tool.
//!
pub mod driver_client;
pub mod error;
pub mod image_filter;
pub mod poke;
pub mod utils;
