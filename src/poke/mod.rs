pub mod poke_api;
pub mod poke_cfg;

pub use poke_api::*;
pub use poke_cfg::{AccessWidth, PokeParams, PokeReport};
