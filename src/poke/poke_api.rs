//! Writes, and optionally verifies, a value at an MMIO register offset.
use std::thread::sleep;

use super::poke_cfg::*;
use crate::{driver_client::*, error::*, utils::pin_to_cpu};

pub struct PokeClient {
    cfg: CardConfig,
    opener: Box<dyn CardOpener>,
}

impl PokeClient {
    /// Client for the backend selected by `mode`.
    pub fn new(mode: AccelMode) -> Self {
        let cfg = CardConfig::card_cfg(CardFamily::OcAccel);
        let opener = card_opener(mode, &cfg);
        PokeClient { cfg, opener }
    }

    pub fn with_opener(opener: Box<dyn CardOpener>) -> Self {
        PokeClient {
            cfg: CardConfig::card_cfg(CardFamily::OcAccel),
            opener,
        }
    }

    /// Validates the card number, opens the card and runs the poke loop.
    /// The card is released before this returns, on success and on failure.
    pub fn run(&self, params: &PokeParams) -> Result<PokeReport> {
        if !self.cfg.is_valid_card(params.card) {
            return Err(AccelError::InvalidCard { card: params.card });
        }

        if let Some(cpu) = params.cpu {
            if !pin_to_cpu(cpu) {
                log::warn!("Could not pin to cpu {}", cpu);
            }
        }

        let mut card = CardHandle::open(self.opener.as_ref(), &self.cfg, params.card as u32)?;
        poke_loop(card.card(), params)
    }
}

/// Issues `params.count` writes, each optionally followed by a read-back and
/// compare. The first failure ends the loop.
pub fn poke_loop(card: &mut dyn Card, params: &PokeParams) -> Result<PokeReport> {
    let offset = params.offset as u64;

    for i in 0..params.count {
        let expected = match params.width {
            AccessWidth::W32 => {
                let value = params.value as u32;
                card.action_write32(offset, value)?;
                u64::from(value)
            }
            AccessWidth::W64 => {
                println!("{}", global_poke_line(params.offset, params.value));
                card.global_write64(offset, params.value)?;
                params.value
            }
        };

        if params.read_back {
            let found = match params.width {
                AccessWidth::W32 => card.action_read32(offset).map(u64::from),
                AccessWidth::W64 => card.global_read64(offset),
            }
            .map_err(|e| AccelError::ReadBackFailed {
                offset,
                source: Box::new(e),
            })?;

            if found != expected {
                return Err(AccelError::VerifyFailed { expected, found });
            }
        }
        log::trace!("Poke {} of {} done", i + 1, params.count);

        if !params.interval.is_zero() {
            sleep(params.interval);
        }
    }

    Ok(PokeReport {
        offset: params.offset,
        value: params.value,
        iterations: params.count,
    })
}

/// Announces every 64-bit write on stdout, independent of the log level.
fn global_poke_line(offset: u32, value: u64) -> String {
    format!("Poke OCACCEL Global regs: {:#x}, {:#x}", offset, value)
}
