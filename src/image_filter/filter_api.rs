//! Submits a bitmap to the image-filter action and writes the result.
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use super::{bmp::BmpImage, dma_buffer::DmaBuffer, filter_cfg::*};
use crate::{driver_client::*, error::*};

/// Result of a successful filter run.
#[derive(Debug)]
pub struct FilterOutcome {
    /// Size of the DMA buffers handed to the action.
    pub dma_size: usize,
    pub elapsed: Duration,
    pub written: Option<PathBuf>,
}

impl FilterOutcome {
    /// Job duration line printed after every run.
    pub fn elapsed_report(&self) -> String {
        format!("elaps time {} micro seconds.", self.elapsed.as_micros())
    }
}

pub struct ImageFilterClient {
    cfg: CardConfig,
    opener: Box<dyn CardOpener>,
}

impl ImageFilterClient {
    /// Client for the backend selected by `mode`.
    pub fn new(mode: AccelMode) -> Self {
        let cfg = CardConfig::card_cfg(CardFamily::Snap);
        let opener = card_opener(mode, &cfg);
        ImageFilterClient { cfg, opener }
    }

    pub fn with_opener(opener: Box<dyn CardOpener>) -> Self {
        ImageFilterClient {
            cfg: CardConfig::card_cfg(CardFamily::Snap),
            opener,
        }
    }

    /// Runs `image` through the action on card `params.card_no`.
    ///
    /// The card, the attached action and both buffers are released on every
    /// return path. The output file is only written when the job succeeds.
    pub fn run(&self, image: &BmpImage, params: &FilterParams) -> Result<FilterOutcome> {
        let source = DmaBuffer::from_slice(&image.data);
        let dma_size = source.len();
        log::debug!(
            "Image of {} bytes in DMA buffer of {} bytes",
            image.image_size(),
            dma_size
        );

        let mut card =
            CardHandle::open(self.opener.as_ref(), &self.cfg, params.card_no).map_err(|e| {
                log::error!("err: failed to open card {}: {}", params.card_no, e);
                log::error!("Default mode is FPGA mode.");
                log::error!(
                    "Did you want to run CPU mode ? => add {}=CPU before your command.",
                    ACCEL_CONFIG_ENV
                );
                log::error!("Otherwise make sure you ran card discovery and maintenance for your selected card.");
                e
            })?;

        let mut action = card.attach(
            IMAGE_FILTER_ACTION_TYPE,
            ActionFlags::DONE_IRQ,
            ATTACH_TIMEOUT,
        )?;

        let mut destination = DmaBuffer::new(dma_size);
        let mut job = ImageFilterJob {
            source: &source,
            destination: &mut destination,
            total_file_size: u32::try_from(dma_size).map_err(|_| AccelError::InvalidBitmap {
                reason: format!("image of {} bytes is too large", dma_size),
            })?,
            first_pixel_offset: 0,
            pixel_map: PixelMap::Bgr24,
            rows: image.header.row_layout(),
        };

        let start = Instant::now();
        let rc = action.execute_job(&mut job, params.job_timeout);
        let elapsed = start.elapsed();
        log::debug!("Job finished after {} micro seconds", elapsed.as_micros());
        rc?;

        if let Some(output) = &params.output {
            image.write_with_pixels(output, destination.as_slice())?;
            log::info!("Wrote filtered image to {}", output.display());
        }

        Ok(FilterOutcome {
            dma_size,
            elapsed,
            written: params.output.clone(),
        })
    }
}
