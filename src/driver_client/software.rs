//! CPU emulation of a card, selected with `OCACCEL_CONFIG=CPU`.
//!
//! Registers live in plain maps and the image-filter action runs on the host.
use super::{dclient::*, dclient_code::*, job::*};
use crate::{error::*, image_filter::IMAGE_FILTER_ACTION_TYPE};
use std::{collections::HashMap, time::Duration};

#[derive(Debug)]
pub struct SoftwareCard {
    device: String,
    action_regs: HashMap<u64, u32>,
    global_regs: HashMap<u64, u64>,
    attached: Option<u32>,
}

impl SoftwareCard {
    pub fn new(device: &str) -> Self {
        let mut action_regs = HashMap::new();
        action_regs.insert(ACTION_ADDR::TYPE as u64, IMAGE_FILTER_ACTION_TYPE);
        action_regs.insert(ACTION_ADDR::CONTROL as u64, ACTION_CONTROL_IDLE);
        SoftwareCard {
            device: device.to_string(),
            action_regs,
            global_regs: HashMap::new(),
            attached: None,
        }
    }
}

impl Card for SoftwareCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn action_write32(&mut self, offset: u64, data: u32) -> Result<()> {
        log::debug!("Successfully set data [ {:#X?} ] to {:#X?}", data, offset);
        self.action_regs.insert(offset, data);
        Ok(())
    }

    fn action_read32(&mut self, offset: u64) -> Result<u32> {
        let res = self.action_regs.get(&offset).copied().unwrap_or(0);
        log::debug!("Getting data [ {:#X?} ] from {:#X?}", res, offset);
        Ok(res)
    }

    fn global_write64(&mut self, offset: u64, data: u64) -> Result<()> {
        log::debug!("Successfully set global [ {:#X?} ] to {:#X?}", data, offset);
        self.global_regs.insert(offset, data);
        Ok(())
    }

    fn global_read64(&mut self, offset: u64) -> Result<u64> {
        let res = self.global_regs.get(&offset).copied().unwrap_or(0);
        log::debug!("Getting global [ {:#X?} ] from {:#X?}", res, offset);
        Ok(res)
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        _flags: ActionFlags,
        _timeout: Duration,
    ) -> Result<()> {
        let found = self.action_read32(ACTION_ADDR::TYPE as u64)?;
        if found != action_type {
            return Err(AccelError::AttachTimeout { action_type, found });
        }
        self.attached = Some(action_type);
        Ok(())
    }

    fn detach_action(&mut self) -> Result<()> {
        self.attached.take().map(|_| ()).ok_or(AccelError::NotAttached)
    }

    fn execute_job(&mut self, job: &mut ImageFilterJob<'_>, _timeout: Duration) -> Result<()> {
        self.attached.ok_or(AccelError::NotAttached)?;

        let desc = job.descriptor()?;
        log::debug!("Job descriptor: {:?}", desc);
        let len = (desc.total_file_size as usize)
            .min(job.source.len())
            .min(job.destination.len());
        filter_pixels(
            &job.source.as_slice()[..len],
            &mut job.destination.as_mut_slice()[..len],
            job.pixel_map,
            job.rows,
        )?;
        self.action_regs
            .insert(ACTION_ADDR::RETC as u64, ACTION_RETC_SUCCESS);
        Ok(())
    }
}

/// Colour filter run by the image-filter action: red dominant pixels are kept,
/// every other pixel is replaced by its grey level.
///
/// Only the first `rows.width_px` pixels of each row are filtered. Row padding,
/// a trailing partial pixel and any bytes past the last row are copied
/// unchanged.
pub fn filter_pixels(
    src: &[u8],
    dst: &mut [u8],
    pixel_map: PixelMap,
    rows: RowLayout,
) -> Result<()> {
    if src.len() != dst.len() {
        return Err(AccelError::BufferMismatch {
            source_len: src.len(),
            destination_len: dst.len(),
        });
    }
    if rows.stride == 0 || rows.pixel_bytes() > rows.stride {
        return Err(AccelError::InvalidBitmap {
            reason: format!(
                "row of {} pixels does not fit a stride of {} bytes",
                rows.width_px, rows.stride
            ),
        });
    }

    dst.copy_from_slice(src);
    let image = rows.image_bytes().min(src.len());
    match pixel_map {
        PixelMap::Bgr24 => src[..image]
            .chunks(rows.stride)
            .zip(dst[..image].chunks_mut(rows.stride))
            .for_each(|(row, out)| {
                let pixels = rows.pixel_bytes().min(row.len());
                let whole = pixels - pixels % 3;
                filter_row(&row[..whole], &mut out[..whole]);
            }),
    }
    Ok(())
}

fn filter_row(src: &[u8], dst: &mut [u8]) {
    src.chunks_exact(3)
        .zip(dst.chunks_exact_mut(3))
        .for_each(|(px, out)| {
            let (b, g, r) = (px[0], px[1], px[2]);
            if r > g && r > b {
                out.copy_from_slice(px);
            } else {
                out.fill(grey_level(r, g, b));
            }
        });
}

fn grey_level(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_dominant_pixels_are_kept() {
        let src = [10, 20, 200, 0, 0, 255];
        let mut dst = [0u8; 6];
        filter_pixels(&src, &mut dst, PixelMap::Bgr24, RowLayout::unpadded(6)).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn other_pixels_become_grey() {
        // pure green, pure blue, white, red tie with green
        let src = [0, 255, 0, 255, 0, 0, 255, 255, 255, 0, 100, 100];
        let mut dst = [0u8; 12];
        filter_pixels(&src, &mut dst, PixelMap::Bgr24, RowLayout::unpadded(12)).unwrap();
        assert_eq!(&dst[0..3], &[149, 149, 149]);
        assert_eq!(&dst[3..6], &[28, 28, 28]);
        assert_eq!(&dst[6..9], &[255, 255, 255]);
        assert_eq!(&dst[9..12], &[88, 88, 88]);
    }

    #[test]
    fn partial_pixel_tail_is_copied() {
        let src = [0, 255, 0, 7, 9];
        let mut dst = [0u8; 5];
        filter_pixels(&src, &mut dst, PixelMap::Bgr24, RowLayout::unpadded(5)).unwrap();
        assert_eq!(&dst[3..], &[7, 9]);
    }

    #[test]
    fn row_padding_is_copied_not_filtered() {
        // 1 pixel wide, 2 rows, each padded to 4 bytes, then 8 bytes of DMA tail
        let rows = RowLayout {
            width_px: 1,
            height: 2,
            stride: 4,
        };
        let mut src = vec![0, 255, 0, 0, 0, 255, 0, 0];
        src.extend_from_slice(&[0, 255, 0, 0, 0, 255, 0, 0]);
        let mut dst = vec![0u8; src.len()];
        filter_pixels(&src, &mut dst, PixelMap::Bgr24, rows).unwrap();
        assert_eq!(&dst[0..4], &[149, 149, 149, 0]);
        assert_eq!(&dst[4..8], &[149, 149, 149, 0]);
        assert_eq!(&dst[8..], &src[8..]);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let src = [0u8; 6];
        let mut dst = [0u8; 3];
        let err = filter_pixels(&src, &mut dst, PixelMap::Bgr24, RowLayout::unpadded(6))
            .unwrap_err();
        assert!(matches!(
            err,
            AccelError::BufferMismatch {
                source_len: 6,
                destination_len: 3
            }
        ));
    }

    #[test]
    fn stride_shorter_than_row_is_rejected() {
        let rows = RowLayout {
            width_px: 2,
            height: 1,
            stride: 4,
        };
        let src = [0u8; 8];
        let mut dst = [0u8; 8];
        assert!(matches!(
            filter_pixels(&src, &mut dst, PixelMap::Bgr24, rows),
            Err(AccelError::InvalidBitmap { .. })
        ));
    }

    #[test]
    fn software_card_keeps_registers() {
        let mut card = SoftwareCard::new("IBM,oc-accel");
        card.action_write32(0x100, 0xdead_beef).unwrap();
        card.global_write64(0x8, 0x0123_4567_89ab_cdef).unwrap();
        assert_eq!(card.action_read32(0x100).unwrap(), 0xdead_beef);
        assert_eq!(card.global_read64(0x8).unwrap(), 0x0123_4567_89ab_cdef);
        assert_eq!(card.global_read64(0x10).unwrap(), 0);
    }

    #[test]
    fn software_card_rejects_unknown_action() {
        let mut card = SoftwareCard::new("IBM,oc-snap");
        let err = card
            .attach_action(0x1234, ActionFlags::NONE, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, AccelError::AttachTimeout { found, .. } if found == IMAGE_FILTER_ACTION_TYPE));
        assert!(matches!(card.detach_action(), Err(AccelError::NotAttached)));
    }
}
