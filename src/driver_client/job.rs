//! Fixed-layout job record exchanged with the image-filter action.
//!
//! The action reads the descriptor from its MMIO job area, so the layout here
//! is little-endian and exactly [`JobDescriptor::SIZE`] bytes. Nothing outside
//! the driver client sees this record: callers describe a job with
//! [`ImageFilterJob`] and the card backend packs it.
use packed_struct::prelude::*;

use crate::{error::*, image_filter::DmaBuffer};

/// Address space a memory descriptor points into.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddrType {
    HostDram = 0x0000,
    CardDram = 0x0001,
    Unused = 0xffff,
}

pub const ADDRFLAG_ADDR: u16 = 0x0001;
pub const ADDRFLAG_SRC: u16 = 0x0002;
pub const ADDRFLAG_DST: u16 = 0x0004;
pub const ADDRFLAG_END: u16 = 0x0100;

/// Organisation of the pixels handed to the filter.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PixelMap {
    #[default]
    Bgr24 = 0,
}

/// Row geometry of the pixel array. Bitmap rows are padded to a multiple of
/// four bytes; the padding is not pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RowLayout {
    pub width_px: usize,
    pub height: usize,
    /// Bytes per row including padding.
    pub stride: usize,
}

impl RowLayout {
    /// A single unpadded row covering `len` bytes of BGR24 pixels.
    pub fn unpadded(len: usize) -> Self {
        RowLayout {
            width_px: len / 3,
            height: 1,
            stride: len,
        }
    }

    pub fn pixel_bytes(&self) -> usize {
        self.width_px * 3
    }

    pub fn image_bytes(&self) -> usize {
        self.stride * self.height
    }
}

/// One invocation of the image-filter action.
pub struct ImageFilterJob<'a> {
    pub source: &'a DmaBuffer,
    pub destination: &'a mut DmaBuffer,
    pub total_file_size: u32,
    pub first_pixel_offset: u8,
    pub pixel_map: PixelMap,
    pub rows: RowLayout,
}

impl ImageFilterJob<'_> {
    /// Builds the packed descriptor. Addresses are the host virtual addresses
    /// of the two buffers.
    pub fn descriptor(&self) -> Result<JobDescriptor> {
        Ok(JobDescriptor {
            in_addr: self.source.as_slice().as_ptr() as u64,
            in_size: buffer_size(self.source)?,
            in_type: AddrType::HostDram as u16,
            in_flags: ADDRFLAG_ADDR | ADDRFLAG_SRC,
            out_addr: self.destination.as_slice().as_ptr() as u64,
            out_size: buffer_size(self.destination)?,
            out_type: AddrType::HostDram as u16,
            out_flags: ADDRFLAG_ADDR | ADDRFLAG_DST | ADDRFLAG_END,
            total_file_size: self.total_file_size,
            first_pixel_offset: self.first_pixel_offset,
            reserved0: [0; 3],
            pixel_map_type: self.pixel_map as u32,
            reserved1: 0,
        })
    }
}

fn buffer_size(buf: &DmaBuffer) -> Result<u32> {
    u32::try_from(buf.len()).map_err(|_| AccelError::InvalidBitmap {
        reason: format!("buffer of {} bytes exceeds the job size field", buf.len()),
    })
}

#[derive(PackedStruct, Debug, Clone, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "48")]
pub struct JobDescriptor {
    #[packed_field(bytes = "0..=7", endian = "lsb")]
    pub in_addr: u64,
    #[packed_field(bytes = "8..=11", endian = "lsb")]
    pub in_size: u32,
    #[packed_field(bytes = "12..=13", endian = "lsb")]
    pub in_type: u16,
    #[packed_field(bytes = "14..=15", endian = "lsb")]
    pub in_flags: u16,
    #[packed_field(bytes = "16..=23", endian = "lsb")]
    pub out_addr: u64,
    #[packed_field(bytes = "24..=27", endian = "lsb")]
    pub out_size: u32,
    #[packed_field(bytes = "28..=29", endian = "lsb")]
    pub out_type: u16,
    #[packed_field(bytes = "30..=31", endian = "lsb")]
    pub out_flags: u16,
    #[packed_field(bytes = "32..=35", endian = "lsb")]
    pub total_file_size: u32,
    #[packed_field(bytes = "36")]
    pub first_pixel_offset: u8,
    #[packed_field(bytes = "37..=39")]
    pub reserved0: [u8; 3],
    #[packed_field(bytes = "40..=43", endian = "lsb")]
    pub pixel_map_type: u32,
    #[packed_field(bytes = "44..=47", endian = "lsb")]
    pub reserved1: u32,
}

impl JobDescriptor {
    pub const SIZE: usize = 48;

    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        Ok(self.pack()?)
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Result<Self> {
        Ok(Self::unpack(bytes)?)
    }
}
