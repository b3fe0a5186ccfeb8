//! Minimal reader/writer for uncompressed 24-bit bitmaps.
use packed_struct::prelude::*;
use std::{fs::File, io::Write, path::Path};

use crate::{driver_client::RowLayout, error::*, utils::read_binary_file};

const BMP_MAGIC: u16 = 0x4D42;
const BITMAPINFOHEADER_SIZE: u32 = 40;
const BI_RGB: u32 = 0;

/// File header followed by a BITMAPINFOHEADER.
#[derive(PackedStruct, Debug, Clone, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "54")]
pub struct BmpHeader {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub file_type: u16,
    #[packed_field(bytes = "2..=5", endian = "lsb")]
    pub size: u32,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub reserved1: u16,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub reserved2: u16,
    #[packed_field(bytes = "10..=13", endian = "lsb")]
    pub offset: u32,
    #[packed_field(bytes = "14..=17", endian = "lsb")]
    pub dib_header_size: u32,
    #[packed_field(bytes = "18..=21", endian = "lsb")]
    pub width_px: i32,
    #[packed_field(bytes = "22..=25", endian = "lsb")]
    pub height_px: i32,
    #[packed_field(bytes = "26..=27", endian = "lsb")]
    pub num_planes: u16,
    #[packed_field(bytes = "28..=29", endian = "lsb")]
    pub bits_per_pixel: u16,
    #[packed_field(bytes = "30..=33", endian = "lsb")]
    pub compression: u32,
    #[packed_field(bytes = "34..=37", endian = "lsb")]
    pub image_size_bytes: u32,
    #[packed_field(bytes = "38..=41", endian = "lsb")]
    pub x_resolution_ppm: i32,
    #[packed_field(bytes = "42..=45", endian = "lsb")]
    pub y_resolution_ppm: i32,
    #[packed_field(bytes = "46..=49", endian = "lsb")]
    pub num_colors: u32,
    #[packed_field(bytes = "50..=53", endian = "lsb")]
    pub important_colors: u32,
}

impl BmpHeader {
    pub const SIZE: usize = 54;

    /// Size of the pixel array, rows padded to 4 bytes.
    pub fn computed_image_size(&self) -> usize {
        self.row_layout().image_bytes()
    }

    pub fn row_layout(&self) -> RowLayout {
        let width_px = self.width_px.unsigned_abs() as usize;
        RowLayout {
            width_px,
            height: self.height_px.unsigned_abs() as usize,
            stride: (self.bits_per_pixel as usize * width_px + 31) / 32 * 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BmpImage {
    pub header: BmpHeader,
    /// Every byte before the pixel array, written back verbatim.
    pub header_bytes: Vec<u8>,
    pub data: Vec<u8>,
}

impl BmpImage {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = read_binary_file(&path.as_ref().to_string_lossy())?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: &[u8; BmpHeader::SIZE] = bytes
            .get(..BmpHeader::SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| invalid(format!("file of {} bytes is too short", bytes.len())))?;
        let header = BmpHeader::unpack(raw)?;
        log::debug!("Bitmap header: {:?}", header);

        if header.file_type != BMP_MAGIC {
            return Err(invalid(format!("bad magic {:#06x}", header.file_type)));
        }
        if header.dib_header_size < BITMAPINFOHEADER_SIZE {
            return Err(invalid(format!(
                "unsupported DIB header of {} bytes",
                header.dib_header_size
            )));
        }
        if header.num_planes != 1 {
            return Err(invalid(format!("{} colour planes", header.num_planes)));
        }
        if header.bits_per_pixel != 24 {
            return Err(invalid(format!(
                "{} bits per pixel, only 24 is supported",
                header.bits_per_pixel
            )));
        }
        if header.compression != BI_RGB {
            return Err(invalid(format!("compression {}", header.compression)));
        }

        let offset = header.offset as usize;
        if offset < BmpHeader::SIZE || offset > bytes.len() {
            return Err(invalid(format!("pixel offset {} out of range", offset)));
        }

        let image_size = match header.image_size_bytes {
            0 => header.computed_image_size(),
            n => n as usize,
        };
        let data = bytes
            .get(offset..offset + image_size)
            .ok_or_else(|| {
                invalid(format!(
                    "pixel data truncated: {} bytes at {}, file has {}",
                    image_size,
                    offset,
                    bytes.len()
                ))
            })?
            .to_vec();

        Ok(BmpImage {
            header,
            header_bytes: bytes[..offset].to_vec(),
            data,
        })
    }

    /// Number of pixel bytes.
    pub fn image_size(&self) -> usize {
        self.data.len()
    }

    /// Writes the original header followed by the first
    /// [`image_size`](Self::image_size) bytes of `pixels`.
    pub fn write_with_pixels<P: AsRef<Path>>(&self, path: P, pixels: &[u8]) -> Result<()> {
        let pixels = pixels.get(..self.image_size()).ok_or_else(|| {
            invalid(format!(
                "{} pixel bytes for an image of {}",
                pixels.len(),
                self.image_size()
            ))
        })?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&self.header_bytes)?;
        file.write_all(pixels)?;
        crate::setter_log!(pixels, path.as_ref());
        Ok(())
    }
}

fn invalid(reason: String) -> AccelError {
    AccelError::InvalidBitmap { reason }
}

/// Builds a bitmap file in memory, mostly useful for tests and benches.
pub fn encode_bmp24(width: u32, height: u32, pixels: &[u8]) -> Result<Vec<u8>> {
    let row = (24 * width as usize + 31) / 32 * 4;
    let image_size = row * height as usize;
    if pixels.len() != image_size {
        return Err(invalid(format!(
            "{} pixel bytes for {}x{}, expected {}",
            pixels.len(),
            width,
            height,
            image_size
        )));
    }
    let header = BmpHeader {
        file_type: BMP_MAGIC,
        size: (BmpHeader::SIZE + image_size) as u32,
        reserved1: 0,
        reserved2: 0,
        offset: BmpHeader::SIZE as u32,
        dib_header_size: BITMAPINFOHEADER_SIZE,
        width_px: width as i32,
        height_px: height as i32,
        num_planes: 1,
        bits_per_pixel: 24,
        compression: BI_RGB,
        image_size_bytes: image_size as u32,
        x_resolution_ppm: 2835,
        y_resolution_ppm: 2835,
        num_colors: 0,
        important_colors: 0,
    };
    let mut out = header.pack()?.to_vec();
    out.extend_from_slice(pixels);
    Ok(out)
}
