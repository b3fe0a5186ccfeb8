use crate::utils::align_up;

/// Alignment the accelerator requires for DMA memory.
pub const DMA_ALIGNMENT: usize = 64;

#[repr(C, align(64))]
#[derive(Clone, Copy)]
pub struct Align64([u8; DMA_ALIGNMENT]);

/// Zero-initialised host buffer the accelerator can DMA into and out of.
///
/// The length is always rounded up to a multiple of [`DMA_ALIGNMENT`] and the
/// memory is released when the buffer is dropped.
pub struct DmaBuffer(Vec<Align64>);

impl DmaBuffer {
    pub fn new(n_bytes: usize) -> Self {
        let n_blocks = align_up(n_bytes, DMA_ALIGNMENT) / DMA_ALIGNMENT;
        log::trace!("Allocating DMA buffer of {} bytes", n_blocks * DMA_ALIGNMENT);
        Self(vec![Align64([0; DMA_ALIGNMENT]); n_blocks])
    }

    /// Allocates a buffer large enough for `data` and copies it in; the
    /// padding stays zero.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut buf = Self::new(data.len());
        buf.as_mut_slice()[..data.len()].copy_from_slice(data);
        buf
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: Align64 is a plain byte array without padding, so the
        // vector is `len()` contiguous initialised bytes.
        unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len();
        // SAFETY: see `as_slice`; the mutable borrow of self guards aliasing.
        unsafe { std::slice::from_raw_parts_mut(self.0.as_mut_ptr() as *mut u8, len) }
    }

    pub fn len(&self) -> usize {
        self.0.len() * DMA_ALIGNMENT
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("addr", &self.as_slice().as_ptr())
            .field("len", &self.len())
            .finish()
    }
}
