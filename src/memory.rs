//! In-memory [`LockableBuffer`] with lock accounting.

use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use crate::buffer::{LockFlags, LockableBuffer, RawPlane};
use crate::color::YCbCrMatrix;
use crate::error::LockError;
use crate::format::FormatTag;
use crate::plane::BufferError;

/// Owned memory for one plane.
#[derive(Clone, Debug)]
pub struct MemoryPlane {
    data: Vec<u8>,
    width: u32,
    height: u32,
    bytes_per_row: usize,
}

impl MemoryPlane {
    /// Wrap `data` as a plane of `height` rows, `bytes_per_row` apart.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InsufficientData`] if `data` is shorter than
    /// `bytes_per_row * height`, or [`BufferError::InvalidDimensions`] if
    /// that product overflows.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        let total = bytes_per_row
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        if data.len() < total {
            return Err(BufferError::InsufficientData);
        }
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    /// Zero-filled plane of `bytes_per_row * height` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidDimensions`] if the size overflows.
    pub fn zeroed(width: u32, height: u32, bytes_per_row: usize) -> Result<Self, BufferError> {
        let total = bytes_per_row
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        Self::new(width, height, bytes_per_row, vec![0u8; total])
    }

    /// Stride in bytes.
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Plane bytes, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A [`LockableBuffer`] backed by owned planes.
///
/// Useful for producers that already hold frames in RAM, and as a test
/// double: it rejects overlapping locks with [`LockError::AlreadyLocked`],
/// hides its planes while unlocked, and counts lock and unlock calls so
/// callers can verify they are paired.
///
/// Not `Sync`; hand each buffer to one thread at a time.
pub struct MemoryPixelBuffer {
    width: u32,
    height: u32,
    tag: FormatTag,
    planes: Vec<MemoryPlane>,
    matrix: Option<YCbCrMatrix>,
    held: Cell<Option<LockFlags>>,
    lock_calls: Cell<u32>,
    unlock_calls: Cell<u32>,
    pending_failure: Cell<Option<LockError>>,
}

impl MemoryPixelBuffer {
    /// Build a buffer from explicit planes.
    pub fn from_planes(width: u32, height: u32, tag: FormatTag, planes: Vec<MemoryPlane>) -> Self {
        Self {
            width,
            height,
            tag,
            planes,
            matrix: None,
            held: Cell::new(None),
            lock_calls: Cell::new(0),
            unlock_calls: Cell::new(0),
            pending_failure: Cell::new(None),
        }
    }

    /// Single-plane buffer with `bytes_per_row` stride.
    ///
    /// # Errors
    ///
    /// See [`MemoryPlane::new`].
    pub fn packed(
        width: u32,
        height: u32,
        tag: FormatTag,
        bytes_per_row: usize,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        let plane = MemoryPlane::new(width, height, bytes_per_row, data)?;
        Ok(Self::from_planes(width, height, tag, vec![plane]))
    }

    /// Two-plane 4:2:0 buffer: full-resolution luma, then interleaved
    /// chroma at `ceil(width / 2) × ceil(height / 2)` samples.
    ///
    /// Each plane is given as `(bytes_per_row, data)`.
    ///
    /// # Errors
    ///
    /// See [`MemoryPlane::new`].
    pub fn bi_planar(
        width: u32,
        height: u32,
        tag: FormatTag,
        luma: (usize, Vec<u8>),
        chroma: (usize, Vec<u8>),
    ) -> Result<Self, BufferError> {
        let y = MemoryPlane::new(width, height, luma.0, luma.1)?;
        let c = MemoryPlane::new(width.div_ceil(2), height.div_ceil(2), chroma.0, chroma.1)?;
        Ok(Self::from_planes(width, height, tag, vec![y, c]))
    }

    /// Attach a YCbCr matrix, as a decoder would.
    pub fn with_ycbcr_matrix(mut self, matrix: YCbCrMatrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Make the next [`lock`](LockableBuffer::lock) fail with `error`.
    pub fn fail_next_lock(&self, error: LockError) {
        self.pending_failure.set(Some(error));
    }

    /// Number of locks currently held (0 or 1).
    pub fn lock_count(&self) -> u32 {
        u32::from(self.held.get().is_some())
    }

    /// Successful lock calls so far.
    pub fn lock_calls(&self) -> u32 {
        self.lock_calls.get()
    }

    /// Unlock calls so far, including unbalanced ones.
    pub fn unlock_calls(&self) -> u32 {
        self.unlock_calls.get()
    }

    /// Mutable plane bytes, for a producer refilling a recycled buffer.
    ///
    /// Requires `&mut self`, so no lock or plane view can be alive.
    pub fn plane_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(|p| p.data.as_mut_slice())
    }
}

impl LockableBuffer for MemoryPixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format_tag(&self) -> FormatTag {
        self.tag
    }

    fn plane_count(&self) -> usize {
        self.planes.len()
    }

    fn ycbcr_matrix(&self) -> Option<YCbCrMatrix> {
        self.matrix
    }

    fn lock(&self, flags: LockFlags) -> Result<(), LockError> {
        if let Some(error) = self.pending_failure.take() {
            return Err(error);
        }
        if self.held.get().is_some() {
            return Err(LockError::AlreadyLocked);
        }
        self.held.set(Some(flags));
        self.lock_calls.set(self.lock_calls.get() + 1);
        Ok(())
    }

    fn unlock(&self, flags: LockFlags) {
        self.unlock_calls.set(self.unlock_calls.get() + 1);
        if self.held.get() == Some(flags) {
            self.held.set(None);
        }
    }

    fn plane(&self, index: usize) -> Option<RawPlane<'_>> {
        self.held.get()?;
        let plane = self.planes.get(index)?;
        Some(RawPlane {
            data: &plane.data,
            width: plane.width,
            height: plane.height,
            bytes_per_row: plane.bytes_per_row,
        })
    }
}

impl fmt::Debug for MemoryPixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryPixelBuffer({}x{}, {}, {} planes, locked: {})",
            self.width,
            self.height,
            self.tag,
            self.planes.len(),
            self.held.get().is_some()
        )
    }
}
