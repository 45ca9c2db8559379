//! Lockable pixel buffer capability and its scoped lock guard.
//!
//! A [`LockableBuffer`] is a borrowed handle to memory owned by a capture
//! or decode pipeline. Its base address is only valid while locked, so
//! plane access goes through a [`BufferLock`] guard: the guard locks on
//! [`acquire`](BufferLock::acquire), hands out plane views tied to its own
//! lifetime, and unlocks exactly once when dropped. Early returns, `?`
//! and unwinding all release the lock.

use core::fmt;

use crate::color::YCbCrMatrix;
use crate::error::LockError;
use crate::format::FormatTag;

/// Flags passed to [`LockableBuffer::lock`] and [`LockableBuffer::unlock`].
///
/// Unlock must be called with the same flags used to lock.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LockFlags(u64);

impl LockFlags {
    /// The caller will not modify the memory. Lets GPU-backed producers
    /// skip invalidating their caches on unlock.
    pub const READ_ONLY: Self = Self(0x1);

    /// No flags (read-write lock).
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw flag bits, for passing through to a platform API.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Debug for LockFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(Self::READ_ONLY) {
            f.write_str("LockFlags(READ_ONLY)")
        } else {
            write!(f, "LockFlags({:#x})", self.0)
        }
    }
}

/// One plane of locked memory as reported by the producer.
///
/// `data` starts at the plane's base address and must cover at least
/// `(height - 1) * bytes_per_row + width * bytes_per_pixel` bytes.
#[derive(Clone, Copy, Debug)]
pub struct RawPlane<'a> {
    /// Plane memory, valid only while the buffer is locked.
    pub data: &'a [u8],
    /// Width of the plane in samples.
    pub width: u32,
    /// Height of the plane in rows.
    pub height: u32,
    /// Stride in bytes, padding included.
    pub bytes_per_row: usize,
}

/// A pixel buffer whose memory must be locked for CPU access.
///
/// Implemented by platform wrappers (for example over a CoreVideo pixel
/// buffer) and by [`MemoryPixelBuffer`](crate::MemoryPixelBuffer).
/// Methods take `&self`: locking is a state change of the producer's
/// buffer, not of the handle.
///
/// Callers must serialize access to a given buffer instance; overlapping
/// lock attempts on the same memory are the implementor's to reject.
pub trait LockableBuffer {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Declared pixel format.
    fn format_tag(&self) -> FormatTag;

    /// Number of memory planes (1 for packed formats).
    fn plane_count(&self) -> usize;

    /// YCbCr matrix attached by the producer, if any.
    fn ycbcr_matrix(&self) -> Option<YCbCrMatrix> {
        None
    }

    /// Lock the base address for CPU access.
    fn lock(&self, flags: LockFlags) -> Result<(), LockError>;

    /// Release a lock taken with the same `flags`.
    fn unlock(&self, flags: LockFlags);

    /// Plane `index` of the locked memory.
    ///
    /// Returns `None` if the buffer is not locked or `index` is out of
    /// range.
    fn plane(&self, index: usize) -> Option<RawPlane<'_>>;
}

impl<B: LockableBuffer + ?Sized> LockableBuffer for &B {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn format_tag(&self) -> FormatTag {
        (**self).format_tag()
    }

    fn plane_count(&self) -> usize {
        (**self).plane_count()
    }

    fn ycbcr_matrix(&self) -> Option<YCbCrMatrix> {
        (**self).ycbcr_matrix()
    }

    fn lock(&self, flags: LockFlags) -> Result<(), LockError> {
        (**self).lock(flags)
    }

    fn unlock(&self, flags: LockFlags) {
        (**self).unlock(flags)
    }

    fn plane(&self, index: usize) -> Option<RawPlane<'_>> {
        (**self).plane(index)
    }
}

/// Scoped lock on a [`LockableBuffer`].
///
/// Holds the lock from a successful [`acquire`](Self::acquire) until drop.
/// Plane views borrow the guard, so they cannot outlive the lock.
#[must_use = "the buffer is unlocked as soon as the guard is dropped"]
pub struct BufferLock<'a, B: LockableBuffer + ?Sized> {
    buffer: &'a B,
    flags: LockFlags,
}

impl<'a, B: LockableBuffer + ?Sized> BufferLock<'a, B> {
    /// Lock `buffer` with `flags`.
    ///
    /// # Errors
    ///
    /// Returns the producer's [`LockError`]. No guard exists in that case,
    /// so nothing will be unlocked.
    pub fn acquire(buffer: &'a B, flags: LockFlags) -> Result<Self, LockError> {
        buffer.lock(flags)?;
        Ok(Self { buffer, flags })
    }

    /// The locked buffer.
    #[inline]
    pub fn buffer(&self) -> &'a B {
        self.buffer
    }

    /// Flags the lock was taken with.
    #[inline]
    pub fn flags(&self) -> LockFlags {
        self.flags
    }

    /// Plane `index` of the locked memory.
    #[inline]
    pub fn plane(&self, index: usize) -> Option<RawPlane<'_>> {
        self.buffer.plane(index)
    }
}

impl<B: LockableBuffer + ?Sized> Drop for BufferLock<'_, B> {
    fn drop(&mut self) {
        self.buffer.unlock(self.flags);
    }
}

impl<B: LockableBuffer + ?Sized> fmt::Debug for BufferLock<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferLock({}x{}, {}, {:?})",
            self.buffer.width(),
            self.buffer.height(),
            self.buffer.format_tag(),
            self.flags
        )
    }
}
