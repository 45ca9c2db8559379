//! Conversion error taxonomy.
//!
//! Every variant is a local condition the caller can recover from,
//! typically by dropping the frame. The converter surfaces them unchanged.

use core::fmt;

use crate::format::FormatTag;
use crate::limits::LimitExceeded;
use crate::plane::BufferError;

/// The buffer's memory could not be locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LockError {
    /// Someone else holds a conflicting lock.
    AlreadyLocked,
    /// The backing store was reclaimed by its producer.
    Reclaimed,
    /// Platform-specific failure status.
    Status(i32),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyLocked => write!(f, "buffer is already locked"),
            Self::Reclaimed => write!(f, "buffer backing store was reclaimed"),
            Self::Status(code) => write!(f, "lock failed with status {code}"),
        }
    }
}

impl core::error::Error for LockError {}

/// A drawing context could not be created for the locked memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    /// Width or height is zero.
    InvalidDimensions {
        /// Buffer width.
        width: u32,
        /// Buffer height.
        height: u32,
    },
    /// The format needs a plane the buffer does not expose.
    MissingPlane {
        /// Plane index.
        plane: usize,
    },
    /// A plane's stride or length does not fit its dimensions.
    InvalidPlane {
        /// Plane index.
        plane: usize,
        /// What was wrong with it.
        error: BufferError,
    },
    /// A configured limit rejected the frame.
    LimitExceeded(LimitExceeded),
    /// The output allocation failed.
    AllocationFailed {
        /// Bytes requested.
        bytes: usize,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid dimensions {width}x{height}")
            }
            Self::MissingPlane { plane } => write!(f, "plane {plane} is missing"),
            Self::InvalidPlane { plane, error } => write!(f, "plane {plane}: {error}"),
            Self::LimitExceeded(e) => write!(f, "{e}"),
            Self::AllocationFailed { bytes } => {
                write!(f, "failed to allocate {bytes} bytes")
            }
        }
    }
}

impl core::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::InvalidPlane { error, .. } => Some(error),
            Self::LimitExceeded(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LimitExceeded> for ContextError {
    fn from(e: LimitExceeded) -> Self {
        Self::LimitExceeded(e)
    }
}

/// Why a pixel buffer could not be converted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConversionError {
    /// Buffer memory could not be acquired. Nothing else was attempted.
    LockFailed(LockError),
    /// The format tag is not recognized by the drawing context.
    /// The buffer was unlocked before returning.
    UnsupportedFormat(FormatTag),
    /// The drawing context could not be created or allocated.
    /// The buffer was unlocked before returning.
    ContextCreationFailed(ContextError),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockFailed(e) => write!(f, "failed to lock pixel buffer: {e}"),
            Self::UnsupportedFormat(tag) => write!(f, "unsupported pixel format {tag}"),
            Self::ContextCreationFailed(e) => {
                write!(f, "failed to create drawing context: {e}")
            }
        }
    }
}

impl core::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::LockFailed(e) => Some(e),
            Self::UnsupportedFormat(_) => None,
            Self::ContextCreationFailed(e) => Some(e),
        }
    }
}

impl From<LockError> for ConversionError {
    fn from(e: LockError) -> Self {
        Self::LockFailed(e)
    }
}

impl From<ContextError> for ConversionError {
    fn from(e: ContextError) -> Self {
        Self::ContextCreationFailed(e)
    }
}
