//! Lock-scoped conversion of video pixel buffers into renderable images.
//!
//! Video decoders and capture pipelines hand out frames as lockable,
//! possibly padded, possibly multi-planar pixel buffers. This crate turns
//! one such buffer into a self-contained 8-bit four-channel image that a
//! renderer can upload as a texture:
//!
//! - [`LockableBuffer`]: the lock/unlock/plane capability a producer implements
//! - [`BufferLock`]: RAII guard that unlocks on every exit path
//! - [`PixelFormat`] / [`FormatTag`]: four-character format codes and their layouts
//! - [`Plane`]: stride-validated view over locked plane memory
//! - [`ImageSink`] / [`BitmapContext`]: the drawing context a frame is rendered into
//! - [`PixelBufferConverter`]: lock, read, draw, unlock
//! - [`RenderableImage`]: the immutable result
//! - [`MemoryPixelBuffer`]: owned in-memory buffer with lock accounting
//!
//! ```
//! use zenframe::{MemoryPixelBuffer, PixelFormat};
//!
//! // 2x2 BGRA with 4 bytes of row padding.
//! let data = vec![0x20; 12 * 2];
//! let buffer = MemoryPixelBuffer::packed(2, 2, PixelFormat::BGRA32_TAG, 12, data)?;
//! let image = zenframe::convert(&buffer)?;
//! assert_eq!((image.width(), image.height()), (2, 2));
//! assert_eq!(image.stride(), 8);
//! assert_eq!(buffer.lock_count(), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod buffer;
mod color;
mod convert;
mod error;
mod format;
mod image;
mod limits;
mod memory;
mod plane;
mod sink;

pub use buffer::{BufferLock, LockFlags, LockableBuffer, RawPlane};
pub use color::{YCbCrConverter, YCbCrMatrix, YCbCrRange};
pub use convert::{ConvertOptions, PixelBufferConverter, convert};
pub use error::{ContextError, ConversionError, LockError};
pub use format::{FormatTag, PixelFormat};
pub use image::{AlphaMode, ImageDescriptor, OutputLayout, RenderableImage};
pub use limits::{ConversionLimits, LimitExceeded};
pub use memory::{MemoryPixelBuffer, MemoryPlane};
pub use plane::{BufferError, Plane};
pub use sink::{BitmapContext, ImageSink, SourceFrame};

// Pixel types used by the `ImgVec` accessors on `RenderableImage`.
pub use imgref::{ImgRef, ImgVec};
pub use rgb;
pub use rgb::Rgba;
pub use rgb::alt::BGRA as Bgra;
