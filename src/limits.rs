//! Caps on the bitmap a conversion may produce.
//!
//! A 4:2:0 frame expands to four bytes per pixel on output, so the
//! allocation a drawing context makes can be several times larger than the
//! locked buffer. [`ConversionLimits::admit`] checks a locked frame against
//! the caps and yields the exact number of bytes to allocate, before any
//! pixel is touched.

use crate::error::ContextError;
use crate::image::ImageDescriptor;
use crate::sink::SourceFrame;

/// Caps applied to a frame before its output bitmap is allocated.
///
/// Caps measure the frame in pixels and the output in bytes. Row padding in
/// the source buffer never counts against them.
///
/// # Example
///
/// ```
/// use zenframe::ConversionLimits;
///
/// // Enough for 8K equirect video, with four bytes per output pixel.
/// let limits = ConversionLimits::none()
///     .with_max_width(7680)
///     .with_max_height(3840)
///     .with_max_output_bytes(7680 * 3840 * 4);
/// assert!(limits.check_extent(3840, 1920).is_ok());
/// assert!(limits.check_extent(7681, 1).is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConversionLimits {
    /// Widest frame accepted, in pixels.
    pub max_width: Option<u32>,
    /// Tallest frame accepted, in pixels.
    pub max_height: Option<u32>,
    /// Largest `width * height` accepted.
    pub max_pixels: Option<u64>,
    /// Largest output bitmap accepted, in bytes.
    pub max_output_bytes: Option<usize>,
}

impl ConversionLimits {
    /// No caps.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = Some(pixels);
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }

    /// Check a frame's width, height and pixel count, in that order.
    pub fn check_extent(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_width.filter(|&max| width > max) {
            return Err(LimitExceeded::Width { width, max });
        }
        if let Some(max) = self.max_height.filter(|&max| height > max) {
            return Err(LimitExceeded::Height { height, max });
        }
        let pixels = u64::from(width) * u64::from(height);
        match self.max_pixels {
            Some(max) if pixels > max => Err(LimitExceeded::Pixels { pixels, max }),
            _ => Ok(()),
        }
    }

    /// Admit `frame` for drawing into a bitmap described by `descriptor`.
    ///
    /// Returns the size of the tightly packed output in bytes.
    ///
    /// # Errors
    ///
    /// [`ContextError::LimitExceeded`] if a cap is exceeded, or
    /// [`ContextError::InvalidDimensions`] if the output size does not fit
    /// in `usize`.
    pub fn admit(
        &self,
        frame: &SourceFrame<'_>,
        descriptor: ImageDescriptor,
    ) -> Result<usize, ContextError> {
        let (width, height) = (frame.width(), frame.height());
        self.check_extent(width, height)?;
        let bytes = (width as usize)
            .checked_mul(descriptor.bytes_per_pixel())
            .and_then(|row| row.checked_mul(height as usize))
            .ok_or(ContextError::InvalidDimensions { width, height })?;
        match self.max_output_bytes {
            Some(max) if bytes > max => Err(LimitExceeded::OutputBytes { bytes, max }.into()),
            _ => Ok(bytes),
        }
    }
}

/// A frame was rejected by a [`ConversionLimits`] cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitExceeded {
    Width { width: u32, max: u32 },
    Height { height: u32, max: u32 },
    Pixels { pixels: u64, max: u64 },
    /// The output bitmap would have been `bytes` long.
    OutputBytes { bytes: usize, max: usize },
}

impl core::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Width { width, max } => write!(f, "frame width {width} exceeds cap {max}"),
            Self::Height { height, max } => write!(f, "frame height {height} exceeds cap {max}"),
            Self::Pixels { pixels, max } => {
                write!(f, "frame of {pixels} pixels exceeds cap {max}")
            }
            Self::OutputBytes { bytes, max } => {
                write!(f, "output bitmap of {bytes} bytes exceeds cap {max}")
            }
        }
    }
}

impl core::error::Error for LimitExceeded {}
