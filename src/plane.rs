//! Stride-aware views over locked plane memory.
//!
//! A [`Plane`] is a validated, borrowed view of one memory plane. Rows are
//! addressed by `y * stride`; the stride may include alignment padding and
//! is never assumed to equal `width * bytes_per_pixel`.

use core::fmt;

/// Errors from validating a plane layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BufferError {
    /// Data slice is too small for the given dimensions and stride.
    InsufficientData,
    /// Stride is smaller than `width * bytes_per_pixel`.
    StrideTooSmall,
    /// Width or height is zero or causes overflow.
    InvalidDimensions,
    /// Plane sample size does not match the pixel format.
    FormatMismatch,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData => {
                write!(f, "data slice is too small for the given dimensions")
            }
            Self::StrideTooSmall => write!(f, "stride is smaller than width * bytes_per_pixel"),
            Self::InvalidDimensions => write!(f, "width or height is zero or causes overflow"),
            Self::FormatMismatch => write!(f, "plane layout does not match the pixel format"),
        }
    }
}

impl core::error::Error for BufferError {}

/// Borrowed view of one plane of pixel data.
///
/// All rows share the same stride. The last row only needs
/// `width * bytes_per_pixel` bytes, so producers that trim trailing
/// padding from the final row are accepted.
#[derive(Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    width: u32,
    rows: u32,
    stride: usize,
    bytes_per_pixel: usize,
}

impl<'a> Plane<'a> {
    /// Create a plane view with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero, `width * bytes_per_pixel`
    /// overflows, the stride is too small, or the data is too short.
    pub fn new(
        data: &'a [u8],
        width: u32,
        rows: u32,
        stride: usize,
        bytes_per_pixel: usize,
    ) -> Result<Self, BufferError> {
        if width == 0 || rows == 0 || bytes_per_pixel == 0 {
            return Err(BufferError::InvalidDimensions);
        }
        let min_stride = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or(BufferError::InvalidDimensions)?;
        if stride < min_stride {
            return Err(BufferError::StrideTooSmall);
        }
        let required = required_bytes(rows, stride, min_stride)?;
        if data.len() < required {
            return Err(BufferError::InsufficientData);
        }
        Ok(Self {
            data,
            width,
            rows,
            stride,
            bytes_per_pixel,
        })
    }

    /// Plane width in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Byte stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes per sample.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Bytes of pixel data in one row, excluding padding.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    /// Pixel bytes for row `y` (no padding, exactly `width * bpp` bytes).
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Full stride bytes for row `y`, including padding.
    ///
    /// The last row is cut short if the producer trimmed its padding.
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    pub fn row_with_stride(&self, y: u32) -> &'a [u8] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let start = y as usize * self.stride;
        let end = (start + self.stride).min(self.data.len());
        &self.data[start..end]
    }
}

impl fmt::Debug for Plane<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plane({}x{}, stride {}, {} bpp)",
            self.width, self.rows, self.stride, self.bytes_per_pixel
        )
    }
}

/// Minimum bytes needed: `(rows - 1) * stride + min_stride`.
pub(crate) fn required_bytes(
    rows: u32,
    stride: usize,
    min_stride: usize,
) -> Result<usize, BufferError> {
    let preceding = (rows as usize)
        .saturating_sub(1)
        .checked_mul(stride)
        .ok_or(BufferError::InvalidDimensions)?;
    preceding
        .checked_add(min_stride)
        .ok_or(BufferError::InvalidDimensions)
}
