//! YCbCr → RGB conversion for bi-planar video formats.
//!
//! Coefficients are 16.16 fixed point so results are identical on every
//! target. Video-range scaling (Y 16..=235, C 16..=240) is folded into the
//! coefficient tables.

/// YCbCr matrix coefficients.
///
/// Camera and decoder buffers usually attach one of these; when they don't,
/// [`ConvertOptions::default_matrix`](crate::ConvertOptions) decides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum YCbCrMatrix {
    /// ITU-R BT.601 (SD video, most camera previews).
    #[default]
    Bt601,
    /// ITU-R BT.709 (HD video).
    Bt709,
}

impl YCbCrMatrix {
    /// Map a CICP `matrix_coefficients` code. `None` for unsupported codes.
    pub const fn from_cicp(mc: u8) -> Option<Self> {
        match mc {
            1 => Some(Self::Bt709),
            5 | 6 => Some(Self::Bt601),
            _ => None,
        }
    }
}

/// Quantization range of YCbCr samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum YCbCrRange {
    /// Studio range: Y in 16..=235, Cb/Cr in 16..=240.
    Video,
    /// Full range: all components use 0..=255.
    Full,
}

struct Coefficients {
    y_offset: i32,
    y_scale: i32,
    cr_to_r: i32,
    cb_to_g: i32,
    cr_to_g: i32,
    cb_to_b: i32,
}

const fn coefficients(matrix: YCbCrMatrix, range: YCbCrRange) -> Coefficients {
    match (matrix, range) {
        (YCbCrMatrix::Bt601, YCbCrRange::Video) => Coefficients {
            y_offset: 16,
            y_scale: 76309,
            cr_to_r: 104597,
            cb_to_g: 25675,
            cr_to_g: 53279,
            cb_to_b: 132201,
        },
        (YCbCrMatrix::Bt601, YCbCrRange::Full) => Coefficients {
            y_offset: 0,
            y_scale: 65536,
            cr_to_r: 91881,
            cb_to_g: 22554,
            cr_to_g: 46802,
            cb_to_b: 116130,
        },
        (YCbCrMatrix::Bt709, YCbCrRange::Video) => Coefficients {
            y_offset: 16,
            y_scale: 76309,
            cr_to_r: 117489,
            cb_to_g: 13975,
            cr_to_g: 34925,
            cb_to_b: 138438,
        },
        (YCbCrMatrix::Bt709, YCbCrRange::Full) => Coefficients {
            y_offset: 0,
            y_scale: 65536,
            cr_to_r: 103206,
            cb_to_g: 12276,
            cr_to_g: 30679,
            cb_to_b: 121610,
        },
    }
}

/// Converts YCbCr samples to 8-bit RGB for one matrix and range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YCbCrConverter {
    matrix: YCbCrMatrix,
    range: YCbCrRange,
}

impl YCbCrConverter {
    pub const fn new(matrix: YCbCrMatrix, range: YCbCrRange) -> Self {
        Self { matrix, range }
    }

    pub const fn matrix(&self) -> YCbCrMatrix {
        self.matrix
    }

    pub const fn range(&self) -> YCbCrRange {
        self.range
    }

    /// Convert one sample to `[r, g, b]`.
    #[inline]
    pub fn to_rgb(&self, y: u8, cb: u8, cr: u8) -> [u8; 3] {
        let c = coefficients(self.matrix, self.range);
        let luma = (y as i32 - c.y_offset) * c.y_scale;
        let cb = cb as i32 - 128;
        let cr = cr as i32 - 128;
        [
            fixed_to_u8(luma + c.cr_to_r * cr),
            fixed_to_u8(luma - c.cb_to_g * cb - c.cr_to_g * cr),
            fixed_to_u8(luma + c.cb_to_b * cb),
        ]
    }
}

/// Round a 16.16 value to the nearest integer and clamp to `0..=255`.
#[inline]
fn fixed_to_u8(value: i32) -> u8 {
    ((value + 0x8000) >> 16).clamp(0, 255) as u8
}
