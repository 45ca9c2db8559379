//! Pixel format tags and per-format layout.
//!
//! Producers label their buffers with a 32-bit [`FormatTag`], usually a
//! FourCC (`'BGRA'`, `'420v'`) but sometimes a small legacy integer
//! (`0x20` for 32-bit ARGB). [`PixelFormat`] is the subset of tags this
//! crate knows how to draw. Bytes-per-pixel and channel order are always
//! derived from the tag, never from buffer size.

use core::fmt;

use crate::color::YCbCrRange;

/// Raw 32-bit pixel format tag carried by a pixel buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatTag(pub u32);

impl FormatTag {
    /// Pack four ASCII bytes big-endian, so `b"BGRA"` becomes `0x42475241`.
    #[inline]
    pub const fn from_fourcc(code: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*code))
    }

    /// The raw tag value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The tag as four bytes, if every byte is printable ASCII.
    pub fn fourcc(self) -> Option<[u8; 4]> {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ')
            .then_some(bytes)
    }
}

impl From<u32> for FormatTag {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fourcc() {
            Some(bytes) => {
                f.write_str("'")?;
                for b in bytes {
                    write!(f, "{}", b as char)?;
                }
                f.write_str("'")
            }
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl fmt::Debug for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormatTag({self})")
    }
}

/// Pixel formats the converter can draw.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A in memory order. Premultiplied alpha.
    Bgra32,
    /// 8-bit R, G, B, A in memory order. Premultiplied alpha.
    Rgba32,
    /// 8-bit A, R, G, B in memory order. Premultiplied alpha.
    Argb32,
    /// 8-bit R, G, B, no alpha.
    Rgb24,
    /// Single 8-bit luminance channel.
    Gray8,
    /// Bi-planar 4:2:0 YCbCr, video (studio) range. Plane 0 is Y, plane 1
    /// is interleaved Cb, Cr at half resolution in both axes.
    Nv12VideoRange,
    /// Bi-planar 4:2:0 YCbCr, full range.
    Nv12FullRange,
}

impl PixelFormat {
    pub const BGRA32_TAG: FormatTag = FormatTag::from_fourcc(b"BGRA");
    pub const RGBA32_TAG: FormatTag = FormatTag::from_fourcc(b"RGBA");
    pub const ARGB32_TAG: FormatTag = FormatTag(0x0000_0020);
    pub const RGB24_TAG: FormatTag = FormatTag(0x0000_0018);
    pub const GRAY8_TAG: FormatTag = FormatTag::from_fourcc(b"L008");
    pub const NV12_VIDEO_TAG: FormatTag = FormatTag::from_fourcc(b"420v");
    pub const NV12_FULL_TAG: FormatTag = FormatTag::from_fourcc(b"420f");

    /// Every known format.
    pub const ALL: [PixelFormat; 7] = [
        PixelFormat::Bgra32,
        PixelFormat::Rgba32,
        PixelFormat::Argb32,
        PixelFormat::Rgb24,
        PixelFormat::Gray8,
        PixelFormat::Nv12VideoRange,
        PixelFormat::Nv12FullRange,
    ];

    /// Resolve a buffer's tag. Returns `None` if unrecognized.
    pub fn from_tag(tag: FormatTag) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.tag() == tag)
    }

    /// The tag producers use for this format.
    pub const fn tag(self) -> FormatTag {
        match self {
            PixelFormat::Bgra32 => Self::BGRA32_TAG,
            PixelFormat::Rgba32 => Self::RGBA32_TAG,
            PixelFormat::Argb32 => Self::ARGB32_TAG,
            PixelFormat::Rgb24 => Self::RGB24_TAG,
            PixelFormat::Gray8 => Self::GRAY8_TAG,
            PixelFormat::Nv12VideoRange => Self::NV12_VIDEO_TAG,
            PixelFormat::Nv12FullRange => Self::NV12_FULL_TAG,
        }
    }

    /// Number of memory planes.
    pub const fn plane_count(self) -> usize {
        match self {
            PixelFormat::Nv12VideoRange | PixelFormat::Nv12FullRange => 2,
            _ => 1,
        }
    }

    /// Bytes per sample in `plane`, or `None` if the plane does not exist.
    ///
    /// For NV12 the chroma plane stores one Cb, Cr pair per sample.
    pub const fn bytes_per_pixel(self, plane: usize) -> Option<usize> {
        match (self, plane) {
            (PixelFormat::Bgra32 | PixelFormat::Rgba32 | PixelFormat::Argb32, 0) => Some(4),
            (PixelFormat::Rgb24, 0) => Some(3),
            (PixelFormat::Gray8, 0) => Some(1),
            (PixelFormat::Nv12VideoRange | PixelFormat::Nv12FullRange, 0) => Some(1),
            (PixelFormat::Nv12VideoRange | PixelFormat::Nv12FullRange, 1) => Some(2),
            _ => None,
        }
    }

    /// Sample dimensions of `plane` for an image of `width × height`.
    ///
    /// Chroma planes of 4:2:0 formats round up, so odd sizes keep their
    /// last column and row.
    pub const fn plane_dimensions(
        self,
        plane: usize,
        width: u32,
        height: u32,
    ) -> Option<(u32, u32)> {
        match (self.plane_count(), plane) {
            (_, 0) => Some((width, height)),
            (2, 1) => Some((width.div_ceil(2), height.div_ceil(2))),
            _ => None,
        }
    }

    /// Whether the source carries a meaningful alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::Bgra32 | PixelFormat::Rgba32 | PixelFormat::Argb32
        )
    }

    /// Quantization range for YCbCr formats, `None` for RGB and gray.
    pub const fn ycbcr_range(self) -> Option<YCbCrRange> {
        match self {
            PixelFormat::Nv12VideoRange => Some(YCbCrRange::Video),
            PixelFormat::Nv12FullRange => Some(YCbCrRange::Full),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Bgra32 => "32-bit BGRA",
            PixelFormat::Rgba32 => "32-bit RGBA",
            PixelFormat::Argb32 => "32-bit ARGB",
            PixelFormat::Rgb24 => "24-bit RGB",
            PixelFormat::Gray8 => "8-bit gray",
            PixelFormat::Nv12VideoRange => "NV12 video range",
            PixelFormat::Nv12FullRange => "NV12 full range",
        };
        write!(f, "{name} ({})", self.tag())
    }
}
