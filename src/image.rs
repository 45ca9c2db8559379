//! Renderable image snapshots.
//!
//! A [`RenderableImage`] owns tightly packed 8-bit, four-channel pixels.
//! It never borrows from the pixel buffer it was drawn from, so the
//! producer may recycle that buffer as soon as conversion returns.

use alloc::vec::Vec;
use core::fmt;

use imgref::ImgVec;
use rgb::Rgba;
use rgb::alt::BGRA;

/// Channel order of a [`RenderableImage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OutputLayout {
    /// B, G, R, A in memory. Matches a little-endian 32-bit bitmap
    /// context with alpha first, and most texture upload paths on Apple
    /// and Windows.
    #[default]
    Bgra8,
    /// R, G, B, A in memory.
    Rgba8,
}

impl OutputLayout {
    /// Byte offsets of red, green, blue, alpha within a pixel.
    #[inline]
    pub(crate) const fn offsets(self) -> [usize; 4] {
        match self {
            OutputLayout::Bgra8 => [2, 1, 0, 3],
            OutputLayout::Rgba8 => [0, 1, 2, 3],
        }
    }
}

/// Alpha channel interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum AlphaMode {
    /// Opaque source; the alpha byte is always 0xFF.
    None = 0,
    /// Straight (unassociated) alpha.
    Straight = 1,
    /// Premultiplied (associated) alpha.
    Premultiplied = 2,
}

/// Format of a [`RenderableImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Channel order.
    pub layout: OutputLayout,
    /// Alpha interpretation.
    pub alpha: AlphaMode,
}

impl ImageDescriptor {
    pub const fn new(layout: OutputLayout, alpha: AlphaMode) -> Self {
        Self { layout, alpha }
    }

    /// Always 4.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// Immutable, self-contained image ready for texture upload.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderableImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    descriptor: ImageDescriptor,
}

impl RenderableImage {
    /// Wrap tightly packed pixels. `data` must hold exactly
    /// `width * height * 4` bytes.
    pub(crate) fn from_parts(
        data: Vec<u8>,
        width: u32,
        height: u32,
        descriptor: ImageDescriptor,
    ) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            data,
            width,
            height,
            descriptor,
        }
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte stride between rows. Always `width * 4`.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.descriptor.bytes_per_pixel()
    }

    /// Pixel format.
    #[inline]
    pub fn descriptor(&self) -> ImageDescriptor {
        self.descriptor
    }

    /// All pixel bytes, row after row without padding.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    /// The four bytes of pixel `(x, y)` in [`OutputLayout`] order.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(
            x < self.width,
            "column index {x} out of bounds (width: {})",
            self.width
        );
        let start = x as usize * 4;
        let row = self.row(y);
        [row[start], row[start + 1], row[start + 2], row[start + 3]]
    }

    /// Consume the image and return its pixel bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Copy into an `ImgVec` of RGBA pixels, whatever the stored order.
    pub fn to_rgba_imgvec(&self) -> ImgVec<Rgba<u8>> {
        let [r, g, b, a] = self.descriptor.layout.offsets();
        let pixels = self
            .data
            .chunks_exact(4)
            .map(|px| Rgba::new(px[r], px[g], px[b], px[a]))
            .collect();
        ImgVec::new(pixels, self.width as usize, self.height as usize)
    }

    /// Copy into an `ImgVec` of BGRA pixels, whatever the stored order.
    pub fn to_bgra_imgvec(&self) -> ImgVec<BGRA<u8>> {
        let [r, g, b, a] = self.descriptor.layout.offsets();
        let pixels = self
            .data
            .chunks_exact(4)
            .map(|px| BGRA {
                b: px[b],
                g: px[g],
                r: px[r],
                a: px[a],
            })
            .collect();
        ImgVec::new(pixels, self.width as usize, self.height as usize)
    }
}

impl fmt::Debug for RenderableImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RenderableImage({}x{}, {:?} {:?})",
            self.width, self.height, self.descriptor.layout, self.descriptor.alpha
        )
    }
}
