//! Drawing contexts that turn locked plane memory into images.
//!
//! [`ImageSink`] is the seam between the lock-scoped conversion and
//! whatever produces the final image. The sink receives a
//! [`SourceFrame`] whose planes borrow the locked buffer, and must return
//! an image that owns its pixels: once `draw` returns the buffer is
//! unlocked and may be recycled.
//!
//! [`BitmapContext`] is the built-in sink. It allocates a tightly packed
//! four-channel bitmap and draws every supported [`PixelFormat`] into it
//! row by row, honoring each plane's stride.

use alloc::vec::Vec;

use crate::color::{YCbCrConverter, YCbCrMatrix};
use crate::error::ContextError;
use crate::format::PixelFormat;
use crate::image::{AlphaMode, ImageDescriptor, OutputLayout, RenderableImage};
use crate::limits::ConversionLimits;
use crate::plane::{BufferError, Plane};

/// Locked, validated pixel memory handed to an [`ImageSink`].
#[derive(Clone, Copy, Debug)]
pub struct SourceFrame<'a> {
    format: PixelFormat,
    width: u32,
    height: u32,
    luma: Plane<'a>,
    chroma: Option<Plane<'a>>,
    matrix: YCbCrMatrix,
}

impl<'a> SourceFrame<'a> {
    /// Bundle validated planes into a frame.
    ///
    /// `primary` is plane 0 (the only plane of packed formats, luma of
    /// bi-planar ones). `chroma` is plane 1.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvalidDimensions`] for an empty frame,
    /// [`ContextError::MissingPlane`] if `chroma` is absent for a bi-planar
    /// format, and [`ContextError::InvalidPlane`] if a plane is smaller than
    /// the format requires.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        primary: Plane<'a>,
        chroma: Option<Plane<'a>>,
        matrix: YCbCrMatrix,
    ) -> Result<Self, ContextError> {
        if width == 0 || height == 0 {
            return Err(ContextError::InvalidDimensions { width, height });
        }
        check_plane(format, 0, width, height, &primary)?;
        let chroma = match (format.plane_count(), chroma) {
            (1, _) => None,
            (_, None) => return Err(ContextError::MissingPlane { plane: 1 }),
            (_, Some(plane)) => {
                check_plane(format, 1, width, height, &plane)?;
                Some(plane)
            }
        };
        Ok(Self {
            format,
            width,
            height,
            luma: primary,
            chroma,
            matrix,
        })
    }

    /// Source pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Plane `index`, if the format has it.
    pub fn plane(&self, index: usize) -> Option<&Plane<'a>> {
        match index {
            0 => Some(&self.luma),
            1 => self.chroma.as_ref(),
            _ => None,
        }
    }

    /// YCbCr matrix for bi-planar formats.
    #[inline]
    pub fn matrix(&self) -> YCbCrMatrix {
        self.matrix
    }
}

fn check_plane(
    format: PixelFormat,
    index: usize,
    width: u32,
    height: u32,
    plane: &Plane<'_>,
) -> Result<(), ContextError> {
    let invalid = |error| ContextError::InvalidPlane {
        plane: index,
        error,
    };
    let (w, h) = format
        .plane_dimensions(index, width, height)
        .ok_or(ContextError::MissingPlane { plane: index })?;
    let bpp = format
        .bytes_per_pixel(index)
        .ok_or(ContextError::MissingPlane { plane: index })?;
    if plane.bytes_per_pixel() != bpp {
        return Err(invalid(BufferError::FormatMismatch));
    }
    if plane.width() < w || plane.rows() < h {
        return Err(invalid(BufferError::InvalidDimensions));
    }
    Ok(())
}

/// Accepts locked pixel memory and produces an immutable snapshot.
///
/// # Contract
///
/// - `draw` only runs for formats where `supports` returned `true`.
/// - Plane views in the frame are only valid during `draw`. The returned
///   image must not borrow them.
pub trait ImageSink {
    /// The snapshot type.
    type Image;

    /// Whether this sink can draw `format`.
    fn supports(&self, format: PixelFormat) -> bool;

    /// Draw `frame` and return a snapshot that owns its pixels.
    fn draw(&mut self, frame: &SourceFrame<'_>) -> Result<Self::Image, ContextError>;
}

/// Built-in drawing context producing [`RenderableImage`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitmapContext {
    output: OutputLayout,
    limits: ConversionLimits,
}

impl BitmapContext {
    pub fn new(output: OutputLayout, limits: ConversionLimits) -> Self {
        Self { output, limits }
    }

    /// Channel order of produced images.
    pub fn output(&self) -> OutputLayout {
        self.output
    }

    /// Limits checked before allocation.
    pub fn limits(&self) -> &ConversionLimits {
        &self.limits
    }
}

impl ImageSink for BitmapContext {
    type Image = RenderableImage;

    fn supports(&self, _format: PixelFormat) -> bool {
        true
    }

    fn draw(&mut self, frame: &SourceFrame<'_>) -> Result<RenderableImage, ContextError> {
        let (width, height) = (frame.width(), frame.height());
        let alpha = if frame.format().has_alpha() {
            AlphaMode::Premultiplied
        } else {
            AlphaMode::None
        };
        let descriptor = ImageDescriptor::new(self.output, alpha);
        let bytes = self.limits.admit(frame, descriptor)?;
        let stride = width as usize * descriptor.bytes_per_pixel();

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| ContextError::AllocationFailed { bytes })?;
        data.resize(bytes, 0);

        let ycc = frame
            .format()
            .ycbcr_range()
            .map(|range| YCbCrConverter::new(frame.matrix(), range));
        for (y, out) in (0..height).zip(data.chunks_exact_mut(stride)) {
            draw_row(frame, y, out, self.output, ycc.as_ref());
        }

        Ok(RenderableImage::from_parts(data, width, height, descriptor))
    }
}

/// Draw source row `y` into one output row of `width * 4` bytes.
fn draw_row(
    frame: &SourceFrame<'_>,
    y: u32,
    out: &mut [u8],
    layout: OutputLayout,
    ycc: Option<&YCbCrConverter>,
) {
    let width = frame.width() as usize;
    let src = &frame.luma.row(y)[..width * frame.luma.bytes_per_pixel()];
    match frame.format() {
        PixelFormat::Bgra32 => packed32(src, out, [2, 1, 0, 3], layout),
        PixelFormat::Rgba32 => packed32(src, out, [0, 1, 2, 3], layout),
        PixelFormat::Argb32 => packed32(src, out, [1, 2, 3, 0], layout),
        PixelFormat::Rgb24 => {
            for (s, d) in src.chunks_exact(3).zip(out.chunks_exact_mut(4)) {
                put(d, layout, s[0], s[1], s[2], 0xFF);
            }
        }
        PixelFormat::Gray8 => {
            for (&v, d) in src.iter().zip(out.chunks_exact_mut(4)) {
                put(d, layout, v, v, v, 0xFF);
            }
        }
        PixelFormat::Nv12VideoRange | PixelFormat::Nv12FullRange => {
            let (Some(chroma), Some(ycc)) = (frame.chroma.as_ref(), ycc) else {
                return;
            };
            let cbcr = chroma.row(y / 2);
            for (x, (&luma, d)) in src.iter().zip(out.chunks_exact_mut(4)).enumerate() {
                let c = (x / 2) * 2;
                let [r, g, b] = ycc.to_rgb(luma, cbcr[c], cbcr[c + 1]);
                put(d, layout, r, g, b, 0xFF);
            }
        }
    }
}

/// Reorder 4-byte pixels whose R, G, B, A live at `src_offsets`.
#[inline]
fn packed32(src: &[u8], out: &mut [u8], src_offsets: [usize; 4], layout: OutputLayout) {
    if src_offsets == layout.offsets() {
        out.copy_from_slice(src);
        return;
    }
    let [r, g, b, a] = src_offsets;
    for (s, d) in src.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        put(d, layout, s[r], s[g], s[b], s[a]);
    }
}

#[inline]
fn put(dst: &mut [u8], layout: OutputLayout, r: u8, g: u8, b: u8, a: u8) {
    let [ri, gi, bi, ai] = layout.offsets();
    dst[ri] = r;
    dst[gi] = g;
    dst[bi] = b;
    dst[ai] = a;
}
