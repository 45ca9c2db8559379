//! Lock-scoped pixel buffer conversion.
//!
//! [`PixelBufferConverter::convert`] locks the buffer read-only, resolves
//! its format tag, builds stride-aware plane views over the locked memory,
//! lets an [`ImageSink`] draw a snapshot, and unlocks. The lock is an RAII
//! [`BufferLock`], so every exit path releases it exactly once.

use crate::buffer::{BufferLock, LockFlags, LockableBuffer};
use crate::color::YCbCrMatrix;
use crate::error::{ContextError, ConversionError};
use crate::format::PixelFormat;
use crate::image::{OutputLayout, RenderableImage};
use crate::limits::ConversionLimits;
use crate::plane::{BufferError, Plane};
use crate::sink::{BitmapContext, ImageSink, SourceFrame};

/// Conversion settings.
///
/// # Example
///
/// ```
/// use zenframe::{ConversionLimits, ConvertOptions, OutputLayout, YCbCrMatrix};
///
/// let options = ConvertOptions::new()
///     .with_output(OutputLayout::Rgba8)
///     .with_default_matrix(YCbCrMatrix::Bt709)
///     .with_limits(ConversionLimits::none().with_max_pixels(8192 * 4096));
/// assert_eq!(options.output, OutputLayout::Rgba8);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConvertOptions {
    /// Channel order of produced images.
    pub output: OutputLayout,
    /// Matrix for YCbCr buffers that carry no matrix attachment.
    pub default_matrix: YCbCrMatrix,
    /// Limits checked before the output is allocated.
    pub limits: ConversionLimits,
}

impl ConvertOptions {
    /// BGRA output, BT.601 fallback matrix, no limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: OutputLayout) -> Self {
        self.output = output;
        self
    }

    pub fn with_default_matrix(mut self, matrix: YCbCrMatrix) -> Self {
        self.default_matrix = matrix;
        self
    }

    pub fn with_limits(mut self, limits: ConversionLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Converts lockable pixel buffers into [`RenderableImage`]s.
///
/// Holds only its options, so one converter can be shared across threads
/// converting different buffers. Calls on the same buffer must not
/// overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelBufferConverter {
    options: ConvertOptions,
}

impl PixelBufferConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// The drawing context [`convert`](Self::convert) draws into.
    pub fn context(&self) -> BitmapContext {
        BitmapContext::new(self.options.output, self.options.limits)
    }

    /// Convert `buffer` into a freshly allocated image.
    ///
    /// The returned image has the buffer's width and height and shares no
    /// memory with it.
    ///
    /// # Errors
    ///
    /// - [`ConversionError::LockFailed`] if the buffer could not be locked.
    /// - [`ConversionError::UnsupportedFormat`] for an unknown format tag.
    /// - [`ConversionError::ContextCreationFailed`] for an unusable layout,
    ///   an exceeded limit, or a failed allocation.
    ///
    /// The buffer is unlocked before any error after a successful lock is
    /// returned.
    pub fn convert<B>(&self, buffer: &B) -> Result<RenderableImage, ConversionError>
    where
        B: LockableBuffer + ?Sized,
    {
        let mut context = self.context();
        self.convert_with(buffer, &mut context)
    }

    /// Convert `buffer` by drawing into `sink`.
    ///
    /// A format the sink does not [`support`](ImageSink::supports) is
    /// reported as [`ConversionError::UnsupportedFormat`].
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(
            width = buffer.width(),
            height = buffer.height(),
            format = %buffer.format_tag(),
        )
    )]
    pub fn convert_with<B, S>(
        &self,
        buffer: &B,
        sink: &mut S,
    ) -> Result<S::Image, ConversionError>
    where
        B: LockableBuffer + ?Sized,
        S: ImageSink + ?Sized,
    {
        let lock = BufferLock::acquire(buffer, LockFlags::READ_ONLY)?;

        let tag = buffer.format_tag();
        let format = PixelFormat::from_tag(tag)
            .filter(|&format| sink.supports(format))
            .ok_or(ConversionError::UnsupportedFormat(tag))?;
        let matrix = buffer
            .ycbcr_matrix()
            .unwrap_or(self.options.default_matrix);

        let frame = source_frame(&lock, format, matrix)?;
        let image = sink.draw(&frame)?;
        tracing::trace!(planes = format.plane_count(), "pixel buffer converted");
        Ok(image)
    }
}

/// Convert `buffer` with default options: BGRA output, BT.601 fallback
/// matrix, no limits.
pub fn convert<B>(buffer: &B) -> Result<RenderableImage, ConversionError>
where
    B: LockableBuffer + ?Sized,
{
    PixelBufferConverter::default().convert(buffer)
}

fn source_frame<'a, B>(
    lock: &'a BufferLock<'_, B>,
    format: PixelFormat,
    matrix: YCbCrMatrix,
) -> Result<SourceFrame<'a>, ContextError>
where
    B: LockableBuffer + ?Sized,
{
    let buffer = lock.buffer();
    let (width, height) = (buffer.width(), buffer.height());
    if width == 0 || height == 0 {
        return Err(ContextError::InvalidDimensions { width, height });
    }
    let available = buffer.plane_count();
    if available < format.plane_count() {
        return Err(ContextError::MissingPlane { plane: available });
    }
    let primary = plane_view(lock, format, 0, width, height)?;
    let chroma = match format.plane_count() {
        1 => None,
        _ => Some(plane_view(lock, format, 1, width, height)?),
    };
    SourceFrame::new(format, width, height, primary, chroma, matrix)
}

/// Validated view of plane `index`, using the producer's stride as-is.
fn plane_view<'a, B>(
    lock: &'a BufferLock<'_, B>,
    format: PixelFormat,
    index: usize,
    width: u32,
    height: u32,
) -> Result<Plane<'a>, ContextError>
where
    B: LockableBuffer + ?Sized,
{
    let missing = ContextError::MissingPlane { plane: index };
    let invalid = |error| ContextError::InvalidPlane {
        plane: index,
        error,
    };
    let raw = lock.plane(index).ok_or(missing)?;
    let (w, h) = format
        .plane_dimensions(index, width, height)
        .ok_or(missing)?;
    let bpp = format.bytes_per_pixel(index).ok_or(missing)?;
    if raw.width < w || raw.height < h {
        return Err(invalid(BufferError::InvalidDimensions));
    }
    Plane::new(raw.data, w, h, raw.bytes_per_row, bpp).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockError;
    use crate::format::FormatTag;
    use crate::image::AlphaMode;
    use crate::limits::LimitExceeded;
    use crate::memory::{MemoryPixelBuffer, MemoryPlane};
    use alloc::vec;
    use alloc::vec::Vec;

    const PAD: u8 = 0xAB;

    /// BGRA buffer whose padding bytes are all [`PAD`].
    fn bgra_buffer(
        width: u32,
        height: u32,
        stride: usize,
        pixel: impl Fn(u32, u32) -> [u8; 4],
    ) -> MemoryPixelBuffer {
        let mut data = vec![PAD; stride * height as usize];
        for y in 0..height {
            for x in 0..width {
                let at = y as usize * stride + x as usize * 4;
                data[at..at + 4].copy_from_slice(&pixel(x, y));
            }
        }
        MemoryPixelBuffer::packed(width, height, PixelFormat::BGRA32_TAG, stride, data).unwrap()
    }

    fn nv12_buffer(
        tag: FormatTag,
        width: u32,
        height: u32,
        luma: u8,
        cb: u8,
        cr: u8,
    ) -> MemoryPixelBuffer {
        let luma_stride = width as usize + 16;
        let chroma_stride = width.div_ceil(2) as usize * 2 + 16;
        let chroma_rows = height.div_ceil(2) as usize;
        let mut chroma = vec![PAD; chroma_stride * chroma_rows];
        for row in chroma.chunks_exact_mut(chroma_stride) {
            for pair in row[..width.div_ceil(2) as usize * 2].chunks_exact_mut(2) {
                pair[0] = cb;
                pair[1] = cr;
            }
        }
        let mut y = vec![PAD; luma_stride * height as usize];
        for row in y.chunks_exact_mut(luma_stride) {
            row[..width as usize].fill(luma);
        }
        MemoryPixelBuffer::bi_planar(
            width,
            height,
            tag,
            (luma_stride, y),
            (chroma_stride, chroma),
        )
        .unwrap()
    }

    fn assert_unlocked(buffer: &MemoryPixelBuffer) {
        assert_eq!(buffer.lock_count(), 0);
        assert_eq!(buffer.lock_calls(), buffer.unlock_calls());
    }

    #[test]
    fn solid_color_with_four_bytes_of_padding() {
        let color = [0x10, 0x80, 0xF0, 0xFF];
        let buffer = bgra_buffer(4, 4, 20, |_, _| color);
        let image = convert(&buffer).unwrap();
        assert_eq!((image.width(), image.height()), (4, 4));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(image.pixel(x, y), color, "pixel ({x}, {y})");
            }
        }
        assert_unlocked(&buffer);
    }

    #[test]
    fn padded_rows_are_not_skewed() {
        // 5 pixels = 20 bytes per row, padded to 32.
        let encode = |x: u32, y: u32| [x as u8, y as u8, (x * 16 + y) as u8, 0xFF];
        let buffer = bgra_buffer(5, 3, 32, encode);
        let image = convert(&buffer).unwrap();
        for y in 0..3 {
            let expected: Vec<u8> = (0..5).flat_map(|x| encode(x, y)).collect();
            assert_eq!(image.row(y), expected.as_slice(), "row {y}");
        }
        assert!(!image.as_bytes().contains(&PAD));
    }

    #[test]
    fn output_matches_input_dimensions_for_every_format() {
        let (w, h) = (7u32, 5u32);
        for format in PixelFormat::ALL {
            let buffer = match format.plane_count() {
                1 => {
                    let bpp = format.bytes_per_pixel(0).unwrap();
                    let stride = w as usize * bpp + 3;
                    let data = vec![0x40; stride * h as usize];
                    MemoryPixelBuffer::packed(w, h, format.tag(), stride, data).unwrap()
                }
                _ => nv12_buffer(format.tag(), w, h, 100, 128, 128),
            };
            let image = convert(&buffer).unwrap();
            assert_eq!((image.width(), image.height()), (w, h), "{format}");
            assert_eq!(image.as_bytes().len(), (w * h * 4) as usize);
            assert_unlocked(&buffer);
        }
    }

    #[test]
    fn converting_twice_gives_identical_pixels() {
        let buffer = bgra_buffer(6, 4, 32, |x, y| [x as u8 * 40, y as u8 * 60, 7, 0xFF]);
        let first = convert(&buffer).unwrap();
        let second = convert(&buffer).unwrap();
        assert_eq!(first, second);
        assert_eq!(buffer.lock_calls(), 2);
        assert_unlocked(&buffer);
    }

    #[test]
    fn image_survives_buffer_recycling() {
        let mut buffer = bgra_buffer(2, 2, 8, |_, _| [1, 2, 3, 4]);
        let image = convert(&buffer).unwrap();
        buffer.plane_data_mut(0).unwrap().fill(0);
        assert_eq!(image.pixel(1, 1), [1, 2, 3, 4]);
        assert_eq!(convert(&buffer).unwrap().pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn unknown_format_is_rejected_and_unlocked() {
        let tag = FormatTag::from_fourcc(b"x444");
        let buffer = MemoryPixelBuffer::packed(2, 2, tag, 8, vec![0; 16]).unwrap();
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::UnsupportedFormat(tag)
        );
        assert_eq!(buffer.lock_calls(), 1);
        assert_unlocked(&buffer);
    }

    #[test]
    fn lock_failure_skips_everything() {
        let buffer = bgra_buffer(2, 2, 8, |_, _| [0; 4]);
        buffer.fail_next_lock(LockError::Reclaimed);
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::LockFailed(LockError::Reclaimed)
        );
        assert_eq!(buffer.lock_calls(), 0);
        assert_eq!(buffer.unlock_calls(), 0);
    }

    #[test]
    fn buffer_locked_elsewhere_stays_locked() {
        let buffer = bgra_buffer(2, 2, 8, |_, _| [0; 4]);
        buffer.lock(LockFlags::empty()).unwrap();
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::LockFailed(LockError::AlreadyLocked)
        );
        // The other holder's lock is untouched.
        assert_eq!(buffer.lock_count(), 1);
        assert_eq!(buffer.unlock_calls(), 0);
        buffer.unlock(LockFlags::empty());
    }

    #[test]
    fn short_stride_fails_context_creation_and_unlocks() {
        // 4 BGRA pixels need 16 bytes per row; the producer claims 12.
        let buffer =
            MemoryPixelBuffer::packed(4, 2, PixelFormat::BGRA32_TAG, 12, vec![0; 24]).unwrap();
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::ContextCreationFailed(ContextError::InvalidPlane {
                plane: 0,
                error: BufferError::StrideTooSmall,
            })
        );
        assert_unlocked(&buffer);
    }

    #[test]
    fn zero_sized_buffer_fails_context_creation() {
        let buffer =
            MemoryPixelBuffer::packed(0, 4, PixelFormat::BGRA32_TAG, 0, Vec::new()).unwrap();
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::ContextCreationFailed(ContextError::InvalidDimensions {
                width: 0,
                height: 4
            })
        );
        assert_unlocked(&buffer);
    }

    #[test]
    fn missing_chroma_plane_is_a_typed_error() {
        // A null image would hide why the frame was lost; the error names the plane.
        let buffer = MemoryPixelBuffer::from_planes(
            4,
            4,
            PixelFormat::NV12_VIDEO_TAG,
            vec![MemoryPlane::zeroed(4, 4, 4).unwrap()],
        );
        assert_eq!(
            convert(&buffer).unwrap_err(),
            ConversionError::ContextCreationFailed(ContextError::MissingPlane { plane: 1 })
        );
        assert_unlocked(&buffer);
    }

    #[test]
    fn declared_plane_count_is_honored() {
        // Exposes the chroma plane but declares a single plane.
        struct SinglePlane<'a>(&'a MemoryPixelBuffer);
        impl LockableBuffer for SinglePlane<'_> {
            fn width(&self) -> u32 {
                self.0.width()
            }
            fn height(&self) -> u32 {
                self.0.height()
            }
            fn format_tag(&self) -> FormatTag {
                self.0.format_tag()
            }
            fn plane_count(&self) -> usize {
                1
            }
            fn lock(&self, flags: LockFlags) -> Result<(), LockError> {
                self.0.lock(flags)
            }
            fn unlock(&self, flags: LockFlags) {
                self.0.unlock(flags)
            }
            fn plane(&self, index: usize) -> Option<crate::buffer::RawPlane<'_>> {
                self.0.plane(index)
            }
        }

        let inner = nv12_buffer(PixelFormat::NV12_FULL_TAG, 4, 4, 128, 128, 128);
        assert!(convert(&inner).is_ok());
        assert_eq!(
            convert(&SinglePlane(&inner)).unwrap_err(),
            ConversionError::ContextCreationFailed(ContextError::MissingPlane { plane: 1 })
        );
        assert_unlocked(&inner);
    }

    #[test]
    fn allocation_failure_unlocks() {
        struct OutOfMemory;
        impl ImageSink for OutOfMemory {
            type Image = RenderableImage;
            fn supports(&self, _: PixelFormat) -> bool {
                true
            }
            fn draw(&mut self, frame: &SourceFrame<'_>) -> Result<RenderableImage, ContextError> {
                let bytes = frame.width() as usize * frame.height() as usize * 4;
                Err(ContextError::AllocationFailed { bytes })
            }
        }

        let buffer = bgra_buffer(8, 2, 40, |_, _| [0; 4]);
        let err = PixelBufferConverter::default()
            .convert_with(&buffer, &mut OutOfMemory)
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::ContextCreationFailed(ContextError::AllocationFailed { bytes: 64 })
        );
        assert_eq!(buffer.lock_calls(), 1);
        assert_unlocked(&buffer);
    }

    #[test]
    fn limits_reject_after_unlock() {
        let buffer = bgra_buffer(64, 32, 256, |_, _| [0; 4]);
        let converter = PixelBufferConverter::new(
            ConvertOptions::new().with_limits(ConversionLimits::none().with_max_pixels(1024)),
        );
        assert_eq!(
            converter.convert(&buffer).unwrap_err(),
            ConversionError::ContextCreationFailed(ContextError::LimitExceeded(
                LimitExceeded::Pixels {
                    pixels: 2048,
                    max: 1024
                }
            ))
        );
        assert_unlocked(&buffer);
    }

    #[test]
    fn rgba_output_swizzles_bgra_source() {
        let buffer = bgra_buffer(1, 1, 4, |_, _| [1, 2, 3, 4]);
        let converter =
            PixelBufferConverter::new(ConvertOptions::new().with_output(OutputLayout::Rgba8));
        let image = converter.convert(&buffer).unwrap();
        assert_eq!(image.pixel(0, 0), [3, 2, 1, 4]);
        assert_eq!(image.descriptor().layout, OutputLayout::Rgba8);
        assert_eq!(image.descriptor().alpha, AlphaMode::Premultiplied);
    }

    #[test]
    fn nv12_video_range_extremes() {
        let black = nv12_buffer(PixelFormat::NV12_VIDEO_TAG, 3, 3, 16, 128, 128);
        let white = nv12_buffer(PixelFormat::NV12_VIDEO_TAG, 3, 3, 235, 128, 128);
        let black = convert(&black).unwrap();
        let white = convert(&white).unwrap();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(black.pixel(x, y), [0, 0, 0, 0xFF]);
                assert_eq!(white.pixel(x, y), [0xFF, 0xFF, 0xFF, 0xFF]);
            }
        }
        assert_eq!(black.descriptor().alpha, AlphaMode::None);
    }

    #[test]
    fn buffer_matrix_overrides_default() {
        let plain = nv12_buffer(PixelFormat::NV12_VIDEO_TAG, 2, 2, 81, 90, 240);
        let tagged = nv12_buffer(PixelFormat::NV12_VIDEO_TAG, 2, 2, 81, 90, 240)
            .with_ycbcr_matrix(YCbCrMatrix::Bt709);
        let bt601 = convert(&plain).unwrap();
        let bt709 = convert(&tagged).unwrap();
        assert_ne!(bt601.pixel(0, 0), bt709.pixel(0, 0));

        let converter = PixelBufferConverter::new(
            ConvertOptions::new().with_default_matrix(YCbCrMatrix::Bt709),
        );
        assert_eq!(converter.convert(&plain).unwrap(), bt709);
    }

    #[test]
    fn sink_can_refuse_a_format() {
        struct BgraOnly(BitmapContext);
        impl ImageSink for BgraOnly {
            type Image = RenderableImage;
            fn supports(&self, format: PixelFormat) -> bool {
                format == PixelFormat::Bgra32
            }
            fn draw(&mut self, frame: &SourceFrame<'_>) -> Result<RenderableImage, ContextError> {
                self.0.draw(frame)
            }
        }

        let converter = PixelBufferConverter::default();
        let mut sink = BgraOnly(converter.context());
        let gray = MemoryPixelBuffer::packed(2, 2, PixelFormat::GRAY8_TAG, 2, vec![0; 4]).unwrap();
        assert_eq!(
            converter.convert_with(&gray, &mut sink).unwrap_err(),
            ConversionError::UnsupportedFormat(PixelFormat::GRAY8_TAG)
        );
        assert_unlocked(&gray);

        let bgra = bgra_buffer(2, 2, 8, |_, _| [9; 4]);
        assert!(converter.convert_with(&bgra, &mut sink).is_ok());
    }

    #[test]
    fn custom_sink_sees_raw_stride() {
        struct StrideProbe;
        impl ImageSink for StrideProbe {
            type Image = (usize, usize);
            fn supports(&self, _: PixelFormat) -> bool {
                true
            }
            fn draw(&mut self, frame: &SourceFrame<'_>) -> Result<(usize, usize), ContextError> {
                let plane = frame.plane(0).ok_or(ContextError::MissingPlane { plane: 0 })?;
                Ok((plane.stride(), plane.row_bytes()))
            }
        }

        let buffer = bgra_buffer(3, 2, 64, |_, _| [0; 4]);
        let probe = PixelBufferConverter::default()
            .convert_with(&buffer, &mut StrideProbe)
            .unwrap();
        assert_eq!(probe, (64, 12));
    }

    #[test]
    fn panicking_sink_still_unlocks() {
        extern crate std;
        use std::panic::{AssertUnwindSafe, catch_unwind};

        struct Exploding;
        impl ImageSink for Exploding {
            type Image = ();
            fn supports(&self, _: PixelFormat) -> bool {
                true
            }
            fn draw(&mut self, _: &SourceFrame<'_>) -> Result<(), ContextError> {
                panic!("sink exploded");
            }
        }

        let buffer = bgra_buffer(2, 2, 8, |_, _| [0; 4]);
        let result = catch_unwind(AssertUnwindSafe(|| {
            PixelBufferConverter::default().convert_with(&buffer, &mut Exploding)
        }));
        assert!(result.is_err());
        assert_unlocked(&buffer);
    }

    #[test]
    fn distinct_buffers_convert_in_parallel() {
        use rayon::prelude::*;

        let converter = PixelBufferConverter::default();
        let corners: Vec<[u8; 4]> = (0..32u8)
            .into_par_iter()
            .map(|i| {
                let buffer = bgra_buffer(16, 9, 80, |_, _| [i, i, i, 0xFF]);
                let image = converter.convert(&buffer).unwrap();
                assert_unlocked(&buffer);
                image.pixel(15, 8)
            })
            .collect();
        for (i, px) in corners.iter().enumerate() {
            assert_eq!(*px, [i as u8, i as u8, i as u8, 0xFF]);
        }
    }

    #[test]
    fn converter_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PixelBufferConverter>();
        assert_send_sync::<RenderableImage>();
        assert_send_sync::<ConversionError>();
    }

    #[test]
    fn callers_can_drop_failed_frames() {
        #[derive(Debug, thiserror::Error)]
        enum FrameError {
            #[error("frame dropped: {0}")]
            Dropped(#[from] ConversionError),
        }

        fn next_texture(buffer: &MemoryPixelBuffer) -> Result<RenderableImage, FrameError> {
            Ok(convert(buffer)?)
        }

        let good = bgra_buffer(2, 2, 8, |_, _| [1; 4]);
        let bad = MemoryPixelBuffer::packed(2, 2, FormatTag(0x7979_7979), 8, vec![0; 16]).unwrap();
        let frames: Vec<_> = [&good, &bad, &good]
            .into_iter()
            .filter_map(|buffer| next_texture(buffer).ok())
            .collect();
        assert_eq!(frames.len(), 2);

        let err = next_texture(&bad).unwrap_err();
        assert_eq!(
            alloc::format!("{err}"),
            "frame dropped: unsupported pixel format 'yyyy'"
        );
    }
}
