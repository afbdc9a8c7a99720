//! The third pipeline stage: rewriting decoded pictures as packed RGB24 into
//! a caller-supplied buffer.

use std::ffi::c_int;
use std::num::NonZeroU32;
use std::ptr;

use ffmpeg::ffi;
use ffmpeg::format::Pixel as FFmpegPixelFormat;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg::software::scaling::Context as FFmpegScalingContext;
use ffmpeg::software::scaling::flag::Flags as FFmpegScalingFlags;
use ffmpeg_next as ffmpeg;

use util::debug_log_info;

use crate::error::DecodeFailure;
use crate::frame::Dimensions;

/// Where [ConverterRgb24::convert] put the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbLayout {
    pub dimensions: Dimensions,
    /// Bytes between the starts of consecutive rows.
    pub row_stride: usize,
    /// How many bytes of the output buffer hold the picture (padding included).
    pub bytes_written: usize,
}

/// Converts decoded pictures of any pixel format to RGB24 with the same
/// geometry. The scaling context is kept around and only rebuilt when the
/// source format or dimensions change.
pub struct ConverterRgb24 {
    scaler: Option<CachedScaler>,
    row_alignment: NonZeroU32,
}

struct CachedScaler {
    context: FFmpegScalingContext,
    source: (FFmpegPixelFormat, Dimensions),
}

impl ConverterRgb24 {
    /// Create a converter whose rows start on multiples of `row_alignment`
    /// bytes (`1` for tightly packed rows).
    pub fn new(row_alignment: NonZeroU32) -> Self {
        Self {
            scaler: None,
            row_alignment,
        }
    }

    /// How many bytes a buffer needs to hold a `width` x `height` RGB24
    /// picture. The result only depends on the arguments and the row
    /// alignment.
    pub fn predict_size(&self, width: u32, height: u32) -> Result<usize, DecodeFailure> {
        let (width, height) = c_sides(width, height)?;

        // SAFETY: This only does arithmetic on its arguments.
        let size = unsafe {
            ffi::av_image_get_buffer_size(
                ffi::AVPixelFormat::AV_PIX_FMT_RGB24,
                width,
                height,
                self.align(),
            )
        };

        usize::try_from(size).map_err(|_| DecodeFailure::ConvertFailed { code: size })
    }

    /// Convert `picture` into `out`, which must be at least
    /// [Self::predict_size] bytes long.
    pub fn convert(
        &mut self,
        picture: &FFmpegVideoFrame,
        out: &mut [u8],
    ) -> Result<RgbLayout, DecodeFailure> {
        let dimensions = Dimensions::new(picture.width(), picture.height())
            .ok_or(DecodeFailure::ZeroLengthSide(picture.width(), picture.height()))?;

        let expected = self.predict_size(dimensions.width(), dimensions.height())?;
        if out.len() < expected {
            return Err(DecodeFailure::BufferTooSmall {
                expected,
                actual: out.len(),
            });
        }

        let (width, height) = c_sides(dimensions.width(), dimensions.height())?;
        let align = self.align();
        let scaler = self.scaler_for(picture.format(), dimensions)?;

        let mut dst_data = [ptr::null_mut::<u8>(); 4];
        let mut dst_linesize: [c_int; 4] = [0; 4];

        // SAFETY: `out` is at least `av_image_get_buffer_size` bytes for this
        // geometry and alignment, which is exactly what gets laid out.
        let filled = unsafe {
            ffi::av_image_fill_arrays(
                dst_data.as_mut_ptr(),
                dst_linesize.as_mut_ptr(),
                out.as_mut_ptr(),
                ffi::AVPixelFormat::AV_PIX_FMT_RGB24,
                width,
                height,
                align,
            )
        };
        if filled < 0 {
            return Err(DecodeFailure::ConvertFailed { code: filled });
        }

        // SAFETY: The scaler was built for this picture's format and
        // dimensions, the source planes belong to the picture, and the
        // destination plane was just laid out inside `out`.
        let rows = unsafe {
            let source = picture.as_ptr();
            ffi::sws_scale(
                scaler.as_mut_ptr(),
                (*source).data.as_ptr() as *const *const u8,
                (*source).linesize.as_ptr(),
                0,
                height,
                dst_data.as_ptr(),
                dst_linesize.as_ptr(),
            )
        };
        if rows < 0 {
            return Err(DecodeFailure::ConvertFailed { code: rows });
        }

        Ok(RgbLayout {
            dimensions,
            row_stride: dst_linesize[0] as usize,
            bytes_written: filled as usize,
        })
    }

    fn scaler_for(
        &mut self,
        format: FFmpegPixelFormat,
        dimensions: Dimensions,
    ) -> Result<&mut FFmpegScalingContext, DecodeFailure> {
        let source = (format, dimensions);

        if self.scaler.as_ref().is_none_or(|cached| cached.source != source) {
            let context = FFmpegScalingContext::get(
                // Src. format:
                format,
                dimensions.width(),
                dimensions.height(),
                // Dest. format (same geometry, so only the colors change):
                FFmpegPixelFormat::RGB24,
                dimensions.width(),
                dimensions.height(),
                FFmpegScalingFlags::BILINEAR,
            )
            .map_err(|_| DecodeFailure::ConverterCreateFailure)?;

            debug_log_info!("Created an RGB24 converter for {dimensions} {format:?} pictures.");
            self.scaler = Some(CachedScaler { context, source });
        }

        self.scaler
            .as_mut()
            .map(|cached| &mut cached.context)
            .ok_or(DecodeFailure::ConverterCreateFailure)
    }

    fn align(&self) -> c_int {
        c_int::try_from(self.row_alignment.get()).unwrap_or(c_int::MAX)
    }
}

/// SAFETY: The [FFmpegScalingContext] stored in a [ConverterRgb24] *is* safe to
/// send between threads, `ffmpeg-next` just doesn't mark it [Send] (see
/// https://github.com/zmwangx/rust-ffmpeg/issues/252). It's only ever used
/// through `&mut self`.
unsafe impl Send for ConverterRgb24 {}

fn c_sides(width: u32, height: u32) -> Result<(c_int, c_int), DecodeFailure> {
    if width == 0 || height == 0 {
        return Err(DecodeFailure::ZeroLengthSide(width, height));
    }

    match (c_int::try_from(width), c_int::try_from(height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(DecodeFailure::ConvertFailed {
            code: ffi::AVERROR_INVALIDDATA,
        }),
    }
}
