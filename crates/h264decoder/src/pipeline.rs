//! The incremental stream-to-frame pipeline: [H264Decoder] runs bytes through
//! the parser, the decode state machine and the RGB converter.

use std::num::NonZeroU32;
use std::sync::Arc;

use ffmpeg_next::frame::Video as FFmpegVideoFrame;

use util::{debug_log_info, debug_log_warning};

use crate::convert::ConverterRgb24;
use crate::decode::{DecodeEngine, DecodeState};
use crate::engine::{CodecEngine, FfmpegEngine};
use crate::error::{DecodeFailure, H264Error};
use crate::frame::Frame;
use crate::host_lock::{HostLock, NoHostLock, ReverseLockGuard};
use crate::logging::disable_logging;
use crate::parser::StreamParser;

/// Options for creating an [H264Decoder].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderConfig {
    /// Every RGB row starts on a multiple of this many bytes. With the default
    /// of `1`, rows are tightly packed.
    pub row_alignment: NonZeroU32,
    /// Call [disable_logging] when the decoder is created.
    pub quiet_engine_logging: bool,
}

impl DecoderConfig {
    pub fn with_row_alignment(mut self, row_alignment: NonZeroU32) -> Self {
        self.row_alignment = row_alignment;
        self
    }

    pub fn with_quiet_engine_logging(mut self, quiet_engine_logging: bool) -> Self {
        self.quiet_engine_logging = quiet_engine_logging;
        self
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            row_alignment: NonZeroU32::MIN,
            quiet_engine_logging: false,
        }
    }
}

/// The result of one [H264Decoder::decode_one] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The frame that came out, if any.
    pub frame: Option<Frame>,
    /// How many of the offered bytes were absorbed. The rest has to be offered
    /// again.
    pub consumed: usize,
}

/// Running totals for an [H264Decoder].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub bytes_consumed: u64,
    pub units_decoded: u64,
    pub frames_emitted: u64,
    pub state: DecodeState,
}

/// Decodes a raw H.264 elementary stream (Annex B), handed over in chunks of
/// any size, into RGB24 [Frame]s.
///
/// One decoder handles one bitstream. Call [Self::flush] once the stream ends
/// to get the frames the codec is still holding back.
///
/// # Example
///
/// ```no_run
/// use h264decoder::H264Decoder;
///
/// let stream = std::fs::read("video.h264").unwrap();
/// let mut decoder = H264Decoder::new().unwrap();
///
/// let mut frames = Vec::new();
/// for chunk in stream.chunks(1024) {
///     frames.extend(decoder.decode_all(chunk).unwrap());
/// }
/// frames.extend(decoder.flush().unwrap());
/// ```
pub struct H264Decoder<E: CodecEngine = FfmpegEngine> {
    engine: E,
    parser: StreamParser,
    decode: DecodeEngine,
    converter: ConverterRgb24,
    host_lock: Arc<dyn HostLock>,
    frames_emitted: u64,
}

impl H264Decoder<FfmpegEngine> {
    /// Create a decoder backed by FFmpeg with the default [DecoderConfig].
    pub fn new() -> Result<Self, H264Error> {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder backed by FFmpeg.
    pub fn with_config(config: DecoderConfig) -> Result<Self, H264Error> {
        if config.quiet_engine_logging {
            disable_logging();
        }
        Self::with_engine(FfmpegEngine::new()?, config)
    }
}

impl<E: CodecEngine> H264Decoder<E> {
    /// Create a decoder backed by any [CodecEngine].
    pub fn with_engine(engine: E, config: DecoderConfig) -> Result<Self, H264Error> {
        if config.quiet_engine_logging {
            disable_logging();
        }

        Ok(Self {
            engine,
            parser: StreamParser::default(),
            decode: DecodeEngine::new()?,
            converter: ConverterRgb24::new(config.row_alignment),
            host_lock: Arc::new(NoHostLock),
            frames_emitted: 0,
        })
    }

    /// Release `host_lock` while decoding and converting. The caller is
    /// expected to hold it whenever it calls into the decoder.
    pub fn with_host_lock(mut self, host_lock: Arc<dyn HostLock>) -> Self {
        self.host_lock = host_lock;
        self
    }

    /// Run `bytes` through the pipeline until either a frame comes out or the
    /// bytes that were consumed don't complete an access unit.
    ///
    /// Empty `bytes` is a drain probe: it releases one frame the parser or the
    /// codec is still holding (see [Self::flush]).
    pub fn decode_one(&mut self, bytes: &[u8]) -> Result<Decoded, H264Error> {
        let host_lock = Arc::clone(&self.host_lock);
        let mut guard = ReverseLockGuard::new(&*host_lock);

        if bytes.is_empty() {
            return self.drain_one(&mut guard);
        }

        match self.decode.state() {
            DecodeState::Flushing => {
                debug_log_warning!(
                    "Got more input before the flush finished, dropping the pictures it still held."
                );
                self.decode.restart(&mut self.engine);
            }
            DecodeState::Drained => {
                debug_log_info!("Got more input after draining, starting a new stream.");
                self.decode.restart(&mut self.engine);
            }
            _ => {}
        }

        let parsed = self
            .parser
            .parse(&mut self.engine, bytes)
            .map_err(|cause| H264Error::decode(cause, 0))?;
        self.decode.note_parsed(parsed.unit_ready);

        let consumed = parsed.consumed;
        if !parsed.unit_ready {
            return Ok(Decoded {
                frame: None,
                consumed,
            });
        }

        let fail = |cause| H264Error::decode(cause, consumed);

        let Some(picture) = self
            .decode
            .decode_current_unit(&mut self.engine)
            .map_err(fail)?
        else {
            return Ok(Decoded {
                frame: None,
                consumed,
            });
        };

        let frame = emit_frame(&mut self.converter, picture, &mut guard).map_err(fail)?;
        self.frames_emitted += 1;

        Ok(Decoded {
            frame: Some(frame),
            consumed,
        })
    }

    /// The same as [Self::decode_one], just shaped as `(frame, consumed)`.
    pub fn decode_frame(&mut self, bytes: &[u8]) -> Result<(Option<Frame>, usize), H264Error> {
        self.decode_one(bytes)
            .map(|decoded| (decoded.frame, decoded.consumed))
    }

    /// Decode every frame that `bytes` completes.
    ///
    /// A unit that fails to decode is skipped as long as the failing call
    /// consumed something. The call fails with [DecodeFailure::Stalled] if two
    /// iterations in a row consume nothing (and produce no frame).
    pub fn decode_all(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, H264Error> {
        let mut frames = Vec::new();
        let mut remaining = bytes;

        // The first iteration that makes no progress is given a pass.
        let mut previous_consumed = true;

        while !remaining.is_empty() {
            match self.decode_one(remaining) {
                Ok(Decoded { frame, consumed }) => {
                    if consumed == 0 && frame.is_none() && !previous_consumed {
                        return Err(H264Error::decode(DecodeFailure::Stalled, 0));
                    }

                    previous_consumed = consumed > 0;
                    frames.extend(frame);
                    remaining = &remaining[consumed..];
                }
                Err(H264Error::DecodeFailure { cause, consumed }) if consumed > 0 => {
                    debug_log_warning!("Skipping {consumed} bytes that failed to decode: {cause}");
                    previous_consumed = true;
                    remaining = &remaining[consumed..];
                }
                Err(err) => return Err(err),
            }
        }

        Ok(frames)
    }

    /// Drain every frame still held by the parser or the codec. Call this once
    /// the stream ends. Calling it again returns nothing.
    pub fn flush(&mut self) -> Result<Vec<Frame>, H264Error> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode_one(&[])?.frame {
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            bytes_consumed: self.parser.bytes_parsed(),
            units_decoded: self.decode.units_decoded(),
            frames_emitted: self.frames_emitted,
            state: self.decode.state(),
        }
    }

    /// How many bytes of RGB data a `width` x `height` frame from this
    /// decoder takes up (row padding included).
    pub fn frame_size(&self, width: u32, height: u32) -> Result<usize, H264Error> {
        self.converter
            .predict_size(width, height)
            .map_err(|cause| H264Error::decode(cause, 0))
    }

    fn drain_one(&mut self, guard: &mut ReverseLockGuard<'_>) -> Result<Decoded, H264Error> {
        let fail = |cause| H264Error::decode(cause, 0);

        if !matches!(
            self.decode.state(),
            DecodeState::Flushing | DecodeState::Drained
        ) {
            // The parser gives up its last units before the codec is drained.
            loop {
                let parsed = self.parser.parse(&mut self.engine, &[]).map_err(fail)?;
                if !parsed.unit_ready {
                    break;
                }
                self.decode.note_parsed(true);

                if let Some(picture) = self
                    .decode
                    .decode_current_unit(&mut self.engine)
                    .map_err(fail)?
                {
                    let frame = emit_frame(&mut self.converter, picture, guard).map_err(fail)?;
                    self.frames_emitted += 1;
                    return Ok(Decoded {
                        frame: Some(frame),
                        consumed: 0,
                    });
                }
            }
        }

        let was_drained = self.decode.state() == DecodeState::Drained;

        let Some(picture) = self.decode.drain_next(&mut self.engine).map_err(fail)? else {
            if !was_drained {
                debug_log_info!(
                    "Stream drained: {} units located, {} pictures decoded.",
                    self.parser.units_found(),
                    self.decode.slot().generation()
                );
            }
            return Ok(Decoded::default());
        };

        let frame = emit_frame(&mut self.converter, picture, guard).map_err(fail)?;
        self.frames_emitted += 1;

        Ok(Decoded {
            frame: Some(frame),
            consumed: 0,
        })
    }
}

/// Convert `picture` into a new [Frame]. The output buffer is allocated with
/// the host lock held and filled with it released.
fn emit_frame(
    converter: &mut ConverterRgb24,
    picture: &FFmpegVideoFrame,
    guard: &mut ReverseLockGuard<'_>,
) -> Result<Frame, DecodeFailure> {
    let size = converter.predict_size(picture.width(), picture.height())?;

    guard.lock();
    let mut data = vec![0; size];
    guard.unlock();

    let layout = converter.convert(picture, &mut data)?;
    data.truncate(layout.bytes_written);

    Frame::new(
        data,
        layout.dimensions.width(),
        layout.dimensions.height(),
        layout.row_stride,
    )
    .ok_or(DecodeFailure::BufferTooSmall {
        expected: layout.row_stride * layout.dimensions.height() as usize,
        actual: layout.bytes_written,
    })
}
