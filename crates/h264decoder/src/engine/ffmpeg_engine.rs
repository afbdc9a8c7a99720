//! This module contains [FfmpegEngine], the [CodecEngine] backed by FFmpeg's
//! H.264 bitstream parser and decoder.

use std::ffi::c_int;
use std::ptr::{self, NonNull};
use std::slice;

use ffmpeg::codec::Context as FFmpegCodecContext;
use ffmpeg::codec::Id as FFmpegCodecId;
use ffmpeg::codec::decoder::Video as FFmpegVideoDecoder;
use ffmpeg::ffi;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg_next as ffmpeg;

use util::debug_log_info;

use super::{CodecEngine, EngineError};
use crate::error::InitFailure;

/// A [CodecEngine] using FFmpeg's (`libavcodec`'s) H.264 parser and decoder.
pub struct FfmpegEngine {
    decoder: FFmpegVideoDecoder,
    parser: NonNull<ffi::AVCodecParserContext>,
    /// A copy of the last unit the parser located. The parser's own output
    /// can point into the caller's input, which doesn't outlive the call.
    unit: Vec<u8>,
}

impl FfmpegEngine {
    /// Find and open the H.264 decoder and create a parser for it.
    pub fn new() -> Result<Self, InitFailure> {
        let codec =
            ffmpeg::decoder::find(FFmpegCodecId::H264).ok_or(InitFailure::DecoderNotFound)?;

        // `video()` opens the decoder for us.
        let decoder = FFmpegCodecContext::new_with_codec(codec)
            .decoder()
            .video()
            .map_err(|_| InitFailure::ContextOpenFailure)?;

        let parser = new_parser().ok_or(InitFailure::ParserInitFailure)?;

        debug_log_info!("Opened the FFmpeg H.264 decoder and parser.");

        Ok(Self {
            decoder,
            parser,
            unit: Vec::new(),
        })
    }
}

impl CodecEngine for FfmpegEngine {
    fn parse_bytes(&mut self, input: &[u8]) -> Result<usize, EngineError> {
        // Anything past `c_int::MAX` just gets reported as not consumed.
        let input_len = c_int::try_from(input.len()).unwrap_or(c_int::MAX);

        let mut out_data: *mut u8 = ptr::null_mut();
        let mut out_size: c_int = 0;

        // SAFETY: The parser and the decoder context are both alive for as
        // long as `self` is, and `input` is readable for `input_len` bytes.
        // FFmpeg substitutes its own padded buffer when `input_len` is 0.
        let consumed = unsafe {
            ffi::av_parser_parse2(
                self.parser.as_ptr(),
                self.decoder.as_mut_ptr(),
                &mut out_data,
                &mut out_size,
                input.as_ptr(),
                input_len,
                ffi::AV_NOPTS_VALUE,
                ffi::AV_NOPTS_VALUE,
                0,
            )
        };

        if consumed < 0 {
            return Err(EngineError::Failed(consumed));
        }

        self.unit.clear();
        if !out_data.is_null() && out_size > 0 {
            // SAFETY: The parser reported `out_size` readable bytes at
            // `out_data`. They stay valid until the next parser call, and we
            // copy them out right now.
            let unit = unsafe { slice::from_raw_parts(out_data, out_size as usize) };
            self.unit.extend_from_slice(unit);
        }

        Ok(consumed as usize)
    }

    fn current_unit(&self) -> &[u8] {
        &self.unit
    }

    fn send_unit(&mut self) -> Result<(), EngineError> {
        let packet = ffmpeg::Packet::copy(&self.unit);
        self.decoder.send_packet(&packet).map_err(EngineError::from)
    }

    fn send_drain(&mut self) -> Result<(), EngineError> {
        self.decoder.send_eof().map_err(EngineError::from)
    }

    fn receive_picture(&mut self, picture: &mut FFmpegVideoFrame) -> Result<(), EngineError> {
        self.decoder.receive_frame(picture).map_err(EngineError::from)
    }

    fn reset(&mut self) {
        // Leaves draining mode and drops every buffered picture.
        self.decoder.flush();
        self.unit.clear();

        // A fresh parser forgets any partial unit. If one can't be made, the
        // old parser (which was flushed by the drain) keeps working.
        if let Some(parser) = new_parser() {
            let old_parser = std::mem::replace(&mut self.parser, parser);
            // SAFETY: `old_parser` came from `av_parser_init` and isn't
            // referenced anywhere anymore.
            unsafe { ffi::av_parser_close(old_parser.as_ptr()) };
        }
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        // SAFETY: `self.parser` came from `av_parser_init` and is closed
        // exactly once, here. The decoder closes itself.
        unsafe { ffi::av_parser_close(self.parser.as_ptr()) };
    }
}

/// SAFETY: The parser and decoder contexts are only ever touched through
/// `&mut self`, so moving the engine to another thread can't race. FFmpeg
/// keeps no thread-local state for either of them.
unsafe impl Send for FfmpegEngine {}

fn new_parser() -> Option<NonNull<ffi::AVCodecParserContext>> {
    // SAFETY: `av_parser_init` has no preconditions and returns null on
    // failure.
    let parser = unsafe { ffi::av_parser_init(ffi::AVCodecID::AV_CODEC_ID_H264 as c_int) };
    NonNull::new(parser)
}
