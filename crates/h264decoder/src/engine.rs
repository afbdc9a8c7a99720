//! The boundary between the decoding pipeline and the codec doing the actual
//! H.264 work.
//!
//! [H264Decoder](crate::H264Decoder) only ever talks to a [CodecEngine]: it
//! feeds bytes to the engine's bitstream parser, sends the access unit the
//! parser located, and asks for decoded pictures. [FfmpegEngine] is the real
//! implementation.

mod ffmpeg_engine;
#[cfg(test)]
pub(crate) mod scripted;

pub use ffmpeg_engine::FfmpegEngine;

use ffmpeg::ffi;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg_next as ffmpeg;
use thiserror::Error;

/// A codec that can locate access units in a chunked H.264 byte stream and
/// decode them into pictures.
///
/// The methods mirror FFmpeg's send/receive model: [Self::send_unit] may be
/// refused with [EngineError::Again] while pictures are waiting to be received,
/// and [Self::receive_picture] reports [EngineError::Again] while the codec
/// needs more input.
pub trait CodecEngine: Send {
    /// Feed `input` to the bitstream parser, returning how many of its bytes
    /// were absorbed. Bytes that weren't absorbed have to be offered again.
    ///
    /// After this returns, [Self::current_unit] is non-empty if and only if a
    /// complete access unit was located. An empty `input` asks the parser to
    /// give up whatever unit it's still holding.
    fn parse_bytes(&mut self, input: &[u8]) -> Result<usize, EngineError>;

    /// The access unit located by the last [Self::parse_bytes] call (empty if
    /// there isn't one).
    fn current_unit(&self) -> &[u8];

    /// Send [Self::current_unit] to the decoder.
    fn send_unit(&mut self) -> Result<(), EngineError>;

    /// Tell the decoder no more units are coming, so it releases every picture
    /// it's holding back.
    fn send_drain(&mut self) -> Result<(), EngineError>;

    /// Write the next decoded picture into `picture`.
    ///
    /// [EngineError::Eof] means the decoder was drained and has nothing left.
    fn receive_picture(&mut self, picture: &mut FFmpegVideoFrame) -> Result<(), EngineError>;

    /// Throw away all buffered state so a new stream can be decoded.
    fn reset(&mut self);
}

/// How a [CodecEngine] call can fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("The codec can't accept this call in its current state.")]
    Again,
    #[error("The codec has been drained.")]
    Eof,
    #[error("The codec failed (error code {0}).")]
    Failed(i32),
}

impl EngineError {
    /// The FFmpeg style (negative) error code for this error.
    pub fn code(self) -> i32 {
        match self {
            Self::Again => ffi::AVERROR(ffi::EAGAIN),
            Self::Eof => ffi::AVERROR_EOF,
            Self::Failed(code) => code,
        }
    }
}

impl From<ffmpeg::Error> for EngineError {
    fn from(err: ffmpeg::Error) -> Self {
        match err {
            ffmpeg::Error::Other { errno } if errno == ffi::EAGAIN => Self::Again,
            ffmpeg::Error::Eof => Self::Eof,
            err => Self::Failed(err.into()),
        }
    }
}
