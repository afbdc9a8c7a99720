//! The failure taxonomy shared by every stage of the decoder.

use thiserror::Error;

/// Everything that can go wrong creating or driving an
/// [H264Decoder](crate::H264Decoder).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum H264Error {
    /// The decoder couldn't be created. This is never retried.
    #[error("Failed to create the decoder: {0}")]
    InitFailure(#[from] InitFailure),
    /// A decode call failed after absorbing `consumed` input bytes. Skipping
    /// those bytes and carrying on is only safe when `consumed` isn't `0`.
    #[error("Decoding failed after consuming {consumed} bytes: {cause}")]
    DecodeFailure { cause: DecodeFailure, consumed: usize },
}

impl H264Error {
    /// Wrap a [DecodeFailure] that happened after `consumed` bytes were
    /// absorbed.
    pub const fn decode(cause: DecodeFailure, consumed: usize) -> Self {
        Self::DecodeFailure { cause, consumed }
    }

    /// How many input bytes the failing call absorbed (always `0` for
    /// [H264Error::InitFailure]).
    pub const fn consumed(&self) -> usize {
        match self {
            Self::InitFailure(_) => 0,
            Self::DecodeFailure { consumed, .. } => *consumed,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitFailure {
    #[error("No H.264 decoder is available in the linked FFmpeg.")]
    DecoderNotFound,
    #[error("Failed to open the H.264 decoder context.")]
    ContextOpenFailure,
    #[error("Failed to initialize the H.264 bitstream parser.")]
    ParserInitFailure,
    #[error("Failed to allocate the decoded picture slot.")]
    PictureAllocFailure,
    #[error("Failed to start the decode worker thread.")]
    WorkerSpawnFailure,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("The bitstream parser failed (error code {code}).")]
    ParseFailed { code: i32 },
    #[error("The codec failed to decode an access unit (error code {code}).")]
    DecodeFailed { code: i32 },
    #[error("The decoder stopped consuming input without producing frames.")]
    Stalled,
    #[error("Failed to create the RGB conversion context.")]
    ConverterCreateFailure,
    #[error("Failed to convert a picture to RGB (error code {code}).")]
    ConvertFailed { code: i32 },
    #[error("Decoded pictures can't have a 0-length side ({0}x{1} has no area).")]
    ZeroLengthSide(u32, u32),
    #[error(
        "The output buffer should be at least {expected} bytes long \
        but is only {actual} bytes long."
    )]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("The decode worker thread is gone.")]
    WorkerDisconnected,
    #[error("The frames for this request were already taken.")]
    AlreadyTaken,
}
