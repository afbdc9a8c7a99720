//! This library decodes raw H.264 elementary streams, handed over in chunks of
//! any size, into RGB24 frames. See [H264Decoder].

mod convert;
mod decode;
pub mod engine;
mod error;
pub mod frame;
pub mod host_lock;
mod logging;
mod parser;
mod pipeline;
mod worker;

pub use convert::{ConverterRgb24, RgbLayout};
pub use decode::DecodeState;
pub use engine::{CodecEngine, EngineError, FfmpegEngine};
pub use error::{DecodeFailure, H264Error, InitFailure};
pub use frame::{Dimensions, Frame};
pub use host_lock::{CoordinationGuard, CoordinationLock, HostLock, NoHostLock, ReverseLockGuard};
pub use logging::disable_logging;
pub use pipeline::{Decoded, DecoderConfig, DecoderStats, H264Decoder};
pub use worker::{DecodeWorker, PendingFrames};
