//! Contains [Args], which are parsed command-line flags.

use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Parsed command line arguments.
#[derive(Parser, Debug, Clone, PartialEq, Eq, Hash)]
#[command(about = "Decodes a raw H.264 stream into RGB frames.")]
pub struct Args {
    /// A raw H.264 elementary stream (Annex B, e.g. a `.h264` file).
    pub input: PathBuf,

    /// How many bytes are handed to the decoder at a time.
    #[arg(long, default_value = "1024")]
    pub chunk_size: NonZeroUsize,

    /// Where decoded frames are saved.
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Save (at most) this many frames. `0` saves none.
    #[arg(long, default_value_t = 10)]
    pub save: usize,

    /// The file format saved frames are written in.
    #[arg(long, value_enum, default_value_t = SaveFormat::Ppm)]
    pub format: SaveFormat,

    /// Don't drain the pictures the decoder is still holding at the end.
    #[arg(long)]
    pub no_flush: bool,

    /// Silence FFmpeg's own log output.
    #[arg(long)]
    pub quiet_ffmpeg: bool,

    /// Decode on a worker thread while frames are saved on this one.
    #[arg(long)]
    pub threaded: bool,

    /// Pad each RGB row to a multiple of this many bytes.
    #[arg(long, default_value = "1")]
    pub row_alignment: NonZeroU32,

    #[cfg(debug_assertions)]
    /// Disable debug logging. This option only exists if `debug_assertions` are
    /// enabled.
    #[arg(long)]
    pub no_debug_logging: bool,

    #[cfg(debug_assertions)]
    /// Enable debug error log panics. This option only exists if
    /// `debug_assertions` are enabled.
    #[arg(long, conflicts_with = "no_debug_logging")]
    pub debug_error_log_panics: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self::parse()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveFormat {
    /// Binary PPM (`P6`).
    Ppm,
    Png,
}

impl SaveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ppm => "ppm",
            Self::Png => "png",
        }
    }
}
