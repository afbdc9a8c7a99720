//! FFmpeg's process-wide setup: initialization and its own log output.

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use ctor::ctor;

use ffmpeg::util::log::Level as FFmpegLogLevel;
use ffmpeg_next as ffmpeg;

use util::debug_log_info;

/// Silence FFmpeg's own logging (e.g. warnings about corrupt units) for the
/// whole process.
///
/// Only the first call does anything and there's no way to turn logging back
/// on. This is independent of the [util::debug_log] macros.
pub fn disable_logging() {
    static QUIET: Once = Once::new();

    QUIET.call_once(|| {
        ffmpeg::util::log::set_level(FFmpegLogLevel::Quiet);
        debug_log_info!("FFmpeg logging disabled.");
    });
}

/// Initializes FFmpeg. This happens when the [crate] is loaded.
///
/// You should never actually call this function.
#[ctor]
fn ffmpeg_init() {
    #[cfg(debug_assertions)]
    {
        static ALREADY_INIT: AtomicBool = AtomicBool::new(false);
        assert!(
            !ALREADY_INIT.swap(true, Ordering::SeqCst),
            "Tried to initialize FFmpeg twice. \
            THIS WOULD NOT HAVE BEEN CAUGHT IN A RELEASE BUILD."
        );
    }

    ffmpeg::init().expect("FFmpeg shouldn't fail to initialize.");
}
