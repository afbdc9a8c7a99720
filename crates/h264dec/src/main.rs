mod args;
mod frame_saver;

use std::collections::VecDeque;
use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use h264decoder::{DecodeWorker, DecoderConfig, Frame, H264Decoder, H264Error};
use thiserror::Error;
use util::{debug_log_info, eprintln_and_exit};

use args::Args;
use frame_saver::{FrameSaver, SaveError};

/// How many chunks the worker may have queued up when decoding with
/// `--threaded`.
const WORKER_QUEUE_LEN: usize = 4;

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Decode(#[from] H264Error),
    #[error(transparent)]
    Save(#[from] SaveError),
}

fn main() -> ExitCode {
    let args = Args::default();

    #[cfg(debug_assertions)]
    {
        use util::debug_log;
        if args.no_debug_logging {
            debug_log::disable();
        } else if !args.debug_error_log_panics {
            debug_log::panic_on_errors::disable();
        }
    }

    let stream = fs::read(&args.input).unwrap_or_else(|e| {
        eprintln_and_exit!("Failed to read `{}`: {e}", args.input.display());
    });

    let mut frame_saver = FrameSaver::with_fresh_out_dir(&args.out_dir, args.format, args.save)
        .unwrap_or_else(|e| eprintln_and_exit!("{e}"));

    let config = DecoderConfig::default()
        .with_row_alignment(args.row_alignment)
        .with_quiet_engine_logging(args.quiet_ffmpeg);

    let start = Instant::now();
    let result = if args.threaded {
        decode_on_worker(&args, config, &stream, &mut frame_saver)
    } else {
        decode_inline(&args, config, &stream, &mut frame_saver)
    };

    let frame_count = match result {
        Ok(frame_count) => frame_count,
        Err(e) => {
            util::debug_log_error!("{e:?}");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let seconds = start.elapsed().as_secs_f64();
    println!(
        "Decoded {frame_count} frames from {} bytes in {seconds:.3}s ({:.1} fps), saved {}.",
        stream.len(),
        frame_count as f64 / seconds.max(f64::EPSILON),
        frame_saver.saved()
    );

    ExitCode::SUCCESS
}

fn decode_inline(
    args: &Args,
    config: DecoderConfig,
    stream: &[u8],
    frame_saver: &mut FrameSaver,
) -> Result<usize, RunError> {
    let mut decoder = H264Decoder::with_config(config)?;
    let mut frame_count = 0;

    for chunk in stream.chunks(args.chunk_size.get()) {
        frame_count += save_all(decoder.decode_all(chunk)?, frame_saver)?;
    }
    if !args.no_flush {
        frame_count += save_all(decoder.flush()?, frame_saver)?;
    }

    debug_log_info!("{:?}", decoder.stats());
    Ok(frame_count)
}

fn decode_on_worker(
    args: &Args,
    config: DecoderConfig,
    stream: &[u8],
    frame_saver: &mut FrameSaver,
) -> Result<usize, RunError> {
    let worker = DecodeWorker::spawn(config)?;
    let mut pending = VecDeque::with_capacity(WORKER_QUEUE_LEN);
    let mut frame_count = 0;

    for chunk in stream.chunks(args.chunk_size.get()) {
        if pending.len() == WORKER_QUEUE_LEN
            && let Some(oldest) = pending.pop_front()
        {
            frame_count += save_all(oldest.wait()?, frame_saver)?;
        }
        pending.push_back(worker.submit(chunk.to_vec())?);
    }

    for request in pending {
        frame_count += save_all(request.wait()?, frame_saver)?;
    }
    if !args.no_flush {
        frame_count += save_all(worker.flush()?, frame_saver)?;
    }

    Ok(frame_count)
}

fn save_all(frames: Vec<Frame>, frame_saver: &mut FrameSaver) -> Result<usize, SaveError> {
    for frame in &frames {
        frame_saver.save(frame)?;
    }
    Ok(frames.len())
}
