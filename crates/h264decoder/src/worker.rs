//! Decoding on a background thread, for callers that want to keep their own
//! thread free while frames are produced.

use util::channels::ChannelError;
use util::channels::request_channel::{self, Client, Request, Server};
use util::debug_log_info;
use util::drop_join_thread::{self, DropJoinHandle};

use crate::engine::{CodecEngine, FfmpegEngine};
use crate::error::{DecodeFailure, H264Error, InitFailure};
use crate::frame::Frame;
use crate::pipeline::{DecoderConfig, H264Decoder};

enum WorkerRequest {
    Decode(Vec<u8>),
    Flush,
}

type WorkerResponse = Result<Vec<Frame>, H264Error>;

/// Owns an [H264Decoder] on its own thread. Requests are handled one at a
/// time, in the order they were made.
///
/// Dropping the worker lets it finish the requests already made and then joins
/// its thread.
pub struct DecodeWorker {
    // Dropped first so the thread stops waiting before it's joined.
    client: Client<WorkerRequest, WorkerResponse>,
    _thread: DropJoinHandle<()>,
}

impl DecodeWorker {
    /// Start a worker with an FFmpeg-backed decoder.
    pub fn spawn(config: DecoderConfig) -> Result<Self, H264Error> {
        Self::new(H264Decoder::<FfmpegEngine>::with_config(config)?)
    }

    /// Move `decoder` onto a new worker thread.
    pub fn new<E: CodecEngine + 'static>(decoder: H264Decoder<E>) -> Result<Self, H264Error> {
        let (server, client) = request_channel::new();

        let thread = drop_join_thread::spawn_named("h264-decode-worker", move || {
            serve(decoder, server);
        })
        .map_err(|_| InitFailure::WorkerSpawnFailure)?;

        Ok(Self {
            client,
            _thread: thread,
        })
    }

    /// Decode `bytes` and wait for the frames they complete.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Frame>, H264Error> {
        self.submit(bytes.to_vec())?.wait()
    }

    /// Drain the decoder and wait for the frames it was holding back.
    pub fn flush(&self) -> Result<Vec<Frame>, H264Error> {
        self.submit_flush()?.wait()
    }

    /// Queue `bytes` for decoding without waiting.
    pub fn submit(&self, bytes: Vec<u8>) -> Result<PendingFrames, H264Error> {
        self.request(WorkerRequest::Decode(bytes))
    }

    /// Queue a flush without waiting.
    pub fn submit_flush(&self) -> Result<PendingFrames, H264Error> {
        self.request(WorkerRequest::Flush)
    }

    /// How many requests the worker hasn't started on yet.
    pub fn queued(&self) -> usize {
        self.client.requests_in_flight()
    }

    fn request(&self, request: WorkerRequest) -> Result<PendingFrames, H264Error> {
        self.client
            .request(request)
            .map(PendingFrames)
            .map_err(channel_failure)
    }
}

/// The frames a [DecodeWorker] request will produce.
pub struct PendingFrames(Request<WorkerResponse>);

impl PendingFrames {
    /// Block until the worker is done with the request.
    pub fn wait(mut self) -> Result<Vec<Frame>, H264Error> {
        self.0.wait().map_err(channel_failure)?
    }

    /// Take the frames if the worker is done with the request. Once they were
    /// taken, this fails with [DecodeFailure::AlreadyTaken].
    pub fn try_take(&mut self) -> Result<Option<Vec<Frame>>, H264Error> {
        self.0.check().map_err(channel_failure)?.transpose()
    }
}

fn serve<E: CodecEngine>(
    mut decoder: H264Decoder<E>,
    server: Server<WorkerRequest, WorkerResponse>,
) {
    while let Ok((request, response)) = server.wait() {
        let result = match request {
            WorkerRequest::Decode(bytes) => decoder.decode_all(&bytes),
            WorkerRequest::Flush => decoder.flush(),
        };

        if response.respond(result).is_err() {
            debug_log_info!("Frames were decoded for a request nobody is waiting on.");
        }
    }

    debug_log_info!(
        "Decode worker stopping after {} frames.",
        decoder.stats().frames_emitted
    );
}

fn channel_failure(err: ChannelError) -> H264Error {
    let cause = match err {
        ChannelError::ResponseAlreadyReceived => DecodeFailure::AlreadyTaken,
        ChannelError::ConnectionDropped => DecodeFailure::WorkerDisconnected,
    };
    H264Error::decode(cause, 0)
}
