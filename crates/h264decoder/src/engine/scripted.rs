//! A [CodecEngine] test double that understands a made-up bitstream, so the
//! pipeline can be tested without real H.264 data.
//!
//! Units are delimited by `00 00 01` start codes (like Annex B) and the first
//! byte after the start code is the unit's payload:
//!
//! - [PARAMETER_SET] is accepted but never produces a picture.
//! - [CORRUPT] makes the decoder fail.
//! - Anything else becomes a flat grey 4:2:0 picture with that luma value.
//!
//! Like a real parser, a unit is only complete once the next start code shows
//! up (or the parser is flushed with empty input).

use std::collections::VecDeque;

use ffmpeg::ffi;
use ffmpeg::format::Pixel as FFmpegPixelFormat;
use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg_next as ffmpeg;

use super::{CodecEngine, EngineError};

pub const START_CODE: [u8; 3] = [0, 0, 1];
pub const PARAMETER_SET: u8 = 0x07;
pub const CORRUPT: u8 = 0xee;

/// Build a stream with one unit per payload byte.
pub fn stream(payloads: &[u8]) -> Vec<u8> {
    payloads
        .iter()
        .flat_map(|&payload| START_CODE.into_iter().chain([payload]))
        .collect()
}

pub struct ScriptedEngine {
    carry: Vec<u8>,
    unit: Vec<u8>,
    /// Luma values of units that were sent but not received yet.
    held_back: VecDeque<u8>,
    reorder_delay: usize,
    queue_limit: Option<usize>,
    draining: bool,
    stalled: bool,
    idle_parses: usize,
    parse_failures: usize,
    width: u32,
    height: u32,
    pub resets: usize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            carry: Vec::new(),
            unit: Vec::new(),
            held_back: VecDeque::new(),
            reorder_delay: 0,
            queue_limit: None,
            draining: false,
            stalled: false,
            idle_parses: 0,
            parse_failures: 0,
            width: 16,
            height: 16,
            resets: 0,
        }
    }

    /// Hold back this many pictures until more units arrive or the engine is
    /// drained (like B-frame reordering).
    pub fn with_reorder_delay(mut self, reorder_delay: usize) -> Self {
        self.reorder_delay = reorder_delay;
        self
    }

    /// Refuse new units with [EngineError::Again] while this many pictures are
    /// waiting to be received.
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = Some(queue_limit);
        self
    }

    /// Never consume a single byte.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Consume nothing from the next `idle_parses` non-empty inputs.
    pub fn with_idle_parses(mut self, idle_parses: usize) -> Self {
        self.idle_parses = idle_parses;
        self
    }

    /// Reject the next `parse_failures` non-empty inputs with
    /// `AVERROR_INVALIDDATA`, without consuming anything.
    pub fn with_parse_failures(mut self, parse_failures: usize) -> Self {
        self.parse_failures = parse_failures;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl CodecEngine for ScriptedEngine {
    fn parse_bytes(&mut self, input: &[u8]) -> Result<usize, EngineError> {
        self.unit.clear();

        if self.stalled {
            return Ok(0);
        }

        if input.is_empty() {
            self.unit = std::mem::take(&mut self.carry);
            return Ok(0);
        }

        if self.idle_parses > 0 {
            self.idle_parses -= 1;
            return Ok(0);
        }
        if self.parse_failures > 0 {
            self.parse_failures -= 1;
            return Err(EngineError::Failed(ffi::AVERROR_INVALIDDATA));
        }

        for (i, &byte) in input.iter().enumerate() {
            self.carry.push(byte);

            if self.carry.len() > START_CODE.len() && self.carry.ends_with(&START_CODE) {
                let next_start = self.carry.len() - START_CODE.len();
                self.unit = self.carry.drain(..next_start).collect();
                return Ok(i + 1);
            }
        }

        Ok(input.len())
    }

    fn current_unit(&self) -> &[u8] {
        &self.unit
    }

    fn send_unit(&mut self) -> Result<(), EngineError> {
        if self.draining {
            return Err(EngineError::Eof);
        }

        let payload = match self.unit.strip_prefix(&START_CODE) {
            Some([payload, ..]) if *payload != CORRUPT => *payload,
            _ => return Err(EngineError::Failed(ffi::AVERROR_INVALIDDATA)),
        };

        if self
            .queue_limit
            .is_some_and(|limit| self.held_back.len() >= limit)
        {
            return Err(EngineError::Again);
        }

        if payload != PARAMETER_SET {
            self.held_back.push_back(payload);
        }
        Ok(())
    }

    fn send_drain(&mut self) -> Result<(), EngineError> {
        if self.draining {
            return Err(EngineError::Eof);
        }
        self.draining = true;
        Ok(())
    }

    fn receive_picture(&mut self, picture: &mut FFmpegVideoFrame) -> Result<(), EngineError> {
        let releasable = self.draining || self.held_back.len() > self.reorder_delay;

        let next = if releasable {
            self.held_back.pop_front()
        } else {
            None
        };

        let Some(luma) = next else {
            return Err(if self.draining {
                EngineError::Eof
            } else {
                EngineError::Again
            });
        };

        *picture = FFmpegVideoFrame::new(FFmpegPixelFormat::YUV420P, self.width, self.height);
        picture.data_mut(0).fill(luma);
        picture.data_mut(1).fill(128);
        picture.data_mut(2).fill(128);

        Ok(())
    }

    fn reset(&mut self) {
        self.carry.clear();
        self.unit.clear();
        self.held_back.clear();
        self.draining = false;
        self.resets += 1;
    }
}
