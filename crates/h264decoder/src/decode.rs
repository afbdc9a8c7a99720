//! The second pipeline stage: turning located access units into decoded
//! pictures, and draining the pictures a codec holds back at the end of a
//! stream.

use ffmpeg::frame::Video as FFmpegVideoFrame;
use ffmpeg_next as ffmpeg;

use crate::engine::{CodecEngine, EngineError};
use crate::error::{DecodeFailure, InitFailure};

/// Where a decoder is in its life cycle.
///
/// ```text
/// Idle -> AccumulatingBytes -> UnitComplete -> Decoding -> PictureReady
///                 ^                                    \-> NoPictureYet
///                 \-------------- (next parse) ---------------/
///
/// (flush, once the parser has no units left) -> Flushing -> Drained
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeState {
    /// Nothing was fed in yet.
    #[default]
    Idle,
    /// The parser is holding bytes that don't make a complete unit yet.
    AccumulatingBytes,
    /// The parser located a complete access unit.
    UnitComplete,
    /// The access unit is being sent to the codec. A unit the codec rejected
    /// leaves the decoder here until the next one.
    Decoding,
    /// The last unit produced a picture.
    PictureReady,
    /// The last unit was accepted but the codec is holding its picture back
    /// (warm-up or reordering).
    NoPictureYet,
    /// The codec was told the stream ended and is releasing what it held.
    Flushing,
    /// Every picture was released. Feeding more bytes starts a new stream.
    Drained,
}

/// The decoder's single reusable decoded-picture slot.
///
/// Every picture the codec writes replaces the previous one, so borrows handed
/// out by [Self::picture] can't outlive the next mutating call.
pub(crate) struct PictureSlot {
    picture: FFmpegVideoFrame,
    generation: u64,
}

impl PictureSlot {
    pub fn new() -> Result<Self, InitFailure> {
        let picture = FFmpegVideoFrame::empty();

        // SAFETY: Only the pointer's value is inspected.
        if unsafe { picture.as_ptr() }.is_null() {
            return Err(InitFailure::PictureAllocFailure);
        }

        Ok(Self {
            picture,
            generation: 0,
        })
    }

    pub fn picture(&self) -> &FFmpegVideoFrame {
        &self.picture
    }

    /// How many pictures have been written to the slot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask `engine` for the next picture. `Ok(false)` means the engine has
    /// nothing to give right now.
    fn fill_from<E: CodecEngine>(&mut self, engine: &mut E) -> Result<bool, EngineError> {
        match engine.receive_picture(&mut self.picture) {
            Ok(()) => {
                self.generation += 1;
                Ok(true)
            }
            Err(EngineError::Again) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Drives a [CodecEngine]'s decoder through the [DecodeState] machine.
pub(crate) struct DecodeEngine {
    slot: PictureSlot,
    state: DecodeState,
    units_decoded: u64,
}

impl DecodeEngine {
    pub fn new() -> Result<Self, InitFailure> {
        Ok(Self {
            slot: PictureSlot::new()?,
            state: DecodeState::Idle,
            units_decoded: 0,
        })
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn units_decoded(&self) -> u64 {
        self.units_decoded
    }

    pub fn slot(&self) -> &PictureSlot {
        &self.slot
    }

    /// Record what the last parse found.
    pub fn note_parsed(&mut self, unit_ready: bool) {
        self.state = if unit_ready {
            DecodeState::UnitComplete
        } else {
            DecodeState::AccumulatingBytes
        };
    }

    /// Forget the current stream, along with any pictures the codec still
    /// holds, so a new one can be decoded.
    pub fn restart<E: CodecEngine>(&mut self, engine: &mut E) {
        engine.reset();
        self.state = DecodeState::Idle;
    }

    /// Send the engine's current unit and request one picture. [None] means
    /// the codec didn't release a picture for it (yet).
    pub fn decode_current_unit<E: CodecEngine>(
        &mut self,
        engine: &mut E,
    ) -> Result<Option<&FFmpegVideoFrame>, DecodeFailure> {
        self.state = DecodeState::Decoding;

        let result = self.send_and_receive(engine);
        self.state = match result {
            Ok(true) => DecodeState::PictureReady,
            Ok(false) => DecodeState::NoPictureYet,
            Err(_) => DecodeState::Decoding,
        };

        let got_picture = result?;
        self.units_decoded += 1;

        if got_picture {
            Ok(Some(self.slot.picture()))
        } else {
            Ok(None)
        }
    }

    /// Release the next held-back picture, telling the codec the stream ended
    /// first if that hasn't happened yet. [None] means the codec is empty and
    /// the state is now [DecodeState::Drained].
    pub fn drain_next<E: CodecEngine>(
        &mut self,
        engine: &mut E,
    ) -> Result<Option<&FFmpegVideoFrame>, DecodeFailure> {
        match self.state {
            DecodeState::Drained => return Ok(None),
            DecodeState::Flushing => {}
            _ => match engine.send_drain() {
                Ok(()) | Err(EngineError::Eof) => self.state = DecodeState::Flushing,
                Err(EngineError::Again) => {
                    // The output queue is full, so the drain request has to
                    // wait for the next probe.
                    if !self.receive(engine)? {
                        return Err(decode_failed(EngineError::Again));
                    }
                    return Ok(Some(self.slot.picture()));
                }
                Err(err) => return Err(decode_failed(err)),
            },
        }

        let got_picture = match self.slot.fill_from(engine) {
            Ok(got_picture) => got_picture,
            Err(EngineError::Eof) => false,
            Err(err) => return Err(decode_failed(err)),
        };

        if !got_picture {
            self.state = DecodeState::Drained;
            return Ok(None);
        }

        Ok(Some(self.slot.picture()))
    }

    fn send_and_receive<E: CodecEngine>(&mut self, engine: &mut E) -> Result<bool, DecodeFailure> {
        match engine.send_unit() {
            Ok(()) => self.receive(engine),
            Err(EngineError::Again) => {
                // The codec won't take more input until a picture is taken out.
                // That picture is this call's result and the unit is resent.
                let got_picture = self.receive(engine)?;
                engine.send_unit().map_err(decode_failed)?;
                Ok(got_picture)
            }
            Err(err) => Err(decode_failed(err)),
        }
    }

    fn receive<E: CodecEngine>(&mut self, engine: &mut E) -> Result<bool, DecodeFailure> {
        match self.slot.fill_from(engine) {
            Ok(got_picture) => Ok(got_picture),
            Err(EngineError::Eof) => Ok(false),
            Err(err) => Err(decode_failed(err)),
        }
    }
}

fn decode_failed(err: EngineError) -> DecodeFailure {
    DecodeFailure::DecodeFailed { code: err.code() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::{CORRUPT, PARAMETER_SET, ScriptedEngine, stream};

    /// Parse `payload`'s unit (flushing the parser) so it's the current unit.
    fn load_unit(engine: &mut ScriptedEngine, payload: u8) {
        engine.parse_bytes(&stream(&[payload])).unwrap();
        engine.parse_bytes(&[]).unwrap();
    }

    fn luma(picture: &FFmpegVideoFrame) -> u8 {
        picture.data(0)[0]
    }

    #[test]
    fn pictures_come_out_in_order_after_the_reorder_delay() {
        let mut engine = ScriptedEngine::new().with_reorder_delay(1);
        let mut decode = DecodeEngine::new().unwrap();

        load_unit(&mut engine, 0x20);
        assert!(decode.decode_current_unit(&mut engine).unwrap().is_none());
        assert_eq!(decode.state(), DecodeState::NoPictureYet);

        load_unit(&mut engine, 0x30);
        let picture = decode.decode_current_unit(&mut engine).unwrap().unwrap();
        assert_eq!(luma(picture), 0x20);
        assert_eq!(decode.state(), DecodeState::PictureReady);

        let picture = decode.drain_next(&mut engine).unwrap().unwrap();
        assert_eq!(luma(picture), 0x30);
        assert_eq!(decode.state(), DecodeState::Flushing);

        assert!(decode.drain_next(&mut engine).unwrap().is_none());
        assert_eq!(decode.state(), DecodeState::Drained);
        assert!(decode.drain_next(&mut engine).unwrap().is_none());

        assert_eq!(decode.units_decoded(), 2);
        assert_eq!(decode.slot().generation(), 2);
    }

    #[test]
    fn parameter_sets_never_make_pictures() {
        let mut engine = ScriptedEngine::new();
        let mut decode = DecodeEngine::new().unwrap();

        load_unit(&mut engine, PARAMETER_SET);
        assert!(decode.decode_current_unit(&mut engine).unwrap().is_none());
        assert!(decode.drain_next(&mut engine).unwrap().is_none());
    }

    #[test]
    fn corrupt_units_fail_without_losing_the_state_machine() {
        let mut engine = ScriptedEngine::new();
        let mut decode = DecodeEngine::new().unwrap();

        load_unit(&mut engine, CORRUPT);
        assert!(matches!(
            decode.decode_current_unit(&mut engine),
            Err(DecodeFailure::DecodeFailed { .. })
        ));
        assert_eq!(decode.state(), DecodeState::Decoding);
        assert_eq!(decode.units_decoded(), 0);

        load_unit(&mut engine, 0x40);
        let picture = decode.decode_current_unit(&mut engine).unwrap().unwrap();
        assert_eq!(luma(picture), 0x40);
    }

    #[test]
    fn a_full_output_queue_hands_out_a_picture_before_resending() {
        let mut engine = ScriptedEngine::new().with_queue_limit(2);
        let mut decode = DecodeEngine::new().unwrap();

        // Fill the codec up behind the decode engine's back.
        for payload in [0x20, 0x30] {
            load_unit(&mut engine, payload);
            engine.send_unit().unwrap();
        }

        // The oldest picture has to come out before the unit fits.
        load_unit(&mut engine, 0x40);
        let picture = decode.decode_current_unit(&mut engine).unwrap().unwrap();
        assert_eq!(luma(picture), 0x20);

        let mut drained = vec![];
        while let Some(picture) = decode.drain_next(&mut engine).unwrap() {
            drained.push(luma(picture));
        }
        assert_eq!(drained, [0x30, 0x40]);
    }

    #[test]
    fn restarting_returns_to_idle() {
        let mut engine = ScriptedEngine::new();
        let mut decode = DecodeEngine::new().unwrap();

        assert!(decode.drain_next(&mut engine).unwrap().is_none());
        assert_eq!(decode.state(), DecodeState::Drained);

        decode.restart(&mut engine);
        assert_eq!(decode.state(), DecodeState::Idle);
        assert_eq!(engine.resets, 1);
    }
}
