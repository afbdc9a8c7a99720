//! The first pipeline stage: locating access-unit boundaries in arbitrarily
//! chunked input.

use ffmpeg_next::ffi;

use crate::engine::CodecEngine;
use crate::error::DecodeFailure;

/// What a single [StreamParser::parse] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Parsed {
    /// How many of the offered bytes were absorbed.
    pub consumed: usize,
    /// Whether the engine is now holding a complete access unit.
    pub unit_ready: bool,
}

/// Feeds bytes to a [CodecEngine]'s bitstream parser and validates what it
/// reports back. The carry-over bytes themselves live in the engine.
#[derive(Debug, Default)]
pub(crate) struct StreamParser {
    bytes_parsed: u64,
    units_found: u64,
}

impl StreamParser {
    /// Offer `bytes` to the engine's parser. An empty `bytes` is a flush probe
    /// asking for any unit the parser is still holding.
    pub fn parse<E: CodecEngine>(
        &mut self,
        engine: &mut E,
        bytes: &[u8],
    ) -> Result<Parsed, DecodeFailure> {
        let consumed = engine
            .parse_bytes(bytes)
            .map_err(|err| DecodeFailure::ParseFailed { code: err.code() })?;

        if consumed > bytes.len() {
            return Err(DecodeFailure::ParseFailed {
                code: ffi::AVERROR_BUG,
            });
        }

        let unit_ready = !engine.current_unit().is_empty();

        self.bytes_parsed += consumed as u64;
        if unit_ready {
            self.units_found += 1;
        }

        Ok(Parsed {
            consumed,
            unit_ready,
        })
    }

    pub fn bytes_parsed(&self) -> u64 {
        self.bytes_parsed
    }

    pub fn units_found(&self) -> u64 {
        self.units_found
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::frame::Video as FFmpegVideoFrame;

    use super::*;
    use crate::engine::EngineError;
    use crate::engine::scripted::{ScriptedEngine, stream};

    /// An engine whose parser reports a fixed result.
    struct LyingEngine(Result<usize, EngineError>);

    impl CodecEngine for LyingEngine {
        fn parse_bytes(&mut self, _input: &[u8]) -> Result<usize, EngineError> {
            self.0
        }

        fn current_unit(&self) -> &[u8] {
            &[]
        }

        fn send_unit(&mut self) -> Result<(), EngineError> {
            Ok(())
        }

        fn send_drain(&mut self) -> Result<(), EngineError> {
            Ok(())
        }

        fn receive_picture(&mut self, _picture: &mut FFmpegVideoFrame) -> Result<(), EngineError> {
            Err(EngineError::Eof)
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn units_complete_at_the_next_start_code() {
        let mut engine = ScriptedEngine::new();
        let mut parser = StreamParser::default();
        let input = stream(&[0x20, 0x30]);

        let parsed = parser.parse(&mut engine, &input).unwrap();
        assert!(parsed.unit_ready);
        assert_eq!(parsed.consumed, 7);
        assert_eq!(engine.current_unit(), &[0, 0, 1, 0x20]);

        let parsed = parser.parse(&mut engine, &input[parsed.consumed..]).unwrap();
        assert_eq!(parsed, Parsed { consumed: 1, unit_ready: false });

        let parsed = parser.parse(&mut engine, &[]).unwrap();
        assert_eq!(parsed, Parsed { consumed: 0, unit_ready: true });
        assert_eq!(engine.current_unit(), &[0, 0, 1, 0x30]);

        assert_eq!(parser.bytes_parsed(), input.len() as u64);
        assert_eq!(parser.units_found(), 2);
    }

    #[test]
    fn carry_over_survives_tiny_chunks() {
        let mut engine = ScriptedEngine::new();
        let mut parser = StreamParser::default();
        let input = stream(&[0x20, 0x30]);

        let mut units = 0;
        for byte in input.chunks(1) {
            let parsed = parser.parse(&mut engine, byte).unwrap();
            assert_eq!(parsed.consumed, 1);
            units += parsed.unit_ready as usize;
        }

        assert_eq!(units, 1);
        assert!(parser.parse(&mut engine, &[]).unwrap().unit_ready);
    }

    #[test]
    fn engine_errors_become_parse_failures() {
        let mut parser = StreamParser::default();

        let mut engine = LyingEngine(Err(EngineError::Failed(-22)));
        assert_eq!(
            parser.parse(&mut engine, &[1, 2, 3]),
            Err(DecodeFailure::ParseFailed { code: -22 })
        );

        let mut engine = LyingEngine(Ok(4));
        assert_eq!(
            parser.parse(&mut engine, &[1, 2, 3]),
            Err(DecodeFailure::ParseFailed {
                code: ffi::AVERROR_BUG
            })
        );
        assert_eq!(parser.bytes_parsed(), 0);
    }
}
