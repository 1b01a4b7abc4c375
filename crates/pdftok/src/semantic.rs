//! Semantic state behind the lexer: dictionary bookkeeping, `/JS`
//! reference context, and the UTF-16BE decode automaton.

use crate::{JsSink, PdfError, PdfErrorKind};

/// Longest dictionary key retained; longer names are truncated.
pub(crate) const MAX_NAME_LEN: usize = 256;

/// Per-dictionary context. Each `<<` gets its own frame so nested
/// dictionaries keep independent key/value parity.
pub(crate) struct DictFrame {
    /// Array nesting level at which the dictionary opened; it must match at
    /// `>>`.
    pub(crate) opened_at: i64,
    /// Parity bit: the next token is a key (false) or a value (true).
    pub(crate) expect_value: bool,
    /// Most recent key, truncated to [`MAX_NAME_LEN`].
    pub(crate) key: Vec<u8>,
    /// Integers that may still turn into an `n m R` indirect reference.
    pub(crate) pending: Pending,
}

impl DictFrame {
    pub(crate) fn new(opened_at: i64) -> Self {
        Self {
            opened_at,
            expect_value: false,
            key: Vec::new(),
            pending: Pending::None,
        }
    }
}

/// Value-position integers held back until it is known whether they form an
/// indirect reference.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pending {
    None,
    One(i64),
    Two(i64, i64),
}

/// UTF-16BE byte-order-mark probe at the front of a JavaScript string or
/// stream.
///
/// The first two content bytes decide the text encoding: `FE FF` switches
/// to wide decoding (the mark itself is not emitted), anything else replays
/// the held bytes and stays 8-bit. Kept byte-at-a-time because the mark can
/// arrive split across chunks.
pub(crate) enum Probe {
    /// No content byte seen yet.
    First,
    /// First byte was 0xFE; awaiting the second.
    SecondFe,
    /// 8-bit text; bytes pass through.
    Latin,
    /// UTF-16BE text.
    Wide(U16Decoder),
}

impl Probe {
    pub(crate) fn push<S: JsSink>(
        &mut self,
        byte: u8,
        out: &mut S,
        offset: u64,
    ) -> Result<(), PdfError> {
        match self {
            Self::First => {
                if byte == 0xFE {
                    *self = Self::SecondFe;
                } else {
                    *self = Self::Latin;
                    out.emit(&[byte]);
                }
                Ok(())
            },
            Self::SecondFe => {
                if byte == 0xFF {
                    *self = Self::Wide(U16Decoder::new());
                } else {
                    out.emit(&[0xFE, byte]);
                    *self = Self::Latin;
                }
                Ok(())
            },
            Self::Latin => {
                out.emit(&[byte]);
                Ok(())
            },
            Self::Wide(decoder) => decoder.push(byte, out, offset),
        }
    }

    /// Flush at end of string: a held lone 0xFE is ordinary content; an
    /// incomplete UTF-16 unit is dropped.
    pub(crate) fn finish<S: JsSink>(&mut self, out: &mut S) {
        if matches!(self, Self::SecondFe) {
            out.emit(&[0xFE]);
        }
    }
}

/// Byte-oriented UTF-16BE decode automaton.
///
/// Four phases: two bytes assemble a unit; a unit below the surrogate range
/// is emitted directly, anything else is held as a high surrogate and two
/// more bytes must form a valid low surrogate. Explicit by design — the
/// input arrives chunk-fed and any byte may be the last one of a chunk.
pub(crate) struct U16Decoder {
    phase: u8,
    staging: u32,
    high: u32,
}

impl U16Decoder {
    pub(crate) fn new() -> Self {
        Self {
            phase: 0,
            staging: 0,
            high: 0,
        }
    }

    pub(crate) fn push<S: JsSink>(
        &mut self,
        byte: u8,
        out: &mut S,
        offset: u64,
    ) -> Result<(), PdfError> {
        match self.phase {
            0 => {
                self.staging = (byte as u32) << 8;
                self.phase = 1;
            },
            1 => {
                let unit = self.staging | byte as u32;
                if unit < 0xD800 {
                    emit_utf8(unit, out);
                    self.phase = 0;
                } else {
                    self.high = (unit - 0xD800) * 0x400;
                    self.phase = 2;
                }
            },
            2 => {
                self.staging = (byte as u32) << 8;
                self.phase = 3;
            },
            _ => {
                let low = self.staging | byte as u32;
                if low < 0xDC00 {
                    return Err(PdfError {
                        kind: PdfErrorKind::UnexpectedSymbol,
                        offset,
                    });
                }
                emit_utf8(self.high + (low - 0xDC00) + 0x10000, out);
                self.phase = 0;
            },
        }
        Ok(())
    }
}

/// Re-encode one code point as canonical 1..4-byte UTF-8.
pub(crate) fn emit_utf8<S: JsSink>(cp: u32, out: &mut S) {
    debug_assert!(cp <= 0x1F_FFFF);
    if cp < 0x80 {
        out.emit(&[cp as u8]);
    } else if cp < 0x800 {
        out.emit(&[0xC0 | (cp >> 6) as u8, 0x80 | (cp & 0x3F) as u8]);
    } else if cp < 0x1_0000 {
        out.emit(&[
            0xE0 | (cp >> 12) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]);
    } else {
        out.emit(&[
            0xF0 | (cp >> 18) as u8,
            0x80 | ((cp >> 12) & 0x3F) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Vec<u8>, PdfError> {
        let mut decoder = U16Decoder::new();
        let mut out = Vec::new();
        for (i, &b) in bytes.iter().enumerate() {
            decoder.push(b, &mut out, i as u64)?;
        }
        Ok(out)
    }

    #[test]
    fn bmp_units_decode_directly() {
        assert_eq!(decode(&[0x00, 0x41, 0x00, 0x42]).unwrap(), b"AB");
        // U+00E9 -> C3 A9, U+4E2D -> E4 B8 AD
        assert_eq!(decode(&[0x00, 0xE9]).unwrap(), [0xC3, 0xA9]);
        assert_eq!(decode(&[0x4E, 0x2D]).unwrap(), [0xE4, 0xB8, 0xAD]);
    }

    #[test]
    fn surrogate_pair_decodes_to_four_bytes() {
        // U+1D11E MUSICAL SYMBOL G CLEF
        assert_eq!(
            decode(&[0xD8, 0x34, 0xDD, 0x1E]).unwrap(),
            [0xF0, 0x9D, 0x84, 0x9E]
        );
    }

    #[test]
    fn invalid_low_surrogate_is_rejected() {
        let err = decode(&[0xD8, 0x34, 0x00, 0x41]).unwrap_err();
        assert_eq!(err.kind, PdfErrorKind::UnexpectedSymbol);
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn probe_replays_non_bom_prefix() {
        let mut probe = Probe::First;
        let mut out = Vec::new();
        // 0xFE not followed by 0xFF stays 8-bit, both bytes kept
        probe.push(0xFE, &mut out, 0).unwrap();
        probe.push(0x41, &mut out, 1).unwrap();
        probe.push(0x42, &mut out, 2).unwrap();
        assert_eq!(out, [0xFE, 0x41, 0x42]);
    }

    #[test]
    fn probe_consumes_bom_and_goes_wide() {
        let mut probe = Probe::First;
        let mut out = Vec::new();
        for (i, &b) in [0xFE, 0xFF, 0x00, 0x58].iter().enumerate() {
            probe.push(b, &mut out, i as u64).unwrap();
        }
        assert_eq!(out, b"X");
    }

    #[test]
    fn probe_finish_flushes_lone_fe() {
        let mut probe = Probe::First;
        let mut out = Vec::new();
        probe.push(0xFE, &mut out, 0).unwrap();
        probe.finish(&mut out);
        assert_eq!(out, [0xFE]);
    }
}
