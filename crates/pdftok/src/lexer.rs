//! The layered start-condition state machine over the PDF byte grammar.

use std::collections::HashSet;

use bytecursor::ByteCursor;

use crate::semantic::{DictFrame, MAX_NAME_LEN, Pending, Probe};
use crate::{JsSink, PdfError, PdfErrorKind, trace_warn};

/// Bound on the start-condition stack; exceeding it is a parse error.
const MAX_CONDITION_DEPTH: usize = 32;

/// Integer digits honoured before the rest are dropped (a security cap,
/// not a grammar rule).
const MAX_INT_DIGITS: usize = 16;

/// Longest bareword kept; enough for any keyword or capped number, and a
/// bound on lexer memory against delimiter-free garbage.
const MAX_WORD_LEN: usize = 32;

/// Whitespace per PDF 32000-1:2008 §7.2.2.
fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// Delimiters per PDF 32000-1:2008 §7.2.2.
fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// One start condition. The stack bottom (empty stack) is the top-level
/// document scan.
enum Cond {
    /// Inside `obj` .. `endobj`.
    IndObj,
    /// Inside `<<` .. `>>`.
    Dict(DictFrame),
    /// Inside `(` .. `)`.
    LitStr(LitFrame),
    /// Inside `<` .. `>`.
    HexStr(HexFrame),
    /// Inside a `stream` body of known length.
    Stream(StreamFrame),
}

struct LitFrame {
    js: bool,
    /// Unescaped inner parenthesis depth; the string closes at an
    /// unescaped `)` with depth zero.
    depth: u32,
    esc: Esc,
    probe: Probe,
}

impl LitFrame {
    fn new(js: bool) -> Self {
        Self {
            js,
            depth: 0,
            esc: Esc::None,
            probe: Probe::First,
        }
    }
}

/// Escape progress inside a literal string.
enum Esc {
    None,
    /// A backslash was just read.
    Backslash,
    /// Inside a 1..3 digit octal escape.
    Octal { acc: u16, digits: u8 },
}

struct HexFrame {
    js: bool,
    /// High nibble awaiting its partner.
    hi: Option<u8>,
    probe: Probe,
}

impl HexFrame {
    fn new(js: bool) -> Self {
        Self {
            js,
            hi: None,
            probe: Probe::First,
        }
    }
}

struct StreamFrame {
    js: bool,
    remaining: u64,
    probe: Probe,
}

/// Sub-token scanner state for the conditions that tokenize (top level,
/// indirect object, dictionary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Micro {
    Ready,
    /// Accumulating a bareword (number or keyword).
    Word,
    /// Accumulating a `/name`.
    Name,
    /// Skipping `%` to end of line.
    Comment,
    /// Saw `<`; `<<` opens a dictionary, anything else a hex string.
    Lt,
    /// Saw `>`; `>>` closes a dictionary.
    Gt,
    /// Matched the `stream` keyword; awaiting `\r?\n`.
    StreamEol,
    /// Matched `stream\r`; awaiting `\n`.
    StreamCr,
}

enum Token {
    Int(i64),
    Real,
    Name(Vec<u8>),
    Keyword(Kw),
    DictOpen,
    DictClose,
    ArrayOpen,
    ArrayClose,
    StrOpen,
    HexOpen,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kw {
    Obj,
    EndObj,
    EndStream,
    R,
}

fn classify(word: &[u8]) -> Token {
    match word {
        b"obj" => Token::Keyword(Kw::Obj),
        b"endobj" => Token::Keyword(Kw::EndObj),
        b"endstream" => Token::Keyword(Kw::EndStream),
        b"R" => Token::Keyword(Kw::R),
        _ => classify_number(word),
    }
}

fn classify_number(word: &[u8]) -> Token {
    let digits = match word.first() {
        Some(b'+' | b'-') => &word[1..],
        _ => word,
    };
    if digits.is_empty() || digits.iter().filter(|&&b| b == b'.').count() > 1 {
        return Token::Other;
    }
    if digits.iter().any(|&b| !b.is_ascii_digit() && b != b'.') {
        return Token::Other;
    }
    if digits.contains(&b'.') {
        return Token::Real;
    }
    let mut value: i64 = 0;
    for &b in digits.iter().take(MAX_INT_DIGITS) {
        value = value * 10 + (b - b'0') as i64;
    }
    if word.first() == Some(&b'-') {
        value = -value;
    }
    Token::Int(value)
}

/// Chunk-fed tokenizer over one PDF byte stream.
///
/// Create one per stream, [`feed`](Self::feed) chunks as they arrive, and
/// call [`finish`](Self::finish) at end of input. Decoded JavaScript goes
/// to the [`JsSink`] passed to each call; state is discarded by dropping
/// the tokenizer.
pub struct PdfTokenizer {
    stack: Vec<Cond>,
    micro: Micro,
    word: Vec<u8>,
    name: Vec<u8>,
    /// Last two integers at top level, candidates for `n m obj`.
    last_ints: [Option<i64>; 2],
    /// The open indirect object's id was referenced from a `/JS` key.
    obj_is_js: bool,
    /// `/Length` of the next stream; -1 when unknown.
    rem_length: i64,
    /// Ids of indirect objects referenced by `/JS` entries.
    js_refs: HashSet<u32>,
    /// Current `[` depth across all conditions. Signed: a stray `]` drives
    /// it below a dictionary's opening level, which the close detects.
    array_nesting: i64,
    /// Absolute offset of the byte being processed.
    consumed: u64,
}

impl Default for PdfTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfTokenizer {
    /// A tokenizer at the start of a document.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            micro: Micro::Ready,
            word: Vec::new(),
            name: Vec::new(),
            last_ints: [None, None],
            obj_is_js: false,
            rem_length: -1,
            js_refs: HashSet::new(),
            array_nesting: 0,
            consumed: 0,
        }
    }

    /// Total bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Tokenize one chunk, emitting any decoded JavaScript to `out`.
    ///
    /// The chunk may end anywhere, including inside an escape sequence or a
    /// UTF-16 unit. A returned error halts tokenisation for good.
    pub fn feed<S: JsSink>(&mut self, chunk: &[u8], out: &mut S) -> Result<(), PdfError> {
        let mut cur = ByteCursor::new(chunk);
        while !cur.is_empty() {
            if matches!(self.stack.last(), Some(Cond::Stream(_))) {
                self.stream_bytes(&mut cur, out)?;
                continue;
            }
            let Some(byte) = cur.bump() else { break };
            let result = match self.stack.last() {
                Some(Cond::LitStr(_)) => self.literal_byte(byte, out),
                Some(Cond::HexStr(_)) => self.hex_byte(byte, out),
                _ => self.token_byte(byte, out),
            };
            self.consumed += 1;
            if let Err(error) = result {
                trace_warn!(offset = error.offset, "tokenization halted: {}", error.kind);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Terminate a trailing bareword at end of input.
    ///
    /// A document whose last bytes are `endobj` with no final EOL still has
    /// that token pending; nothing else is flushed — unterminated strings
    /// and streams are simply truncated.
    pub fn finish(&mut self) -> Result<(), PdfError> {
        match self.micro {
            Micro::Word => self.finish_word(),
            Micro::Name => {
                self.micro = Micro::Ready;
                let name = std::mem::take(&mut self.name);
                self.handle_token(Token::Name(name))
            },
            _ => Ok(()),
        }
    }

    // --- token scanning -------------------------------------------------

    fn token_byte<S: JsSink>(&mut self, byte: u8, out: &mut S) -> Result<(), PdfError> {
        match self.micro {
            Micro::Comment => {
                if byte == b'\n' || byte == b'\r' {
                    self.micro = Micro::Ready;
                }
                Ok(())
            },
            Micro::Word => {
                if is_regular(byte) {
                    if self.word.len() < MAX_WORD_LEN {
                        self.word.push(byte);
                    }
                    Ok(())
                } else {
                    self.finish_word()?;
                    self.token_byte(byte, out)
                }
            },
            Micro::Name => {
                if is_regular(byte) {
                    if self.name.len() < MAX_NAME_LEN {
                        self.name.push(byte);
                    }
                    Ok(())
                } else {
                    self.micro = Micro::Ready;
                    let name = std::mem::take(&mut self.name);
                    self.handle_token(Token::Name(name))?;
                    self.token_byte(byte, out)
                }
            },
            Micro::Lt => {
                self.micro = Micro::Ready;
                if byte == b'<' {
                    self.handle_token(Token::DictOpen)
                } else {
                    self.handle_token(Token::HexOpen)?;
                    self.hex_byte(byte, out)
                }
            },
            Micro::Gt => {
                self.micro = Micro::Ready;
                if byte == b'>' {
                    self.handle_token(Token::DictClose)
                } else {
                    // stray single '>' is skipped
                    self.token_byte(byte, out)
                }
            },
            Micro::StreamEol => match byte {
                b'\n' => {
                    self.micro = Micro::Ready;
                    self.open_stream(out)
                },
                b'\r' => {
                    self.micro = Micro::StreamCr;
                    Ok(())
                },
                _ => {
                    // `stream` not followed by an EOL is a plain bareword
                    self.micro = Micro::Ready;
                    self.token_byte(byte, out)
                },
            },
            Micro::StreamCr => {
                self.micro = Micro::Ready;
                self.open_stream(out)?;
                if byte == b'\n' {
                    Ok(())
                } else {
                    // bare CR: the body starts at this byte
                    self.stream_one(byte, out)
                }
            },
            Micro::Ready => self.ready_byte(byte),
        }
    }

    fn ready_byte(&mut self, byte: u8) -> Result<(), PdfError> {
        match byte {
            _ if is_whitespace(byte) => Ok(()),
            b'%' => {
                self.micro = Micro::Comment;
                Ok(())
            },
            b'/' => {
                self.name.clear();
                self.micro = Micro::Name;
                Ok(())
            },
            b'(' => self.handle_token(Token::StrOpen),
            b'<' => {
                self.micro = Micro::Lt;
                Ok(())
            },
            b'>' => {
                self.micro = Micro::Gt;
                Ok(())
            },
            b'[' => self.handle_token(Token::ArrayOpen),
            b']' => self.handle_token(Token::ArrayClose),
            // stray delimiters are skipped
            b')' | b'{' | b'}' => Ok(()),
            _ => {
                self.word.clear();
                self.word.push(byte);
                self.micro = Micro::Word;
                Ok(())
            },
        }
    }

    fn finish_word(&mut self) -> Result<(), PdfError> {
        self.micro = Micro::Ready;
        let word = std::mem::take(&mut self.word);
        if word == b"stream" && matches!(self.stack.last(), Some(Cond::IndObj)) {
            self.micro = Micro::StreamEol;
            return Ok(());
        }
        self.handle_token(classify(&word))
    }

    // --- token dispatch per condition -----------------------------------

    fn handle_token(&mut self, token: Token) -> Result<(), PdfError> {
        match self.stack.last() {
            None => self.top_level_token(token),
            Some(Cond::IndObj) => self.ind_obj_token(token),
            Some(Cond::Dict(_)) => self.dict_token(token),
            // string and stream conditions consume bytes, not tokens
            Some(_) => Ok(()),
        }
    }

    /// Top level: look for `int int obj` headers, skip everything else.
    fn top_level_token(&mut self, token: Token) -> Result<(), PdfError> {
        match token {
            Token::Int(v) => {
                self.last_ints = [self.last_ints[1], Some(v)];
                return Ok(());
            },
            Token::Keyword(Kw::Obj) => {
                if let [Some(id), Some(_gen)] = self.last_ints {
                    self.push_cond(Cond::IndObj)?;
                    self.obj_is_js =
                        u32::try_from(id).is_ok_and(|id| self.js_refs.contains(&id));
                }
            },
            Token::DictOpen => {
                self.push_cond(Cond::Dict(DictFrame::new(self.array_nesting)))?;
            },
            Token::StrOpen => self.push_cond(Cond::LitStr(LitFrame::new(false)))?,
            Token::HexOpen => self.push_cond(Cond::HexStr(HexFrame::new(false)))?,
            Token::ArrayOpen => self.array_nesting += 1,
            Token::ArrayClose => self.array_nesting -= 1,
            _ => {},
        }
        // the object header ints must immediately precede `obj`
        self.last_ints = [None, None];
        Ok(())
    }

    /// Inside `obj` .. `endobj`: dictionaries, strings, and streams of the
    /// object; strings are JavaScript when the object id was `/JS`-referenced.
    fn ind_obj_token(&mut self, token: Token) -> Result<(), PdfError> {
        match token {
            Token::Keyword(Kw::EndObj) => {
                self.stack.pop();
                self.obj_is_js = false;
                self.rem_length = -1;
                Ok(())
            },
            Token::DictOpen => self.push_cond(Cond::Dict(DictFrame::new(self.array_nesting))),
            Token::StrOpen => self.push_cond(Cond::LitStr(LitFrame::new(self.obj_is_js))),
            Token::HexOpen => self.push_cond(Cond::HexStr(HexFrame::new(self.obj_is_js))),
            Token::ArrayOpen => {
                self.array_nesting += 1;
                Ok(())
            },
            Token::ArrayClose => {
                self.array_nesting -= 1;
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// Inside `<<` .. `>>`: alternate keys and values, fold `int int R`
    /// into one reference value, and record `/JS` and `/Length`.
    fn dict_token(&mut self, token: Token) -> Result<(), PdfError> {
        let offset = self.consumed;
        let (opened_at, in_array, expect_value) = {
            let Some(Cond::Dict(frame)) = self.stack.last() else {
                return Ok(());
            };
            (
                frame.opened_at,
                self.array_nesting > frame.opened_at,
                frame.expect_value,
            )
        };

        // Tokens inside an array value never touch key/value parity.
        if in_array {
            return match token {
                Token::ArrayOpen => {
                    self.array_nesting += 1;
                    Ok(())
                },
                Token::ArrayClose => {
                    self.array_nesting -= 1;
                    if self.array_nesting == opened_at {
                        self.value_closed();
                    }
                    Ok(())
                },
                Token::StrOpen => self.push_cond(Cond::LitStr(LitFrame::new(false))),
                Token::HexOpen => self.push_cond(Cond::HexStr(HexFrame::new(false))),
                Token::DictOpen => {
                    self.push_cond(Cond::Dict(DictFrame::new(self.array_nesting)))
                },
                Token::DictClose => Err(PdfError {
                    kind: PdfErrorKind::IncompleteArrayInDictionary,
                    offset,
                }),
                _ => Ok(()),
            };
        }

        if expect_value {
            // Integers are held back: they may be the front of `n m R`.
            match token {
                Token::Int(v) => {
                    let Some(Cond::Dict(frame)) = self.stack.last_mut() else {
                        return Ok(());
                    };
                    frame.pending = match frame.pending {
                        Pending::None => Pending::One(v),
                        Pending::One(a) => Pending::Two(a, v),
                        // a third bare integer strands the second where a
                        // key belongs
                        Pending::Two(..) => {
                            return Err(PdfError {
                                kind: PdfErrorKind::NotNameInDictionaryKey,
                                offset,
                            });
                        },
                    };
                    return Ok(());
                },
                Token::Keyword(Kw::R) => {
                    let Some(Cond::Dict(frame)) = self.stack.last_mut() else {
                        return Ok(());
                    };
                    if let Pending::Two(id, _gen) = frame.pending {
                        frame.pending = Pending::None;
                        frame.expect_value = false;
                        let key_is_js = frame.key == b"JS";
                        let key_is_length = frame.key == b"Length";
                        if key_is_js && let Ok(id) = u32::try_from(id) {
                            self.js_refs.insert(id);
                        }
                        if key_is_length {
                            // indirect /Length: the stream size is unknown
                            self.rem_length = -1;
                        }
                        return Ok(());
                    }
                    // `R` with fewer than two integers: an opaque value
                },
                _ => {},
            }
            // any other token first settles a held single-integer value
            self.settle_pending(offset)?;
        }

        let expect_value = {
            let Some(Cond::Dict(frame)) = self.stack.last() else {
                return Ok(());
            };
            frame.expect_value
        };

        if expect_value {
            match token {
                Token::Name(_) | Token::Real | Token::Keyword(_) | Token::Other => {
                    if let Some(Cond::Dict(frame)) = self.stack.last_mut() {
                        frame.expect_value = false;
                    }
                    Ok(())
                },
                Token::StrOpen => {
                    let js = self.dict_key_is_js();
                    self.push_cond(Cond::LitStr(LitFrame::new(js)))
                },
                Token::HexOpen => {
                    let js = self.dict_key_is_js();
                    self.push_cond(Cond::HexStr(HexFrame::new(js)))
                },
                Token::DictOpen => {
                    self.push_cond(Cond::Dict(DictFrame::new(self.array_nesting)))
                },
                Token::ArrayOpen => {
                    self.array_nesting += 1;
                    Ok(())
                },
                Token::ArrayClose => {
                    // unbalanced; detected at the dictionary close
                    self.array_nesting -= 1;
                    Ok(())
                },
                Token::DictClose => self.close_dict(offset),
                Token::Int(_) => Ok(()),
            }
        } else {
            match token {
                Token::Name(name) => {
                    if let Some(Cond::Dict(frame)) = self.stack.last_mut() {
                        frame.key = name;
                        frame.key.truncate(MAX_NAME_LEN);
                        frame.expect_value = true;
                    }
                    Ok(())
                },
                Token::DictClose => self.close_dict(offset),
                _ => {
                    trace_warn!(offset, "non-name token in dictionary key position");
                    Err(PdfError {
                        kind: PdfErrorKind::NotNameInDictionaryKey,
                        offset,
                    })
                },
            }
        }
    }

    /// Conclude a held single-integer value (`/Length 42` and the like).
    fn settle_pending(&mut self, offset: u64) -> Result<(), PdfError> {
        let Some(Cond::Dict(frame)) = self.stack.last_mut() else {
            return Ok(());
        };
        match std::mem::replace(&mut frame.pending, Pending::None) {
            Pending::None => Ok(()),
            Pending::One(value) => {
                frame.expect_value = false;
                if frame.key == b"Length" {
                    self.rem_length = value;
                }
                Ok(())
            },
            Pending::Two(value, _stranded) => {
                // the first integer completes the value; the second sits
                // where a key belongs
                frame.expect_value = false;
                if frame.key == b"Length" {
                    self.rem_length = value;
                }
                Err(PdfError {
                    kind: PdfErrorKind::NotNameInDictionaryKey,
                    offset,
                })
            },
        }
    }

    fn dict_key_is_js(&self) -> bool {
        match self.stack.last() {
            Some(Cond::Dict(frame)) => frame.key == b"JS",
            _ => false,
        }
    }

    fn close_dict(&mut self, offset: u64) -> Result<(), PdfError> {
        if let Some(Cond::Dict(frame)) = self.stack.pop()
            && self.array_nesting != frame.opened_at
        {
            trace_warn!(offset, "unbalanced array at dictionary close");
            return Err(PdfError {
                kind: PdfErrorKind::IncompleteArrayInDictionary,
                offset,
            });
        }
        self.value_closed();
        Ok(())
    }

    /// A value construct (string, nested dictionary) finished; flip the
    /// enclosing dictionary back to key position unless it is inside an
    /// open array.
    fn value_closed(&mut self) {
        let nesting = self.array_nesting;
        if let Some(Cond::Dict(frame)) = self.stack.last_mut()
            && nesting == frame.opened_at
        {
            frame.expect_value = false;
        }
    }

    // --- literal strings ------------------------------------------------

    fn literal_byte<S: JsSink>(&mut self, byte: u8, out: &mut S) -> Result<(), PdfError> {
        let offset = self.consumed;
        let mut close = false;
        {
            let Some(Cond::LitStr(frame)) = self.stack.last_mut() else {
                return Ok(());
            };
            // a byte ending an octal escape early is reprocessed unescaped
            let mut byte_pending = true;
            while byte_pending {
                byte_pending = false;
                match frame.esc {
                    Esc::Backslash => {
                        frame.esc = Esc::None;
                        let decoded = match byte {
                            b'n' => Some(b'\n'),
                            b'r' => Some(b'\r'),
                            b't' => Some(b'\t'),
                            b'b' => Some(0x08),
                            b'f' => Some(0x0C),
                            b'0'..=b'7' => {
                                frame.esc = Esc::Octal {
                                    acc: (byte - b'0') as u16,
                                    digits: 1,
                                };
                                None
                            },
                            // \( \) \\ and anything else pass through
                            other => Some(other),
                        };
                        if let Some(decoded) = decoded
                            && frame.js
                        {
                            frame.probe.push(decoded, out, offset)?;
                        }
                    },
                    Esc::Octal { acc, digits } => {
                        if matches!(byte, b'0'..=b'7') && digits < 3 {
                            let acc = acc * 8 + (byte - b'0') as u16;
                            if digits == 2 {
                                frame.esc = Esc::None;
                                if frame.js {
                                    frame.probe.push(acc as u8, out, offset)?;
                                }
                            } else {
                                frame.esc = Esc::Octal {
                                    acc,
                                    digits: digits + 1,
                                };
                            }
                        } else {
                            frame.esc = Esc::None;
                            if frame.js {
                                frame.probe.push(acc as u8, out, offset)?;
                            }
                            byte_pending = true;
                        }
                    },
                    Esc::None => match byte {
                        b'\\' => frame.esc = Esc::Backslash,
                        b'(' => {
                            frame.depth += 1;
                            if frame.js {
                                frame.probe.push(byte, out, offset)?;
                            }
                        },
                        b')' => {
                            if frame.depth == 0 {
                                close = true;
                            } else {
                                frame.depth -= 1;
                                if frame.js {
                                    frame.probe.push(byte, out, offset)?;
                                }
                            }
                        },
                        _ => {
                            if frame.js {
                                frame.probe.push(byte, out, offset)?;
                            }
                        },
                    },
                }
            }
        }
        if close {
            self.close_string(out)?;
        }
        Ok(())
    }

    // --- hex strings ----------------------------------------------------

    fn hex_byte<S: JsSink>(&mut self, byte: u8, out: &mut S) -> Result<(), PdfError> {
        let offset = self.consumed;
        let mut close = false;
        {
            let Some(Cond::HexStr(frame)) = self.stack.last_mut() else {
                return Ok(());
            };
            if byte == b'>' {
                close = true;
            } else if let Some(nibble) = hex_value(byte) {
                if let Some(hi) = frame.hi.take() {
                    if frame.js {
                        frame.probe.push((hi << 4) | nibble, out, offset)?;
                    }
                } else {
                    frame.hi = Some(nibble);
                }
            }
            // non-hex bytes inside hex strings are skipped
        }
        if close {
            self.close_string(out)?;
        }
        Ok(())
    }

    /// Pop a finished string, flush its decode state, and conclude the
    /// enclosing dictionary value if any.
    fn close_string<S: JsSink>(&mut self, out: &mut S) -> Result<(), PdfError> {
        let offset = self.consumed;
        match self.stack.pop() {
            Some(Cond::LitStr(mut frame)) => {
                if frame.js {
                    frame.probe.finish(out);
                }
            },
            Some(Cond::HexStr(mut frame)) => {
                // an odd trailing nibble is zero-padded on the right
                if let Some(hi) = frame.hi.take()
                    && frame.js
                {
                    frame.probe.push(hi << 4, out, offset)?;
                    frame.probe.finish(out);
                } else if frame.js {
                    frame.probe.finish(out);
                }
            },
            _ => {},
        }
        self.value_closed();
        Ok(())
    }

    // --- streams ----------------------------------------------------------

    /// `stream\r?\n` matched: verify the recorded `/Length` and enter the
    /// raw body.
    fn open_stream<S: JsSink>(&mut self, out: &mut S) -> Result<(), PdfError> {
        if self.rem_length < 0 {
            trace_warn!(offset = self.consumed, "stream body without a usable /Length");
            return Err(PdfError {
                kind: PdfErrorKind::StreamNoLength,
                offset: self.consumed,
            });
        }
        let remaining = self.rem_length as u64;
        self.rem_length = -1;
        let js = self.obj_is_js;
        if remaining == 0 {
            if js {
                out.emit(b"\n");
            }
            return Ok(());
        }
        self.push_cond(Cond::Stream(StreamFrame {
            js,
            remaining,
            probe: Probe::First,
        }))
    }

    /// Bulk-consume stream body bytes from the cursor.
    fn stream_bytes<S: JsSink>(
        &mut self,
        cur: &mut ByteCursor<'_>,
        out: &mut S,
    ) -> Result<(), PdfError> {
        let want = match self.stack.last() {
            Some(Cond::Stream(frame)) => frame.remaining,
            _ => return Ok(()),
        };
        let take = want.min(cur.remaining() as u64) as usize;
        let bytes = cur.take(take);
        let base = self.consumed;

        let (finished, js) = {
            let Some(Cond::Stream(frame)) = self.stack.last_mut() else {
                return Ok(());
            };
            if frame.js {
                for (i, &b) in bytes.iter().enumerate() {
                    frame.probe.push(b, out, base + i as u64)?;
                }
            }
            frame.remaining -= take as u64;
            (frame.remaining == 0, frame.js)
        };
        self.consumed += take as u64;

        if finished {
            self.stack.pop();
            if js {
                out.emit(b"\n");
            }
        }
        Ok(())
    }

    /// Feed a single already-consumed byte as stream body (the byte after
    /// a bare-CR `stream` EOL).
    fn stream_one<S: JsSink>(&mut self, byte: u8, out: &mut S) -> Result<(), PdfError> {
        let offset = self.consumed;
        let (finished, js) = {
            let Some(Cond::Stream(frame)) = self.stack.last_mut() else {
                return Ok(());
            };
            if frame.js {
                frame.probe.push(byte, out, offset)?;
            }
            frame.remaining -= 1;
            (frame.remaining == 0, frame.js)
        };
        if finished {
            self.stack.pop();
            if js {
                out.emit(b"\n");
            }
        }
        Ok(())
    }

    // --- shared -----------------------------------------------------------

    fn push_cond(&mut self, cond: Cond) -> Result<(), PdfError> {
        if self.stack.len() >= MAX_CONDITION_DEPTH {
            return Err(PdfError {
                kind: PdfErrorKind::NestingTooDeep,
                offset: self.consumed,
            });
        }
        self.stack.push(cond);
        Ok(())
    }
}
