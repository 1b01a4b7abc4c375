#![warn(missing_docs)]
//! Push-driven PDF object tokenizer with JavaScript extraction.
//!
//! This crate lexes the PDF 32000-1:2008 byte grammar incrementally over
//! chunks cut at arbitrary boundaries: indirect objects, dictionaries,
//! literal and hexadecimal strings, and streams. It tracks `/JS` entries —
//! both direct string values and `n m R` indirect references — and writes
//! the decoded UTF-8 text of every JavaScript string and stream to a caller
//! supplied sink, decoding PDF literal-string escapes and UTF-16BE
//! (including surrogate pairs) along the way.
//!
//! # Example
//!
//! ```
//! use pdftok::PdfTokenizer;
//!
//! let mut tok = PdfTokenizer::new();
//! let mut js = Vec::new();
//! tok.feed(b"1 0 obj << /JS (app.alert(1)) >> endobj", &mut js).unwrap();
//! tok.finish().unwrap();
//! assert_eq!(js, b"app.alert(1)");
//! ```
//!
//! The tokenizer makes a single pass: an object is recognised as JavaScript
//! only if the `/JS` reference to it was seen earlier in the byte stream.
//!
//! # Feature flags
//!
//! - **`tracing`** — emit `tracing::warn!` events when tokenisation halts
//!   on malformed input.

mod lexer;
mod semantic;

#[cfg(test)]
mod tests;

#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
pub use lexer::PdfTokenizer;
pub(crate) use trace_warn;

/// Receiver for decoded JavaScript bytes, owned by the caller.
pub trait JsSink {
    /// Append decoded UTF-8 output.
    fn emit(&mut self, bytes: &[u8]);
}

impl JsSink for Vec<u8> {
    fn emit(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Classification of tokenizer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfErrorKind {
    /// `stream` opened without a non-negative direct `/Length` in scope.
    StreamNoLength,
    /// Array nesting at `>>` differs from the level the dictionary opened at.
    IncompleteArrayInDictionary,
    /// A non-name token where a dictionary key is required.
    NotNameInDictionaryKey,
    /// A byte the current construct cannot accept (e.g. an invalid low
    /// surrogate in UTF-16 text).
    UnexpectedSymbol,
    /// Start-condition stack exceeded its fixed depth bound.
    NestingTooDeep,
}

impl std::fmt::Display for PdfErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StreamNoLength => write!(f, "stream body without a usable /Length"),
            Self::IncompleteArrayInDictionary => {
                write!(f, "unbalanced array inside dictionary")
            },
            Self::NotNameInDictionaryKey => {
                write!(f, "non-name token in dictionary key position")
            },
            Self::UnexpectedSymbol => write!(f, "unexpected symbol"),
            Self::NestingTooDeep => write!(f, "construct nesting exceeds the depth bound"),
        }
    }
}

/// Tokenizer failure with the absolute input offset of the offending byte.
///
/// Tokenisation halts at the first failure; the enclosing session is the
/// caller's to keep or tear down.
#[derive(Debug, Clone, Copy)]
pub struct PdfError {
    /// What went wrong
    pub kind: PdfErrorKind,
    /// Absolute offset into the fed byte stream
    pub offset: u64,
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at byte {}: {}", self.offset, self.kind)
    }
}

impl std::error::Error for PdfError {}
