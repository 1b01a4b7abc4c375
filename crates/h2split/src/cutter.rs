//! Contract between the splitter and the external per-stream DATA cutter.
//!
//! DATA frame payloads are message bodies; deciding where an HTTP message
//! body ends is the business of the HTTP layer, not the frame splitter.
//! The splitter therefore hands DATA payload bytes to a per-stream
//! [`DataCutter`] and obeys its verdicts. The splitter only requires the
//! cutter to be deterministic and to return a single assembled buffer per
//! completed frame.

use crate::state::StreamId;

/// Header fields of the DATA frame whose payload is about to be cut.
#[derive(Debug, Clone, Copy)]
pub struct DataFrame {
    /// Payload length from the frame header, including any pad length octet
    /// and padding.
    pub length: u32,
    /// Frame flags (END_STREAM, PADDED, ...).
    pub flags: u8,
}

/// Verdict from one cutter scan pass.
#[derive(Debug, Clone, Copy)]
pub struct CutScan {
    /// Bytes of the supplied slice the cutter consumed.
    pub consumed: usize,
    /// The cutter wants everything up to the consumed point flushed to
    /// reassembly.
    pub flush: bool,
    /// The current DATA frame payload has been fully consumed; the splitter
    /// resumes frame-header scanning after the consumed bytes.
    pub frame_complete: bool,
}

/// Per-stream payload cutter supplied by the caller.
pub trait DataCutter {
    /// Consume DATA payload bytes. `frame` is `Some` exactly when a frame
    /// header was just scanned and this call starts its payload; `None`
    /// resumes a payload split across chunks. `data` never contains frame
    /// header octets.
    fn scan(&mut self, data: &[u8], frame: Option<DataFrame>) -> CutScan;

    /// Reassemble one flushed segment. Returns the assembled message body
    /// once the frame that triggered the flush is complete, `None` until
    /// then.
    fn reassemble(&mut self, chunk: &[u8]) -> Option<Vec<u8>>;
}

/// Lookup of per-stream cutters and body expectations, supplied by the
/// caller that tracks stream state.
pub trait CutterRegistry {
    /// Whether `stream_id` currently has a half-open message expecting body
    /// octets from this direction.
    fn expects_body(&self, stream_id: StreamId) -> bool;

    /// The cutter for `stream_id`, if the stream is known.
    fn cutter_for(&mut self, stream_id: StreamId) -> Option<&mut dyn DataCutter>;
}

/// Registry with no streams: every DATA frame is a sequence violation.
/// Suits directions that only ever carry control traffic, and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStreams;

impl CutterRegistry for NoStreams {
    fn expects_body(&self, _stream_id: StreamId) -> bool {
        false
    }

    fn cutter_for(&mut self, _stream_id: StreamId) -> Option<&mut dyn DataCutter> {
        None
    }
}
