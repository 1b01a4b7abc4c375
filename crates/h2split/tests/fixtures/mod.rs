#![allow(dead_code)]
//! Frame builders and a miniature stream framework for end-to-end splitter
//! tests.
//!
//! `drive()` plays the role the TCP stream layer plays in a real inspector:
//! it buffers segments the scanner answered `Search` to, slices the flushed
//! span back out with the original chunk boundaries, runs reassembly, and
//! collects the resulting PDUs.

use std::collections::{HashMap, HashSet};

use h2split::{
    CutScan,
    CutterRegistry,
    DataCutter,
    DataFrame,
    EventTally,
    Reassembly,
    ScanStatus,
    SplitError,
    SplitterState,
    StreamId,
};

/// Frame type constants
pub const FRAME_TYPE_DATA: u8 = 0x00;
pub const FRAME_TYPE_HEADERS: u8 = 0x01;
pub const FRAME_TYPE_SETTINGS: u8 = 0x04;
pub const FRAME_TYPE_CONTINUATION: u8 = 0x09;

/// Frame flags
pub const FLAG_END_STREAM: u8 = 0x01;
pub const FLAG_END_HEADERS: u8 = 0x04;
pub const FLAG_PADDED: u8 = 0x08;

/// HTTP/2 connection preface
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Build a raw HTTP/2 frame header (9 bytes)
pub fn build_frame_header(length: u32, frame_type: u8, flags: u8, stream_id: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(9);
    header.push((length >> 16) as u8);
    header.push((length >> 8) as u8);
    header.push(length as u8);
    header.push(frame_type);
    header.push(flags);
    header.push((stream_id >> 24) as u8 & 0x7F);
    header.push((stream_id >> 16) as u8);
    header.push((stream_id >> 8) as u8);
    header.push(stream_id as u8);
    header
}

/// Build a SETTINGS frame on stream 0
pub fn settings_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = build_frame_header(payload.len() as u32, FRAME_TYPE_SETTINGS, 0, 0);
    frame.extend_from_slice(payload);
    frame
}

/// Build a HEADERS frame
pub fn headers_frame(stream_id: u32, fragment: &[u8], flags: u8) -> Vec<u8> {
    let mut frame = build_frame_header(fragment.len() as u32, FRAME_TYPE_HEADERS, flags, stream_id);
    frame.extend_from_slice(fragment);
    frame
}

/// Build a HEADERS frame with PADDED set
pub fn headers_frame_padded(stream_id: u32, fragment: &[u8], pad_len: u8, flags: u8) -> Vec<u8> {
    let total = 1 + fragment.len() + pad_len as usize;
    let mut frame = build_frame_header(
        total as u32,
        FRAME_TYPE_HEADERS,
        flags | FLAG_PADDED,
        stream_id,
    );
    frame.push(pad_len);
    frame.extend_from_slice(fragment);
    frame.extend(std::iter::repeat_n(0u8, pad_len as usize));
    frame
}

/// Build a CONTINUATION frame
pub fn continuation_frame(stream_id: u32, fragment: &[u8], flags: u8) -> Vec<u8> {
    let mut frame =
        build_frame_header(fragment.len() as u32, FRAME_TYPE_CONTINUATION, flags, stream_id);
    frame.extend_from_slice(fragment);
    frame
}

/// Build a DATA frame
pub fn data_frame(stream_id: u32, data: &[u8], flags: u8) -> Vec<u8> {
    let mut frame = build_frame_header(data.len() as u32, FRAME_TYPE_DATA, flags, stream_id);
    frame.extend_from_slice(data);
    frame
}

/// Build a DATA frame with padding
pub fn data_frame_padded(stream_id: u32, data: &[u8], pad_len: u8) -> Vec<u8> {
    let total = 1 + data.len() + pad_len as usize;
    let mut frame = build_frame_header(total as u32, FRAME_TYPE_DATA, FLAG_PADDED, stream_id);
    frame.push(pad_len);
    frame.extend_from_slice(data);
    frame.extend(std::iter::repeat_n(0u8, pad_len as usize));
    frame
}

/// Body cutter used by the tests: consumes whole DATA frames, flushes each
/// one, and strips the frame header, pad length octet, and padding when
/// reassembling.
#[derive(Default)]
pub struct TestCutter {
    scan_left: u32,
    frame: Option<DataFrame>,
    rs_header_left: u32,
    rs_left: u32,
    rs_pad: u32,
    rs_read_pad: bool,
    rs_started: bool,
    body: Vec<u8>,
}

impl DataCutter for TestCutter {
    fn scan(&mut self, data: &[u8], frame: Option<DataFrame>) -> CutScan {
        if let Some(f) = frame {
            self.scan_left = f.length;
            self.frame = Some(f);
        }
        let consumed = (self.scan_left as usize).min(data.len());
        self.scan_left -= consumed as u32;
        let done = self.scan_left == 0;
        CutScan {
            consumed,
            flush: done,
            frame_complete: done,
        }
    }

    fn reassemble(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        let frame = self.frame?;
        if !self.rs_started {
            self.rs_started = true;
            self.rs_header_left = 9;
            self.rs_left = frame.length;
            self.rs_read_pad = frame.flags & FLAG_PADDED != 0;
            self.rs_pad = 0;
        }
        let mut i = 0;
        while i < chunk.len() && (self.rs_header_left > 0 || self.rs_left > 0) {
            if self.rs_header_left > 0 {
                let n = (self.rs_header_left as usize).min(chunk.len() - i);
                self.rs_header_left -= n as u32;
                i += n;
            } else if self.rs_read_pad {
                self.rs_read_pad = false;
                self.rs_pad = chunk[i] as u32;
                self.rs_left -= 1;
                i += 1;
            } else if self.rs_left > self.rs_pad {
                let n = ((self.rs_left - self.rs_pad) as usize).min(chunk.len() - i);
                self.body.extend_from_slice(&chunk[i..i + n]);
                self.rs_left -= n as u32;
                i += n;
            } else {
                let n = (self.rs_pad as usize).min(chunk.len() - i);
                self.rs_left -= n as u32;
                self.rs_pad -= n as u32;
                i += n;
            }
        }
        if self.rs_header_left == 0 && self.rs_left == 0 {
            self.rs_started = false;
            self.frame = None;
            Some(std::mem::take(&mut self.body))
        } else {
            None
        }
    }
}

/// Registry over a fixed set of streams with bodies expected.
#[derive(Default)]
pub struct TestStreams {
    pub cutters: HashMap<u32, TestCutter>,
    pub expect_body: HashSet<u32>,
}

impl TestStreams {
    pub fn with_body_streams(stream_ids: &[u32]) -> Self {
        let mut streams = Self::default();
        for &id in stream_ids {
            streams.cutters.insert(id, TestCutter::default());
            streams.expect_body.insert(id);
        }
        streams
    }
}

impl CutterRegistry for TestStreams {
    fn expects_body(&self, stream_id: StreamId) -> bool {
        self.expect_body.contains(&stream_id.0)
    }

    fn cutter_for(&mut self, stream_id: StreamId) -> Option<&mut dyn DataCutter> {
        self.cutters
            .get_mut(&stream_id.0)
            .map(|c| c as &mut dyn DataCutter)
    }
}

/// One protocol data unit the splitter produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    /// The connection preface; flushed but withheld from detection.
    Discarded,
    /// A reassembled PDU: concatenated 9-byte frame headers plus payload
    /// bytes with padding elided (or the cutter's message body for DATA).
    Frames { headers: Vec<u8>, data: Vec<u8> },
}

/// Feed `chunks` through scan and reassembly exactly the way the stream
/// layer would, returning every PDU produced.
pub fn drive(
    state: &mut SplitterState,
    streams: &mut TestStreams,
    events: &mut EventTally,
    chunks: &[Vec<u8>],
) -> Result<Vec<Pdu>, SplitError> {
    let mut pdus = Vec::new();
    let mut pending: Vec<Vec<u8>> = Vec::new();

    for chunk in chunks {
        let mut rest: &[u8] = chunk;
        loop {
            match state.scan(rest, streams, events)? {
                ScanStatus::Search => {
                    if !rest.is_empty() {
                        pending.push(rest.to_vec());
                    }
                    break;
                },
                ScanStatus::Flush(offset) => {
                    let mut segments = std::mem::take(&mut pending);
                    segments.push(rest[..offset].to_vec());

                    if state.take_payload_discard() {
                        pdus.push(Pdu::Discarded);
                    } else {
                        let total: usize = segments.iter().map(Vec::len).sum();
                        let last = segments.len() - 1;
                        let mut at = 0;
                        for (i, segment) in segments.iter().enumerate() {
                            let outcome = state.reassemble(total, at, segment, i == last, streams)?;
                            if i == last {
                                assert_eq!(outcome, Reassembly::Complete);
                            } else {
                                assert_eq!(outcome, Reassembly::Pending);
                            }
                            at += segment.len();
                        }
                        pdus.push(Pdu::Frames {
                            headers: state.frame_header().to_vec(),
                            data: state.frame_data().to_vec(),
                        });
                        state.clear_frame_buffers();
                    }

                    rest = &rest[offset..];
                    if rest.is_empty() {
                        break;
                    }
                },
            }
        }
    }
    Ok(pdus)
}

/// Re-slice a contiguous byte stream into chunks of at most `chunk_size`.
pub fn rechunk(stream: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    stream.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}
