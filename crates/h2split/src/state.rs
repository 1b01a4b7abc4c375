use crate::frame::{FRAME_HEADER_SIZE, FRAME_TYPE_DATA};

/// Newtype for HTTP/2 stream identifiers (RFC 7540 §5.1.1: 31-bit unsigned
/// integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<StreamId> for u32 {
    fn from(v: StreamId) -> Self {
        v.0
    }
}

/// Which half of the session a byte stream belongs to.
///
/// The connection preface only ever appears on the client-to-server half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes sent by the connection initiator.
    ClientToServer,
    /// Bytes sent by the server.
    ServerToClient,
}

/// Configurable limits for frame splitting.
///
/// These limits defend against resource exhaustion from untrusted input:
/// every buffer the reassembler materialises is bounded by them.
#[derive(Debug, Clone)]
pub struct SplitLimits {
    /// Soft ceiling on the size of one reassembled PDU, and on a single
    /// DATA frame payload (default: 63 KiB). A non-DATA frame (or a
    /// CONTINUATION chain) that would grow its PDU beyond the ceiling
    /// aborts the direction; chunked handling of long control frames is
    /// not supported.
    pub max_pdu_octets: usize,
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self {
            max_pdu_octets: 63 * 1024,
        }
    }
}

/// Verdict of one [`scan`](SplitterState::scan) pass over a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// More bytes are needed; nothing to flush yet.
    Search,
    /// Deliver the first `0` .. `offset` bytes of the chunk (together with
    /// any bytes buffered from earlier `Search` verdicts) to reassembly,
    /// then resume scanning at `offset`.
    Flush(usize),
}

/// Progress of PDU reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassembly {
    /// More segments of the current PDU are still to come.
    Pending,
    /// The segment carrying the PDU tail was consumed; the frame buffers
    /// are ready for inspection even when both are empty.
    Complete,
}

/// Classification of splitter aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitErrorKind {
    /// DATA frame for a stream with no message body expected.
    FrameSequence,
    /// Open HEADERS block followed by a non-CONTINUATION frame.
    MissingContinuation,
    /// CONTINUATION frame without an open HEADERS block.
    UnexpectedContinuation,
    /// The connection preface did not match.
    PrefaceMatchFailure,
    /// Non-DATA frame growing its PDU beyond the size ceiling.
    FrameTooLong,
    /// DATA frame with zero length or above the payload ceiling.
    InvalidDataLength,
}

impl std::fmt::Display for SplitErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrameSequence => write!(f, "DATA frame outside any expected message body"),
            Self::MissingContinuation => {
                write!(f, "open HEADERS block followed by a non-CONTINUATION frame")
            },
            Self::UnexpectedContinuation => {
                write!(f, "CONTINUATION frame without an open HEADERS block")
            },
            Self::PrefaceMatchFailure => write!(f, "connection preface mismatch"),
            Self::FrameTooLong => write!(f, "non-DATA frame exceeds the PDU size ceiling"),
            Self::InvalidDataLength => write!(f, "DATA frame length zero or above the ceiling"),
        }
    }
}

/// Splitter abort with optional stream context. The direction that produced
/// it must be torn down; the peer direction and the enclosing session are
/// unaffected.
#[derive(Debug, Clone)]
pub struct SplitError {
    /// What went wrong
    pub kind: SplitErrorKind,
    /// The stream under scan when the violation was found, if any
    pub stream_id: Option<StreamId>,
}

impl SplitError {
    /// Connection-level abort (no specific stream).
    pub fn new(kind: SplitErrorKind) -> Self {
        Self {
            kind,
            stream_id: None,
        }
    }

    /// Stream-level abort with the offending stream id.
    pub fn with_stream(kind: SplitErrorKind, stream_id: StreamId) -> Self {
        Self {
            kind,
            stream_id: Some(stream_id),
        }
    }
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(sid) = self.stream_id {
            write!(f, "[stream {sid}] {}", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for SplitError {}

/// Per-direction splitter state.
///
/// Owns everything one directional byte stream needs: the scan carry state
/// that survives arbitrary TCP segmentation, and the reassembly buffers
/// that live from the first segment of a PDU to its tail. Create one pair
/// per session; dropping it frees all owned buffers.
pub struct SplitterState {
    pub(crate) limits: SplitLimits,

    // --- scan state ---
    /// Awaiting the 24-octet client preface. True only for the
    /// client-to-server direction, and only until the preface is consumed.
    pub(crate) preface: bool,
    /// Octets accumulated toward the preface or the current frame header.
    pub(crate) octets_seen: usize,
    /// Partial frame header; valid for indices below `octets_seen`.
    pub(crate) scan_frame_header: [u8; FRAME_HEADER_SIZE],
    /// Payload octets of the frame under scan still to consume.
    pub(crate) scan_remaining_octets: u32,
    /// The last HEADERS/CONTINUATION lacked END_HEADERS.
    pub(crate) continuation_expected: bool,
    /// A DATA payload is still being cut across chunks.
    pub(crate) mid_data_frame: bool,
    /// Stream id of the frame under scan.
    pub(crate) current_stream: StreamId,
    /// Frame headers accumulated since the last flush.
    pub(crate) num_frame_headers: u32,
    /// Bytes promised to the reassembler for the current PDU.
    pub(crate) total_bytes_in_split: u32,
    /// Type of the last frame whose header was scanned.
    pub(crate) frame_type: u8,
    /// The next flushed PDU is the preface and must not reach detection.
    pub(crate) payload_discard: bool,

    // --- reassembly state ---
    pub(crate) frame_header_buf: Vec<u8>,
    pub(crate) frame_data_buf: Vec<u8>,
    /// Target size of `frame_header_buf` for the PDU being reassembled.
    pub(crate) frame_header_size: usize,
    /// Target size of `frame_data_buf`; shrinks as padding is discovered.
    pub(crate) frame_data_size: usize,
    /// Octets of the current frame still to reassemble (payload + padding).
    pub(crate) reasm_remaining_octets: u32,
    /// Padding octets of the current frame not yet skipped.
    pub(crate) padding_remaining: u32,
    /// The next payload octet is the pad length of a PADDED frame.
    pub(crate) read_pad_length: bool,
}

impl SplitterState {
    /// Splitter state for one direction with default limits.
    pub fn new(direction: Direction) -> Self {
        Self::with_limits(direction, SplitLimits::default())
    }

    /// Splitter state for one direction with custom limits.
    pub fn with_limits(direction: Direction, limits: SplitLimits) -> Self {
        Self {
            limits,
            preface: direction == Direction::ClientToServer,
            octets_seen: 0,
            scan_frame_header: [0; FRAME_HEADER_SIZE],
            scan_remaining_octets: 0,
            continuation_expected: false,
            mid_data_frame: false,
            current_stream: StreamId(0),
            num_frame_headers: 0,
            total_bytes_in_split: 0,
            frame_type: FRAME_TYPE_DATA,
            payload_discard: false,
            frame_header_buf: Vec::new(),
            frame_data_buf: Vec::new(),
            frame_header_size: 0,
            frame_data_size: 0,
            reasm_remaining_octets: 0,
            padding_remaining: 0,
            read_pad_length: false,
        }
    }

    /// Frame headers of the reassembled PDU, 9 octets per frame.
    pub fn frame_header(&self) -> &[u8] {
        &self.frame_header_buf
    }

    /// Frame payloads of the reassembled PDU with padding elided, or the
    /// cutter's assembled message body for a DATA PDU.
    pub fn frame_data(&self) -> &[u8] {
        &self.frame_data_buf
    }

    /// Frame headers accumulated for the PDU currently being split.
    pub fn num_frame_headers(&self) -> u32 {
        self.num_frame_headers
    }

    /// Bytes promised to the reassembler for the PDU currently being split.
    /// This is the `total` the caller passes to
    /// [`reassemble`](Self::reassemble).
    pub fn total_bytes_in_split(&self) -> u32 {
        self.total_bytes_in_split
    }

    /// Whether the PDU just flushed is the connection preface, which must
    /// be discarded rather than reassembled. Reading the flag clears it.
    pub fn take_payload_discard(&mut self) -> bool {
        std::mem::take(&mut self.payload_discard)
    }

    /// Release the reassembly buffers once the caller has consumed them.
    pub fn clear_frame_buffers(&mut self) {
        self.frame_header_buf = Vec::new();
        self.frame_data_buf = Vec::new();
        self.frame_header_size = 0;
        self.frame_data_size = 0;
    }
}
