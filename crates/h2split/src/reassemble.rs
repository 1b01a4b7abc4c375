use bytecursor::ByteCursor;

use crate::cutter::CutterRegistry;
use crate::frame::{FLAG_PADDED, FRAME_HEADER_SIZE, FRAME_TYPE_DATA, FrameHeader};
use crate::state::{Reassembly, SplitError, SplitErrorKind, SplitterState};

impl SplitterState {
    /// Reassemble one contiguous segment of a flushed PDU.
    ///
    /// Called once per segment, with the same chunk boundaries the scanner
    /// saw. `offset` is the segment's position within the PDU (`0` on the
    /// first call) and `total` the full PDU size, which the scanner
    /// promised through [`total_bytes_in_split`](Self::total_bytes_in_split).
    /// `pdu_tail` is set on the final segment.
    ///
    /// Non-DATA PDUs are demultiplexed into the
    /// [`frame_header`](Self::frame_header) buffer (9 octets per frame) and
    /// the [`frame_data`](Self::frame_data) buffer (payloads, padding
    /// elided). DATA PDUs are forwarded to the stream's external cutter and
    /// its assembled message body, if any, becomes `frame_data`.
    pub fn reassemble<C: CutterRegistry>(
        &mut self,
        total: usize,
        offset: usize,
        chunk: &[u8],
        pdu_tail: bool,
        cutters: &mut C,
    ) -> Result<Reassembly, SplitError> {
        debug_assert!(offset + chunk.len() <= total);
        // a DATA PDU of maximal frame length still carries its 9-octet header
        debug_assert!(total <= self.limits.max_pdu_octets + FRAME_HEADER_SIZE);

        if offset == 0 {
            // First reassemble() for this PDU: size the header buffer from
            // the scanner's frame count.
            self.frame_header_size = FRAME_HEADER_SIZE * self.num_frame_headers as usize;
            self.frame_header_buf = Vec::with_capacity(self.frame_header_size);
        }

        if self.frame_type == FRAME_TYPE_DATA {
            let Some(data_cutter) = cutters.cutter_for(self.current_stream) else {
                return Err(SplitError::with_stream(
                    SplitErrorKind::FrameSequence,
                    self.current_stream,
                ));
            };
            if let Some(body) = data_cutter.reassemble(chunk) {
                self.frame_data_size = body.len();
                self.frame_data_buf = body;
            }
        } else {
            debug_assert!(total >= FRAME_HEADER_SIZE);
            if offset == 0 {
                self.frame_data_size = total.saturating_sub(self.frame_header_size);
                self.frame_data_buf = Vec::with_capacity(self.frame_data_size);
                self.reasm_remaining_octets = 0;
                self.padding_remaining = 0;
                self.read_pad_length = false;
            }
            self.copy_frames(chunk);
        }

        if pdu_tail {
            debug_assert_eq!(offset + chunk.len(), total);
            self.total_bytes_in_split = 0;
            self.num_frame_headers = 0;
            self.octets_seen = 0;
            return Ok(Reassembly::Complete);
        }
        Ok(Reassembly::Pending)
    }

    /// Round-robin copy of one non-DATA segment: payload octets into
    /// `frame_data_buf`, the 9-octet headers into `frame_header_buf`,
    /// padding skipped.
    fn copy_frames(&mut self, chunk: &[u8]) {
        let mut cur = ByteCursor::new(chunk);

        while !cur.is_empty() {
            // Read the pad length if the previous header carried PADDED
            if self.read_pad_length {
                if let Some(pad) = cur.bump() {
                    self.read_pad_length = false;
                    self.reasm_remaining_octets -= 1;
                    // A pad length claiming more than the rest of the frame
                    // is clamped rather than trusted.
                    self.padding_remaining = (pad as u32).min(self.reasm_remaining_octets);
                    self.frame_data_size = self
                        .frame_data_size
                        .saturating_sub(self.padding_remaining as usize + 1);
                }
            }

            // Copy payload until the end of the current frame's data
            let payload_remaining = self.reasm_remaining_octets - self.padding_remaining;
            let bytes = cur.take(payload_remaining as usize);
            self.frame_data_buf.extend_from_slice(bytes);
            self.reasm_remaining_octets -= bytes.len() as u32;
            debug_assert!(self.frame_data_buf.len() <= self.frame_data_size);
            if cur.is_empty() {
                break;
            }

            // Skip over any padding
            let skipped = cur.skip(self.padding_remaining as usize) as u32;
            self.reasm_remaining_octets -= skipped;
            self.padding_remaining -= skipped;
            if cur.is_empty() {
                break;
            }

            // Copy the next frame header
            let header_remaining =
                FRAME_HEADER_SIZE - self.frame_header_buf.len() % FRAME_HEADER_SIZE;
            let bytes = cur.take(header_remaining);
            self.frame_header_buf.extend_from_slice(bytes);
            debug_assert!(self.frame_header_buf.len() <= self.frame_header_size);
            if !self.frame_header_buf.len().is_multiple_of(FRAME_HEADER_SIZE) {
                break;
            }

            // A header just completed: seed the next frame's section from it
            let start = self.frame_header_buf.len() - FRAME_HEADER_SIZE;
            let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
            header_bytes.copy_from_slice(&self.frame_header_buf[start..]);
            let header = FrameHeader::from_bytes(&header_bytes);
            self.reasm_remaining_octets = header.length;
            if header.flags & FLAG_PADDED != 0 {
                self.read_pad_length = true;
            }
        }
    }
}
