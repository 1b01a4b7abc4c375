use crate::cutter::{CutterRegistry, DataFrame};
use crate::event::{EventSink, ProtocolEvent};
use crate::frame::{
    CONNECTION_PREFACE,
    FRAME_HEADER_SIZE,
    FRAME_TYPE_CONTINUATION,
    FRAME_TYPE_DATA,
    FRAME_TYPE_HEADERS,
    FLAG_END_HEADERS,
    FrameHeader,
    PrefaceCheck,
    validate_preface,
};
use crate::state::{ScanStatus, SplitError, SplitErrorKind, SplitterState};
use crate::trace_warn;

impl SplitterState {
    /// Scan one chunk of the directional byte stream.
    ///
    /// The chunk may cut the stream anywhere; carry state makes the result
    /// independent of segmentation. On [`ScanStatus::Flush`] the caller
    /// delivers the bytes up to the returned offset (together with any
    /// bytes buffered since the last flush) to
    /// [`reassemble`](Self::reassemble) and resumes scanning at the offset.
    /// `Err` means the direction is out of protocol and must be torn down;
    /// the violation has already been reported to `events`.
    ///
    /// Zero-length chunks are accepted and change nothing.
    pub fn scan<C: CutterRegistry, E: EventSink>(
        &mut self,
        chunk: &[u8],
        cutters: &mut C,
        events: &mut E,
    ) -> Result<ScanStatus, SplitError> {
        if chunk.is_empty() {
            return Ok(ScanStatus::Search);
        }

        if self.preface {
            // 24-octet preface, not a real frame, no frame header
            return match validate_preface(chunk, self.octets_seen) {
                PrefaceCheck::Good => {
                    let flush = CONNECTION_PREFACE.len() - self.octets_seen;
                    self.preface = false;
                    self.payload_discard = true;
                    self.octets_seen = 0;
                    Ok(ScanStatus::Flush(flush))
                },
                PrefaceCheck::Bad => {
                    trace_warn!("connection preface mismatch, aborting direction");
                    events.record_event(ProtocolEvent::PrefaceMatchFailure);
                    Err(SplitError::new(SplitErrorKind::PrefaceMatchFailure))
                },
                PrefaceCheck::Incomplete => {
                    self.octets_seen += chunk.len();
                    Ok(ScanStatus::Search)
                },
            };
        }

        let mut data_offset = 0;

        // A HEADERS frame followed by its CONTINUATION in the same segment,
        // or several frames back to back, must all be walked in one call.
        loop {
            let offset_before = data_offset;

            let status = if self.mid_data_frame {
                // Continuation of an ongoing DATA frame
                let Some(data_cutter) = cutters.cutter_for(self.current_stream) else {
                    events.accumulate_infraction(ProtocolEvent::FrameSequence);
                    events.record_event(ProtocolEvent::FrameSequence);
                    return Err(SplitError::with_stream(
                        SplitErrorKind::FrameSequence,
                        self.current_stream,
                    ));
                };
                let cut = data_cutter.scan(&chunk[data_offset..], None);
                data_offset += cut.consumed;
                debug_assert!(data_offset <= chunk.len());
                self.mid_data_frame = !cut.frame_complete;
                if cut.flush {
                    ScanStatus::Flush(data_offset)
                } else {
                    ScanStatus::Search
                }
            } else {
                if self.octets_seen == 0 {
                    // Scanning a new frame
                    self.num_frame_headers += 1;
                }

                // The first nine bytes are the frame header, but they may
                // arrive spread over any number of segments.
                let remaining_header = FRAME_HEADER_SIZE - self.octets_seen;
                let n = remaining_header.min(chunk.len() - data_offset);
                self.scan_frame_header[self.octets_seen..self.octets_seen + n]
                    .copy_from_slice(&chunk[data_offset..data_offset + n]);
                self.octets_seen += n;
                data_offset += n;

                if self.octets_seen < FRAME_HEADER_SIZE {
                    return Ok(ScanStatus::Search);
                }

                let header = FrameHeader::from_bytes(&self.scan_frame_header);
                self.frame_type = header.frame_type;
                self.current_stream = header.stream_id;

                if header.frame_type == FRAME_TYPE_DATA {
                    self.data_scan(chunk, &mut data_offset, &header, cutters, events)?
                } else {
                    self.non_data_scan(chunk.len(), &mut data_offset, &header, events)?
                }
            };

            match status {
                // A stalled external cutter must not spin the loop
                ScanStatus::Search if data_offset < chunk.len() && data_offset > offset_before => {},
                _ => return Ok(status),
            }
        }
    }

    /// Scan the payload section of a non-DATA frame, flushing once the
    /// frame (or the CONTINUATION chain it terminates) is complete.
    fn non_data_scan<E: EventSink>(
        &mut self,
        length: usize,
        data_offset: &mut usize,
        header: &FrameHeader,
        events: &mut E,
    ) -> Result<ScanStatus, SplitError> {
        // Compute frame section length once per frame
        if self.scan_remaining_octets == 0 {
            if self.continuation_expected && header.frame_type != FRAME_TYPE_CONTINUATION {
                trace_warn!(
                    stream = header.stream_id.0,
                    "open HEADERS block interrupted by non-CONTINUATION frame"
                );
                events.accumulate_infraction(ProtocolEvent::MissingContinuation);
                events.record_event(ProtocolEvent::MissingContinuation);
                return Err(SplitError::with_stream(
                    SplitErrorKind::MissingContinuation,
                    header.stream_id,
                ));
            }

            // Chunked handling of long control frames is not supported; the
            // ceiling bounds the whole PDU, CONTINUATION chains included
            let promised = self.total_bytes_in_split as usize + FRAME_HEADER_SIZE;
            if promised + header.length as usize > self.limits.max_pdu_octets {
                return Err(SplitError::with_stream(
                    SplitErrorKind::FrameTooLong,
                    header.stream_id,
                ));
            }

            self.scan_remaining_octets = header.length;
            self.total_bytes_in_split += FRAME_HEADER_SIZE as u32 + header.length;
        }

        // If we don't have the full frame, keep scanning
        let available = (length - *data_offset) as u32;
        if available < self.scan_remaining_octets {
            self.scan_remaining_octets -= available;
            *data_offset = length;
            return Ok(ScanStatus::Search);
        }

        // Have the full frame
        let mut flush = true;
        match header.frame_type {
            FRAME_TYPE_HEADERS => {
                if header.flags & FLAG_END_HEADERS == 0 {
                    self.continuation_expected = true;
                    flush = false;
                }
            },
            FRAME_TYPE_CONTINUATION => {
                if self.continuation_expected {
                    if header.flags & FLAG_END_HEADERS == 0 {
                        flush = false;
                    } else {
                        // continuation frame ending the header block
                        self.continuation_expected = false;
                    }
                } else {
                    // CONTINUATION may also follow PUSH_PROMISE, which is
                    // not currently supported
                    trace_warn!(
                        stream = header.stream_id.0,
                        "CONTINUATION without an open HEADERS block"
                    );
                    events.accumulate_infraction(ProtocolEvent::UnexpectedContinuation);
                    events.record_event(ProtocolEvent::UnexpectedContinuation);
                    return Err(SplitError::with_stream(
                        SplitErrorKind::UnexpectedContinuation,
                        header.stream_id,
                    ));
                }
            },
            _ => {},
        }

        *data_offset += self.scan_remaining_octets as usize;
        self.octets_seen = 0;
        self.scan_remaining_octets = 0;
        Ok(if flush {
            ScanStatus::Flush(*data_offset)
        } else {
            ScanStatus::Search
        })
    }

    /// Validate a DATA frame against stream state and hand its payload to
    /// the external per-stream cutter.
    fn data_scan<C: CutterRegistry, E: EventSink>(
        &mut self,
        chunk: &[u8],
        data_offset: &mut usize,
        header: &FrameHeader,
        cutters: &mut C,
        events: &mut E,
    ) -> Result<ScanStatus, SplitError> {
        // Header consumed; the cutter owns the payload from here on.
        self.octets_seen = 0;

        let expects_body = cutters.expects_body(header.stream_id);
        let Some(data_cutter) = cutters.cutter_for(header.stream_id) else {
            events.accumulate_infraction(ProtocolEvent::FrameSequence);
            events.record_event(ProtocolEvent::FrameSequence);
            return Err(SplitError::with_stream(
                SplitErrorKind::FrameSequence,
                header.stream_id,
            ));
        };
        if header.length > 0 && !expects_body {
            trace_warn!(
                stream = header.stream_id.0,
                "DATA frame with no message body expected"
            );
            events.accumulate_infraction(ProtocolEvent::FrameSequence);
            events.record_event(ProtocolEvent::FrameSequence);
            return Err(SplitError::with_stream(
                SplitErrorKind::FrameSequence,
                header.stream_id,
            ));
        }

        if header.length == 0 || header.length as usize > self.limits.max_pdu_octets {
            return Err(SplitError::with_stream(
                SplitErrorKind::InvalidDataLength,
                header.stream_id,
            ));
        }

        let cut = data_cutter.scan(
            &chunk[*data_offset..],
            Some(DataFrame {
                length: header.length,
                flags: header.flags,
            }),
        );
        *data_offset += cut.consumed;
        debug_assert!(*data_offset <= chunk.len());
        self.mid_data_frame = !cut.frame_complete;
        Ok(if cut.flush {
            ScanStatus::Flush(*data_offset)
        } else {
            ScanStatus::Search
        })
    }
}
