//! Fuzz target: frame splitter over raw bytes
//!
//! Feeds completely random bytes to the scanner and reassembler, whole and
//! re-chunked. The goal is to ensure the splitter never panics on arbitrary
//! input.

#![no_main]

use h2split::{Direction, NoStreams, NullEvents, ScanStatus, SplitterState};
use libfuzzer_sys::fuzz_target;

/// One scan/reassemble pass, buffering unflushed segments like the stream
/// layer would.
fn run(state: &mut SplitterState, pending: &mut Vec<Vec<u8>>, mut rest: &[u8]) -> Result<(), ()> {
    while !rest.is_empty() {
        match state.scan(rest, &mut NoStreams, &mut NullEvents) {
            Ok(ScanStatus::Search) => {
                pending.push(rest.to_vec());
                break;
            }
            Ok(ScanStatus::Flush(offset)) => {
                let mut segments = std::mem::take(pending);
                segments.push(rest[..offset].to_vec());
                if !state.take_payload_discard() {
                    let total: usize = segments.iter().map(Vec::len).sum();
                    let last = segments.len() - 1;
                    let mut at = 0;
                    for (i, segment) in segments.iter().enumerate() {
                        state
                            .reassemble(total, at, segment, i == last, &mut NoStreams)
                            .map_err(|_| ())?;
                        at += segment.len();
                    }
                    state.clear_frame_buffers();
                }
                rest = &rest[offset..];
            }
            Err(_) => return Err(()),
        }
    }
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    // Client direction sees the preface check, server direction the frames
    let mut client = SplitterState::new(Direction::ClientToServer);
    let _ = run(&mut client, &mut Vec::new(), data);

    let mut server = SplitterState::new(Direction::ServerToClient);
    let _ = run(&mut server, &mut Vec::new(), data);

    // Also feed in two chunks to exercise carry state
    if data.len() > 10 {
        let mut state = SplitterState::new(Direction::ServerToClient);
        let mut pending = Vec::new();
        let mid = data.len() / 2;
        if run(&mut state, &mut pending, &data[..mid]).is_ok() {
            let _ = run(&mut state, &mut pending, &data[mid..]);
        }
    }
});
