//! Protocol events surfaced to the caller's inspection pipeline.
//!
//! The splitter never owns alerting or counting policy. Whoever drives it
//! supplies an [`EventSink`]; the splitter reports each protocol violation
//! both as a discrete event and as an accumulated infraction, matching the
//! two channels an inspection engine typically keeps (alert generation vs.
//! per-flow infraction state).

/// A protocol violation observed while splitting a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// DATA frame arrived for a stream with no half-open message body
    /// expecting it.
    FrameSequence,
    /// A HEADERS block was left open but the next frame was not a
    /// CONTINUATION.
    MissingContinuation,
    /// CONTINUATION frame with no preceding open HEADERS block. Also raised
    /// for CONTINUATION chains following PUSH_PROMISE, which is not
    /// supported.
    UnexpectedContinuation,
    /// The 24-octet connection preface did not match.
    PrefaceMatchFailure,
}

/// Receiver for splitter events, owned by the caller.
pub trait EventSink {
    /// Report a discrete, alertable event.
    fn record_event(&mut self, event: ProtocolEvent);

    /// Accumulate an infraction against the flow.
    fn accumulate_infraction(&mut self, event: ProtocolEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl EventSink for NullEvents {
    fn record_event(&mut self, _event: ProtocolEvent) {}

    fn accumulate_infraction(&mut self, _event: ProtocolEvent) {}
}

/// Sink that keeps events and infraction counts, for callers (and tests)
/// that want to inspect what the splitter reported.
#[derive(Debug, Default, Clone)]
pub struct EventTally {
    /// Discrete events in the order they were recorded.
    pub events: Vec<ProtocolEvent>,
    infractions: Vec<ProtocolEvent>,
}

impl EventTally {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of infractions accumulated for `event`.
    pub fn infraction_count(&self, event: ProtocolEvent) -> usize {
        self.infractions.iter().filter(|&&e| e == event).count()
    }
}

impl EventSink for EventTally {
    fn record_event(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    fn accumulate_infraction(&mut self, event: ProtocolEvent) {
        self.infractions.push(event);
    }
}
