#![warn(missing_docs)]
//! Stateful HTTP/2 frame splitter and reassembler for passive traffic
//! inspection.
//!
//! This crate decides, over a raw directional TCP byte stream delivered in
//! arbitrary segments, where complete HTTP/2 protocol data units end — the
//! connection preface, a DATA frame section, a HEADERS+CONTINUATION run, or
//! any other control frame — and reassembles the flushed bytes into
//! separate frame-header and frame-payload buffers with padding elided.
//! It never requires the caller to deliver whole frames, never reorders
//! bytes, and never buffers more than one PDU per direction.
//!
//! # Key types
//!
//! - [`SplitterCache`] — thread-safe cache of many sessions keyed by an
//!   arbitrary `K`. Best when you track many connections and want
//!   automatic state management.
//! - [`SplitterSession`] — one client/server pair of [`SplitterState`].
//! - [`SplitterState`] — scan and reassembly state for a single direction.
//!
//! # Example
//!
//! ```no_run
//! use h2split::{Direction, NoStreams, NullEvents, ScanStatus, SplitterState};
//!
//! let mut state = SplitterState::new(Direction::ClientToServer);
//! let mut streams = NoStreams;
//! let mut events = NullEvents;
//!
//! // Feed segments as they arrive
//! # let segment: Vec<u8> = vec![];
//! match state.scan(&segment, &mut streams, &mut events) {
//!     Ok(ScanStatus::Flush(offset)) => {
//!         // deliver buffered bytes + segment[..offset] to reassemble(),
//!         // then resume scanning at segment[offset..]
//!     }
//!     Ok(ScanStatus::Search) => { /* need more bytes */ }
//!     Err(_) => { /* protocol violation, tear down this direction */ }
//! }
//! ```
//!
//! # Feature flags
//!
//! - **`tracing`** — emit `tracing::warn!` events when a direction is
//!   aborted for a protocol violation.

mod cutter;
mod event;
mod frame;
mod reassemble;
mod scan;
mod state;


#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
use std::hash::Hash;
use std::sync::Mutex;

use dashmap::DashMap;
pub use cutter::{CutScan, CutterRegistry, DataCutter, DataFrame, NoStreams};
pub use event::{EventSink, EventTally, NullEvents, ProtocolEvent};
pub use frame::{CONNECTION_PREFACE, PrefaceCheck, looks_like_http2_frame, validate_preface};
pub use state::{
    Direction,
    Reassembly,
    ScanStatus,
    SplitError,
    SplitErrorKind,
    SplitLimits,
    SplitterState,
    StreamId,
};
pub(crate) use trace_warn;

/// Splitter state for both directions of one HTTP/2 session.
///
/// Only the client-to-server direction expects the connection preface.
pub struct SplitterSession {
    /// Bytes sent by the connection initiator.
    pub client_to_server: SplitterState,
    /// Bytes sent by the server.
    pub server_to_client: SplitterState,
}

impl SplitterSession {
    /// Session state with default limits.
    pub fn new() -> Self {
        Self::with_limits(SplitLimits::default())
    }

    /// Session state with custom limits, shared by both directions.
    pub fn with_limits(limits: SplitLimits) -> Self {
        Self {
            client_to_server: SplitterState::with_limits(Direction::ClientToServer, limits.clone()),
            server_to_client: SplitterState::with_limits(Direction::ServerToClient, limits),
        }
    }

    /// The splitter state for `direction`.
    pub fn direction_mut(&mut self, direction: Direction) -> &mut SplitterState {
        match direction {
            Direction::ClientToServer => &mut self.client_to_server,
            Direction::ServerToClient => &mut self.server_to_client,
        }
    }
}

impl Default for SplitterSession {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP/2 splitter cache with generic session keys.
///
/// Uses `DashMap<K, Mutex<SplitterSession>>` to provide per-key
/// serialization. The DashMap shard lock is held only briefly (to look up
/// or insert the entry), while the per-key Mutex serializes concurrent
/// same-key calls to [`with_session`](Self::with_session). This prevents
/// the remove-and-reinsert race where two threads would both create default
/// state for the same key, losing one thread's scan carry state.
pub struct SplitterCache<K> {
    sessions: DashMap<K, Mutex<SplitterSession>>,
    limits: SplitLimits,
}

impl<K: Hash + Eq + Clone> SplitterCache<K> {
    /// Create a new cache with default limits.
    pub fn new() -> Self {
        Self::with_limits(SplitLimits::default())
    }

    /// Create a new cache whose sessions use `limits`.
    pub fn with_limits(limits: SplitLimits) -> Self {
        Self {
            sessions: DashMap::new(),
            limits,
        }
    }

    /// Run `f` against the session for `key`, creating the session on first
    /// use. All scanning, reassembly, and buffer access for a key happens
    /// inside `f`, under the per-key lock.
    pub fn with_session<R>(&self, key: K, f: impl FnOnce(&mut SplitterSession) -> R) -> R {
        // Atomic insert-if-absent
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| Mutex::new(SplitterSession::with_limits(self.limits.clone())));

        // Get shared shard read lock + per-key mutex lock
        let entry = self.sessions.get(&key).expect("entry was just ensured");
        let mut session = entry.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut session)
    }

    /// Remove session state (call when the connection closes).
    pub fn remove(&self, key: &K) -> Option<SplitterSession> {
        self.sessions
            .remove(key)
            .map(|(_, mutex)| mutex.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    /// Check if session state exists.
    pub fn contains(&self, key: &K) -> bool {
        self.sessions.contains_key(key)
    }

    /// Get the number of tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<K: Hash + Eq + Clone> Default for SplitterCache<K> {
    fn default() -> Self {
        Self::new()
    }
}
