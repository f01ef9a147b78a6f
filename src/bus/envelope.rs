//! The fixed-shape inter-task message record.
//!
//! Every message crossing the bus is one [`Envelope`]: source and
//! destination identities, a kind tag, two general-purpose integers, a
//! flag, and four bounded text fields. Envelopes are value types — they
//! are copied into the destination mailbox, never shared.
//!
//! The text fields keep the constrained-memory contract of the wire
//! layout they replace: a field of capacity `N` stores at most `N - 1`
//! bytes, with oversized input truncated (the final byte is the slot
//! the C layout reserved for the NUL terminator). Truncation is defined
//! behavior, not an error.

use crate::bus::TaskId;

/// Message kind tags. Closed set — extend by adding tags, never by
/// overloading an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    StartupRequest = 1,
    StartupAck = 2,
    Heartbeat = 3,
    WifiInitRequest = 10,
    WifiInitDone = 11,
    BrokerInitRequest = 20,
    BrokerInitDone = 21,
    BrokerPublishOnlineRequest = 22,
    BrokerPublishOnlineDone = 23,
    TaskError = 255,
}

/// Bounded text field with truncate-on-overflow semantics.
///
/// Capacity is `N` bytes; at most `N - 1` are ever stored. Truncation
/// lands on a UTF-8 character boundary, so `as_str` is always valid and
/// is always a prefix of the input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoundedText<const N: usize> {
    inner: heapless::String<N>,
}

impl<const N: usize> BoundedText<N> {
    /// Total capacity in bytes, including the reserved terminator slot.
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            inner: heapless::String::new(),
        }
    }

    pub fn from_truncated(value: &str) -> Self {
        let mut text = Self::new();
        text.set(value);
        text
    }

    /// Replace the contents, truncating to `N - 1` bytes.
    pub fn set(&mut self, value: &str) {
        self.inner.clear();
        let limit = N - 1;
        let mut end = value.len().min(limit);
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        // Cannot fail: end <= N - 1 < capacity.
        let _ = self.inner.push_str(&value[..end]);
    }

    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Capacity of the short text field (reason strings, labels).
pub const TEXT_SHORT: usize = 48;
/// Capacity of the three long text fields (SSIDs, URLs, credentials).
pub const TEXT_LONG: usize = 64;

/// One inter-task message. Fixed-size; never dynamically sized.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub source: TaskId,
    pub destination: TaskId,
    pub kind: MsgKind,
    pub value_a: i32,
    pub value_b: i32,
    pub flag: bool,
    pub text: BoundedText<TEXT_SHORT>,
    pub text2: BoundedText<TEXT_LONG>,
    pub text3: BoundedText<TEXT_LONG>,
    pub text4: BoundedText<TEXT_LONG>,
}

impl Envelope {
    pub fn new(source: TaskId, destination: TaskId, kind: MsgKind) -> Self {
        Self {
            source,
            destination,
            kind,
            value_a: 0,
            value_b: 0,
            flag: false,
            text: BoundedText::new(),
            text2: BoundedText::new(),
            text3: BoundedText::new(),
            text4: BoundedText::new(),
        }
    }

    /// Build a reply envelope addressed back at this message's sender.
    pub fn reply(&self, kind: MsgKind) -> Self {
        Self::new(self.destination, self.source, kind)
    }
}
