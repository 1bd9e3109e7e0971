//! Error types shared by the frame assembler and the packet decoders.
//!
//! Every failure here is local to one unit of input (one serial frame or one
//! datagram). Callers log it and move on to the next unit.

use std::fmt;

/// Why a single datagram could not be turned into an [`EventRecord`](crate::event::EventRecord).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid packet length: expected at least {expected} fields, got {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Invalid packet type: {0:?}")]
    BadMarker(String),

    #[error("Invalid packet length: {len} bytes, need at least {min}")]
    TooShort { min: usize, len: usize },

    #[error("Packet truncated while reading {field} at offset {offset}")]
    Truncated { field: &'static str, offset: usize },

    #[error("Invalid version: {0} != 3")]
    BadVersion(i32),

    #[error("Unknown relay id: {0}")]
    RelayOutOfRange(u8),

    #[error("Protocol {0} cannot decode datagrams")]
    UnsupportedProtocol(&'static str),
}

/// A decode failure together with the bytes that caused it, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub reason: DecodeError,
    pub raw: Vec<u8>,
}

impl DecodeFailure {
    pub fn new(reason: DecodeError, raw: &[u8]) -> Self {
        Self {
            reason,
            raw: raw.to_vec(),
        }
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.reason, self.raw.len())
    }
}

impl std::error::Error for DecodeFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Protocol violations inside the serial frame assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer overflow: capacity {capacity} bytes")]
    Overflow { capacity: usize },
}
