//! Byte-at-a-time frame assembler for the ekey serial converter.
//!
//! Frame layout on the wire:
//!
//! ```text
//! byte  meaning
//! 0     start byte, always 0x02
//! 1     length: (L - 1) / 4 + 2 bytes in frame (start and stop included)
//! 2     length extension: bit 0 adds 64 bytes
//! 3..6  message type
//! 7..10 target address
//! 11..14 source address
//! 16    request counter (echoed in the response)
//! 17    finger hash
//! n     end byte, always 0x03
//! ```
//!
//! The assembler is the only framing authority on the link. It holds one idle
//! deadline; if no byte arrives before it passes, the partial frame is dropped
//! and the assembler waits for the next start byte.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::logutil::hex;
use crate::metrics;

use super::frame::RawFrame;

pub const START_BYTE: u8 = 0x02;
pub const END_BYTE: u8 = 0x03;

/// Default idle time between bytes before a partial frame is abandoned.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// De-stuffed length of the short finger identification message.
pub const FINGER_FRAME_LEN: usize = 47;
/// Offset of the finger hash within a finger identification message.
pub const FINGER_OFFSET: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitingStart,
    AwaitingLength,
    AwaitingLengthExtension,
    AwaitingPayload,
}

/// A completed, de-stuffed serial frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialFrame {
    /// Short finger identification message; carries the byte at offset 17.
    Finger(u8),
    /// Any other frame, as de-stuffed bytes.
    Raw(Vec<u8>),
}

impl SerialFrame {
    pub fn from_destuffed(bytes: &[u8]) -> Self {
        if bytes.len() == FINGER_FRAME_LEN {
            SerialFrame::Finger(bytes[FINGER_OFFSET])
        } else {
            SerialFrame::Raw(bytes.to_vec())
        }
    }
}

/// Result of feeding one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Accumulating,
    Complete(SerialFrame),
}

/// Serial frame assembler.
#[derive(Debug)]
pub struct FrameAssembler {
    frame: RawFrame,
    state: FrameState,
    expected_len: usize,
    idle_timeout: Duration,
    deadline: Option<Instant>,
}

impl FrameAssembler {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            frame: RawFrame::new(),
            state: FrameState::AwaitingStart,
            expected_len: 0,
            idle_timeout,
            deadline: None,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// When the pending idle timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Feed a chunk of bytes, returning every frame it completed.
    pub fn push(&mut self, data: &[u8], now: Instant) -> Vec<SerialFrame> {
        let mut frames = Vec::new();
        for &byte in data {
            if let Progress::Complete(frame) = self.push_byte(byte, now) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Advance the state machine by one byte received at `now`.
    pub fn push_byte(&mut self, byte: u8, now: Instant) -> Progress {
        // A deadline that passed before this byte arrived fires first.
        self.poll_timeout(now);

        match self.state {
            FrameState::AwaitingStart => {
                if byte == START_BYTE {
                    self.frame.clear();
                    if self.store(byte) {
                        self.state = FrameState::AwaitingLength;
                        debug!("Waiting for length");
                        self.arm(now);
                    }
                }
                Progress::Accumulating
            }
            FrameState::AwaitingLength => {
                self.expected_len = ((((byte as i32) - 1) >> 2) + 2) as usize;
                if self.store(byte) {
                    self.state = FrameState::AwaitingLengthExtension;
                    debug!("Waiting for length extension");
                    self.arm(now);
                }
                Progress::Accumulating
            }
            FrameState::AwaitingLengthExtension => {
                if byte & 1 == 1 {
                    debug!("2nd length byte -> +64");
                    self.expected_len += 64;
                }
                if !self.store(byte) {
                    return Progress::Accumulating;
                }
                debug!("frame has {} bytes", self.expected_len);
                if self.frame.len() >= self.expected_len {
                    self.frame.truncate(self.expected_len);
                    return Progress::Complete(self.complete());
                }
                self.state = FrameState::AwaitingPayload;
                self.arm(now);
                Progress::Accumulating
            }
            FrameState::AwaitingPayload => {
                if !self.store(byte) {
                    return Progress::Accumulating;
                }
                if self.frame.len() >= self.expected_len {
                    return Progress::Complete(self.complete());
                }
                self.arm(now);
                Progress::Accumulating
            }
        }
    }

    /// Fire the idle timer if it expired at or before `now`.
    ///
    /// Returns `true` when a partial frame was discarded.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                warn!(
                    "Timeout in {:?} after {} bytes, waiting for next start byte",
                    self.state,
                    self.frame.len()
                );
                metrics::inc_frame_timeouts();
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Drop any partial frame and cancel the idle timer.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.frame.clear();
        self.expected_len = 0;
        self.state = FrameState::AwaitingStart;
    }

    /// Transport is closing: cancel the timer without emitting a partial frame.
    pub fn shutdown(&mut self) {
        if self.state != FrameState::AwaitingStart {
            debug!(
                "Discarding partial frame of {} bytes on shutdown",
                self.frame.len()
            );
        }
        self.reset();
    }

    fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.idle_timeout);
    }

    fn store(&mut self, byte: u8) -> bool {
        match self.frame.push(byte) {
            Ok(()) => true,
            Err(e) => {
                warn!("Protocol error in {:?}: {}; resetting", self.state, e);
                metrics::inc_framing_errors();
                self.reset();
                false
            }
        }
    }

    fn complete(&mut self) -> SerialFrame {
        self.deadline = None;

        let mut print_frame = false;
        if self.frame.first() != Some(START_BYTE) {
            warn!("Wrong start byte");
            print_frame = true;
        }
        if self.frame.last() != Some(END_BYTE) {
            warn!("Wrong tail byte");
            print_frame = true;
        }
        if print_frame {
            metrics::inc_framing_errors();
        }

        self.frame.destuff();

        let bytes = self.frame.as_slice();
        if print_frame {
            info!("Raw Frame {}, {}", bytes.len(), hex(bytes));
        } else {
            debug!("Raw Frame {}, {}", bytes.len(), hex(bytes));
        }
        let frame = SerialFrame::from_destuffed(bytes);
        metrics::inc_frames_completed();

        self.frame.clear();
        self.expected_len = 0;
        self.state = FrameState::AwaitingStart;
        frame
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}
