//! Process-wide decode counters.
//! Cheap relaxed atomics; read them with [`snapshot`].
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static FRAMES_COMPLETED: AtomicU64 = AtomicU64::new(0);
static FRAMING_ERRORS: AtomicU64 = AtomicU64::new(0);
static FRAME_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static DATAGRAMS_DECODED: AtomicU64 = AtomicU64::new(0);
static DECODE_FAILURES: AtomicU64 = AtomicU64::new(0);
static DATAGRAMS_DROPPED: AtomicU64 = AtomicU64::new(0);

pub fn inc_frames_completed() {
    FRAMES_COMPLETED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_framing_errors() {
    FRAMING_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_frame_timeouts() {
    FRAME_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_datagrams_decoded() {
    DATAGRAMS_DECODED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_decode_failures() {
    DECODE_FAILURES.fetch_add(1, Ordering::Relaxed);
}
/// Datagram from a sender with no protocol binding.
pub fn inc_datagrams_dropped() {
    DATAGRAMS_DROPPED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub frames_completed: u64,
    pub framing_errors: u64,
    pub frame_timeouts: u64,
    pub datagrams_decoded: u64,
    pub decode_failures: u64,
    pub datagrams_dropped: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        frames_completed: FRAMES_COMPLETED.load(Ordering::Relaxed),
        framing_errors: FRAMING_ERRORS.load(Ordering::Relaxed),
        frame_timeouts: FRAME_TIMEOUTS.load(Ordering::Relaxed),
        datagrams_decoded: DATAGRAMS_DECODED.load(Ordering::Relaxed),
        decode_failures: DECODE_FAILURES.load(Ordering::Relaxed),
        datagrams_dropped: DATAGRAMS_DROPPED.load(Ordering::Relaxed),
    }
}
