//! # Serial Link
//!
//! The ekey serial converter sends a continuous byte stream with no framing
//! guaranteed by the transport. This module rebuilds frames from it:
//!
//! - [`destuff`] - reverses the transport byte stuffing of reserved bytes
//! - [`frame`] - the bounded frame buffer
//! - [`assembler`] - the byte-at-a-time state machine with its idle timer
//! - `link` - the tokio task that owns the port (feature `serial`)
//!
//! ```rust
//! use ekey_gateway::serial::{FrameAssembler, SerialFrame};
//! use std::time::Instant;
//!
//! let mut asm = FrameAssembler::default();
//! let frames = asm.push(&[0x02, 0x0d, 0x20, 0x44, 0x03], Instant::now());
//! assert_eq!(frames, vec![SerialFrame::Raw(vec![0x02, 0x0d, 0x20, 0x44, 0x03])]);
//! ```

pub mod assembler;
pub mod destuff;
pub mod frame;
#[cfg(feature = "serial")]
pub mod link;

pub use assembler::{FrameAssembler, FrameState, Progress, SerialFrame, DEFAULT_IDLE_TIMEOUT};
pub use frame::{RawFrame, MAX_FRAME_SIZE};
#[cfg(feature = "serial")]
pub use link::{list_ports, SerialLink};
