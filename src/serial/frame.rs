//! Fixed-capacity frame buffer owned by the assembler.

use crate::error::FrameError;

use super::destuff::destuff;

/// Largest frame the converter protocol can address, with generous headroom.
pub const MAX_FRAME_SIZE: usize = 1024;

pub struct RawFrame {
    buf: [u8; MAX_FRAME_SIZE],
    len: usize,
}

impl RawFrame {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_SIZE],
            len: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), FrameError> {
        if self.len >= MAX_FRAME_SIZE {
            return Err(FrameError::Overflow {
                capacity: MAX_FRAME_SIZE,
            });
        }
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    pub fn last(&self) -> Option<u8> {
        self.as_slice().last().copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Undo transport byte stuffing; shrinks the logical length.
    pub fn destuff(&mut self) {
        self.len = destuff(&mut self.buf, self.len);
    }

    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for RawFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("len", &self.len)
            .field("data", &crate::logutil::hex(self.as_slice()))
            .finish()
    }
}
