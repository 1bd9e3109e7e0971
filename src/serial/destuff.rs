//! Byte de-stuffing for ekey serial frames.
//!
//! The converter escapes reserved bytes inside the payload so that start and
//! end markers never appear literally:
//!
//! ```text
//!   02 --> 3F 41
//!   03 --> 3F 81
//!   3F --> 3F C1
//! ```
//!
//! The addressing header (offsets 0..=14) is defined not to contain reserved
//! bytes and is never scanned.

pub const ESCAPE: u8 = 0x3F;

/// First offset that may contain stuffed bytes.
pub const STUFFED_REGION_START: usize = 15;

fn unescape(marker: u8) -> Option<u8> {
    match marker {
        0x41 => Some(0x02),
        0x81 => Some(0x03),
        0xC1 => Some(ESCAPE),
        _ => None,
    }
}

/// Undo byte stuffing in `buf[..len]` in place and return the new logical length.
///
/// A `3F` followed by anything other than a known marker is literal data; both
/// bytes are kept and scanning resumes after the pair. A trailing `3F` with no
/// follower is literal.
pub fn destuff(buf: &mut [u8], len: usize) -> usize {
    let len = len.min(buf.len());
    if len <= STUFFED_REGION_START {
        return len;
    }

    let mut read = STUFFED_REGION_START;
    let mut write = STUFFED_REGION_START;
    while read < len {
        let byte = buf[read];
        if byte == ESCAPE && read + 1 < len {
            let follower = buf[read + 1];
            match unescape(follower) {
                Some(original) => {
                    buf[write] = original;
                    write += 1;
                }
                None => {
                    buf[write] = byte;
                    buf[write + 1] = follower;
                    write += 2;
                }
            }
            read += 2;
            continue;
        }
        buf[write] = byte;
        write += 1;
        read += 1;
    }
    write
}
