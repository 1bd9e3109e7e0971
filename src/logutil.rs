//! Logging helpers for raw terminal traffic.
//! Text datagrams are escaped so logs stay single-line; binary frames are shown as hex.

use std::fmt::Write;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Truncates very long strings with an ellipsis to cap log noise.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape raw datagram bytes as lossy ASCII for logging.
pub fn escape_bytes(data: &[u8]) -> String {
    escape_log(&String::from_utf8_lossy(data))
}

/// Lowercase hex encoding of the full buffer.
pub fn hex(data: &[u8]) -> String {
    ::hex::encode(data)
}

/// Hex encoding of at most `max` leading bytes, for trace-level noise.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    hex(&data[..data.len().min(max)])
}
