//! Fixed-layout binary datagrams (RARE and NET converters).
//!
//! Both variants share one layout; integers are big-endian:
//!
//! ```text
//! offset size  field
//! 0      4     version (must be 3)
//! 4      4     command / action code
//! 8      4     terminal id (address of the finger scanner)
//! 12     14    terminal serial, ASCII
//! 26     1     relay id (0..=4)
//! 27     1     reserved
//! 28     4     user id
//! 32     4     finger id
//! 36     16    event text, ASCII
//! 52     16    event time, ASCII
//! 68     2     name code
//! 70     2     personal id code
//! ```
//!
//! Everything up to the finger id is mandatory. The trailing text and code
//! fields are read when the converter sent them.

use bytes::Buf;
use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::error::{DecodeError, DecodeFailure};
use crate::event::{Action, DecodeOutcome, EventRecord};

use super::ascii7;

/// Coarse length guard applied before any field is read.
pub const MIN_DATAGRAM_LEN: usize = 20;

pub const PROTOCOL_VERSION: i32 = 3;

/// Open door with finger.
pub const CMD_OPEN: i32 = 0x88;
/// Poor quality or unknown finger.
pub const CMD_REJECT: i32 = 0x89;

const MAX_RELAY_ID: u8 = 4;
const SERIAL_LEN: usize = 14;
const TEXT_LEN: usize = 16;

/// What to do with a relay id outside `0..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayPolicy {
    Reject,
    Warn,
}

/// Fields of the shared fixed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FixedLayout {
    command: i32,
    terminal_id: i32,
    terminal_serial: String,
    relay_id: u8,
    user_id: i32,
    finger_id: i32,
    event_text: Option<String>,
    time_text: Option<String>,
    name_code: Option<i16>,
    personal_id_code: Option<i16>,
}

struct Cursor<'a> {
    data: &'a [u8],
    total: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            total: data.len(),
        }
    }

    fn offset(&self) -> usize {
        self.total - self.data.remaining()
    }

    fn need(&self, n: usize, field: &'static str) -> Result<(), DecodeError> {
        if self.data.remaining() < n {
            return Err(DecodeError::Truncated {
                field,
                offset: self.offset(),
            });
        }
        Ok(())
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        self.need(4, field)?;
        Ok(self.data.get_i32())
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        self.need(1, field)?;
        Ok(self.data.get_u8())
    }

    fn ascii(&mut self, len: usize, field: &'static str) -> Result<String, DecodeError> {
        self.need(len, field)?;
        let text = ascii(&self.data[..len]);
        self.data.advance(len);
        Ok(text)
    }

    /// Up to `len` bytes of text; `None` when nothing is left.
    fn ascii_trailing(&mut self, len: usize) -> Option<String> {
        let n = len.min(self.data.remaining());
        if n == 0 {
            return None;
        }
        let text = ascii(&self.data[..n]);
        self.data.advance(n);
        Some(text)
    }

    fn i16_trailing(&mut self) -> Option<i16> {
        if self.data.remaining() < 2 {
            return None;
        }
        Some(self.data.get_i16())
    }
}

/// 7-bit ASCII with trailing NUL padding and spaces removed.
fn ascii(bytes: &[u8]) -> String {
    ascii7(bytes).trim_end_matches(['\0', ' ']).to_string()
}

/// Parse the terminal's event time. Unknown formats yield `None`, never an error.
pub fn parse_time_text(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y%m%d %H%M%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d.%m.%Y %H:%M:%S",
    ];
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn parse_layout(data: &[u8], relay_policy: RelayPolicy) -> Result<FixedLayout, DecodeError> {
    if data.len() < MIN_DATAGRAM_LEN {
        return Err(DecodeError::TooShort {
            min: MIN_DATAGRAM_LEN,
            len: data.len(),
        });
    }
    let mut cur = Cursor::new(data);

    let version = cur.i32("version")?;
    if version != PROTOCOL_VERSION {
        return Err(DecodeError::BadVersion(version));
    }
    let command = cur.i32("command")?;
    let terminal_id = cur.i32("terminal id")?;
    let terminal_serial = cur.ascii(SERIAL_LEN, "terminal serial")?;

    // 0 = channel 1 (relay 1), 1 = channel 2, ...
    let relay_id = cur.u8("relay id")?;
    if relay_id > MAX_RELAY_ID {
        match relay_policy {
            RelayPolicy::Reject => return Err(DecodeError::RelayOutOfRange(relay_id)),
            RelayPolicy::Warn => warn!("Unknown relay id {}", relay_id),
        }
    }
    let _reserved = cur.u8("reserved")?;
    let user_id = cur.i32("user id")?;
    let finger_id = cur.i32("finger id")?;

    Ok(FixedLayout {
        command,
        terminal_id,
        terminal_serial,
        relay_id,
        user_id,
        finger_id,
        event_text: cur.ascii_trailing(TEXT_LEN),
        time_text: cur.ascii_trailing(TEXT_LEN),
        name_code: cur.i16_trailing(),
        personal_id_code: cur.i16_trailing(),
    })
}

fn into_record(layout: FixedLayout, action: Action) -> EventRecord {
    let timestamp = layout.time_text.as_deref().and_then(parse_time_text);
    EventRecord {
        user: Some(layout.user_id.to_string()),
        finger: Some(layout.finger_id.to_string()),
        serial: Some(layout.terminal_serial),
        action: Some(action),
        relay: Some(layout.relay_id.to_string()),
        terminal_id: Some(layout.terminal_id),
        event_text: layout.event_text,
        name_code: layout.name_code,
        personal_id_code: layout.personal_id_code,
        timestamp,
        ..Default::default()
    }
}

fn log_layout(action: &Action, layout: &FixedLayout) {
    debug!(
        "Received info {}, finger: {}, user: {}, serial: {:?}, relay: {}, event: {:?}, time: {:?}, name: {:?}, personal id: {:?}, terminal id: {}",
        action,
        layout.finger_id,
        layout.user_id,
        layout.terminal_serial,
        layout.relay_id,
        layout.event_text,
        layout.time_text,
        layout.name_code,
        layout.personal_id_code,
        layout.terminal_id
    );
}

fn rare_action(command: i32) -> Action {
    match command {
        CMD_OPEN => Action::Open,
        CMD_REJECT => Action::Reject,
        other => {
            warn!("Unknown command 0x{:x}", other);
            Action::Raw(format!("0x{:x}", other))
        }
    }
}

/// Decode a RARE datagram. A relay id outside `0..=4` fails the datagram.
pub fn decode_rare(data: &[u8]) -> DecodeOutcome {
    let layout =
        parse_layout(data, RelayPolicy::Reject).map_err(|e| DecodeFailure::new(e, data))?;
    let action = rare_action(layout.command);
    log_layout(&action, &layout);
    Ok(into_record(layout, action))
}

/// Door action codes (`ActionCode*`).
fn net_door_action(code: i32) -> Option<&'static str> {
    Some(match code {
        0 => "NONE",
        1 => "ENTER",
        2 => "LEAVE",
        3 => "REFUSED",
        4 => "UNRECOGNIZED",
        5 => "ALARM_DEV_ON",
        6 => "ALARM_DEV_OFF",
        15 => "REBOOT",
        _ => return None,
    })
}

/// Relay and day-switching event codes.
pub fn net_event(code: i32) -> Option<&'static str> {
    Some(match code {
        1 => "Switch relay 1 with day switching",
        2 => "Relay 1 permanently on with day switching",
        3 => "Relay 1 permanently off",
        4 => "Relay 2 permanently on with day switching, LED on",
        5 => "Relay 2 permanently off, LED off",
        6 => "Relay 3 permanently on",
        7 => "Relay 4 permanently on",
        8 => "Switch relay 2",
        9 => "Switch relay 3",
        10 => "Switch relay 4",
        15 => "Toggle relay 1",
        16 => "Toggle relay 2",
        17 => "Toggle relay 3",
        18 => "Toggle relay 4",
        19 => "Denied: unknown",
        20 => "Denied: known",
        21 => "Switch local relay 1 with day switching",
        23 => "Local relay 1 permanently on with day switching",
        24 => "Local relay 1 permanently off",
        25 => "Toggle local relay 1",
        54 => "Relay 3 permanently off",
        55 => "Relay 4 permanently off",
        56 => "Relay 1 permanently on with day switching",
        57 => "Relay 2 permanently on with day switching",
        58 => "Relay 3 permanently on with day switching",
        59 => "Relay 4 permanently on with day switching",
        _ => return None,
    })
}

/// Map a NET action code through the known code tables.
///
/// Door actions win over relay events where the tables overlap; the relay
/// reading is still logged as a hint.
pub fn net_action(code: i32) -> Action {
    match code {
        CMD_OPEN => return Action::Open,
        CMD_REJECT => return Action::Reject,
        _ => {}
    }
    let event = net_event(code);
    if let Some(door) = net_door_action(code) {
        if let Some(hint) = event {
            debug!("May be it is {}: {}", code, hint);
        }
        return Action::Door(door);
    }
    match event {
        Some(hint) => Action::Relay(hint),
        None => {
            debug!("Unknown command {}", code);
            Action::Raw(code.to_string())
        }
    }
}

/// Decode a NET datagram. A relay id outside `0..=4` is only logged.
pub fn decode_net(data: &[u8]) -> DecodeOutcome {
    let layout = parse_layout(data, RelayPolicy::Warn).map_err(|e| DecodeFailure::new(e, data))?;
    let action = net_action(layout.command);
    log_layout(&action, &layout);
    Ok(into_record(layout, action))
}
