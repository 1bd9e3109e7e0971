//! Decoded access events and the per-field view handed to state sinks.
//!
//! An [`EventRecord`] is produced once per successfully decoded frame or
//! datagram. Which fields are populated depends on the protocol variant; the
//! sink only ever sees the populated ones through [`EventRecord::fields`].

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::error::DecodeFailure;
use crate::logutil::hex;

/// Result of running one decoder over one datagram.
pub type DecodeOutcome = Result<EventRecord, DecodeFailure>;

/// Symbolic action reported by a terminal.
///
/// The mapping from wire codes differs per protocol variant, so the variants
/// here are the union of what the decoders can produce rather than a single
/// shared code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Action {
    Open,
    Reject,
    /// Door action from the NET code table (`ActionCode*`).
    Door(&'static str),
    /// Relay / day-switching event from the NET code table.
    Relay(&'static str),
    /// Code the decoder does not interpret, reported verbatim.
    Raw(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Open => "OPEN",
            Action::Reject => "REJECT",
            Action::Door(name) | Action::Relay(name) => name,
            Action::Raw(code) => code,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// Enabled state of a user as reported by MULTI terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Enabled,
    Disabled,
    Unknown,
}

impl UserStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" => UserStatus::Enabled,
            "0" => UserStatus::Disabled,
            _ => UserStatus::Unknown,
        }
    }

    /// Wire code published to the state sink.
    pub fn code(self) -> &'static str {
        match self {
            UserStatus::Enabled => "1",
            UserStatus::Disabled => "0",
            UserStatus::Unknown => "-1",
        }
    }
}

/// Stable field names understood by state sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "finger")]
    Finger,
    #[serde(rename = "serial")]
    Serial,
    #[serde(rename = "action")]
    Action,
    #[serde(rename = "relay")]
    Relay,
    #[serde(rename = "user_name")]
    UserName,
    #[serde(rename = "user_status")]
    UserStatus,
    #[serde(rename = "key")]
    Key,
    #[serde(rename = "fs_name")]
    FsName,
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "rawData")]
    RawData,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::User => "user",
            Field::Finger => "finger",
            Field::Serial => "serial",
            Field::Action => "action",
            Field::Relay => "relay",
            Field::UserName => "user_name",
            Field::UserStatus => "user_status",
            Field::Key => "key",
            Field::FsName => "fs_name",
            Field::Input => "input",
            Field::RawData => "rawData",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded access event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_code: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_id_code: Option<i16>,
    /// Event time reported by the terminal, if it sent one we could parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<u8>>,
}

impl EventRecord {
    /// Populated fields as `(name, value)` pairs, in a stable order.
    ///
    /// Diagnostic-only fields (terminal id, event text, name codes) are not
    /// published; they stay available on the record itself.
    pub fn fields(&self) -> Vec<(Field, String)> {
        let mut out = Vec::with_capacity(8);
        let mut push = |field: Field, value: Option<String>| {
            if let Some(v) = value {
                out.push((field, v));
            }
        };
        push(Field::User, self.user.clone());
        push(Field::UserName, self.user_name.clone());
        push(
            Field::UserStatus,
            self.user_status.map(|s| s.code().to_string()),
        );
        push(Field::Finger, self.finger.clone());
        push(Field::Key, self.key.clone());
        push(Field::Serial, self.serial.clone());
        push(Field::FsName, self.fs_name.clone());
        push(Field::Action, self.action.as_ref().map(|a| a.to_string()));
        push(Field::Relay, self.relay.clone());
        push(Field::Input, self.input.clone());
        push(Field::RawData, self.raw_data.as_deref().map(hex));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_skip_absent_values() {
        let record = EventRecord {
            finger: Some("7".into()),
            ..Default::default()
        };
        assert_eq!(record.fields(), vec![(Field::Finger, "7".to_string())]);
    }

    #[test]
    fn raw_data_is_published_as_hex() {
        let record = EventRecord {
            raw_data: Some(vec![0x02, 0xab, 0x03]),
            ..Default::default()
        };
        assert_eq!(record.fields(), vec![(Field::RawData, "02ab03".to_string())]);
    }

    #[test]
    fn user_status_codes() {
        assert_eq!(UserStatus::from_code("1"), UserStatus::Enabled);
        assert_eq!(UserStatus::from_code("0"), UserStatus::Disabled);
        assert_eq!(UserStatus::from_code("-"), UserStatus::Unknown);
        assert_eq!(UserStatus::Unknown.code(), "-1");
    }

    #[test]
    fn action_serializes_as_symbol() {
        let json = serde_json::to_string(&Action::Open).unwrap();
        assert_eq!(json, "\"OPEN\"");
        assert_eq!(Action::Raw("0x90".into()).to_string(), "0x90");
    }
}
