//! Delimited text datagrams (HOME and MULTI converters).
//!
//! Fields are separated by any of `;`, `_` or `?`; converters differ in which
//! character they emit, so all three are accepted.

use crate::error::{DecodeError, DecodeFailure};
use crate::event::{Action, DecodeOutcome, EventRecord, UserStatus};

use super::ascii7;

const HOME_FIELDS: usize = 6;
const MULTI_FIELDS: usize = 10;
const MARKER: &str = "1";

fn split_fields(data: &[u8]) -> Vec<String> {
    let text = ascii7(data);
    text.trim_end_matches(['\0', '\r', '\n'])
        .split([';', '_', '?'])
        .map(str::to_string)
        .collect()
}

fn check_shape(fields: &[String], expected: usize, data: &[u8]) -> Result<(), DecodeFailure> {
    if fields.len() < expected {
        return Err(DecodeFailure::new(
            DecodeError::TooFewFields {
                expected,
                found: fields.len(),
            },
            data,
        ));
    }
    if fields[0] != MARKER {
        return Err(DecodeFailure::new(
            DecodeError::BadMarker(fields[0].clone()),
            data,
        ));
    }
    Ok(())
}

fn home_action(code: &str) -> Action {
    match code {
        "1" => Action::Open,
        "2" => Action::Reject,
        other => Action::Raw(other.to_string()),
    }
}

/// Decode a HOME datagram: `1;user;finger;serial;action;relay`.
pub fn decode_home(data: &[u8]) -> DecodeOutcome {
    let fields = split_fields(data);
    check_shape(&fields, HOME_FIELDS, data)?;

    let mut it = fields.into_iter().skip(1);
    let mut next = || it.next().unwrap_or_default();
    let user = next();
    let finger = next();
    let serial = next();
    let action = home_action(&next());
    let relay = next();

    Ok(EventRecord {
        user: Some(user),
        finger: Some(finger),
        serial: Some(serial),
        action: Some(action),
        relay: Some(relay),
        ..Default::default()
    })
}

/// Decode a MULTI datagram:
/// `1;user;user_name;user_status;finger;key;serial;fs_name;action;input`.
///
/// Action and input codes are passed through verbatim:
///
/// - action: 1 open, 2 unknown finger, 3/4 time zone A/B, 5 inactive,
///   6 "only ALWAYS users", 7 FS not coupled to CP, 8 digital input
/// - input: 1-4 digital input, `-` none
pub fn decode_multi(data: &[u8]) -> DecodeOutcome {
    let fields = split_fields(data);
    check_shape(&fields, MULTI_FIELDS, data)?;

    let mut it = fields.into_iter().skip(1);
    let mut next = || it.next().unwrap_or_default();
    let user = next();
    let user_name = next();
    let user_status = UserStatus::from_code(&next());
    let finger = next();
    let key = next();
    let serial = next();
    let fs_name = next();
    let action = next();
    let input = next();

    Ok(EventRecord {
        user: Some(user),
        user_name: Some(user_name),
        user_status: Some(user_status),
        finger: Some(finger),
        key: Some(key),
        serial: Some(serial),
        fs_name: Some(fs_name),
        action: Some(Action::Raw(action)),
        input: Some(input),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_decodes_with_each_delimiter() {
        for msg in [
            "1;0005;1;801845670767;1;1",
            "1_0005_1_801845670767_1_1",
            "1?0005?1?801845670767?1?1",
        ] {
            let r = decode_home(msg.as_bytes()).unwrap();
            assert_eq!(r.user.as_deref(), Some("0005"));
            assert_eq!(r.finger.as_deref(), Some("1"));
            assert_eq!(r.serial.as_deref(), Some("801845670767"));
            assert_eq!(r.action, Some(Action::Open));
            assert_eq!(r.relay.as_deref(), Some("1"));
        }
    }

    #[test]
    fn home_action_codes() {
        let r = decode_home(b"1;7;2;123;2;3").unwrap();
        assert_eq!(r.action, Some(Action::Reject));
        let r = decode_home(b"1;7;2;123;9;3").unwrap();
        assert_eq!(r.action, Some(Action::Raw("9".into())));
    }

    #[test]
    fn home_extra_fields_are_ignored() {
        let r = decode_home(b"1;7;2;123;1;3;extra").unwrap();
        assert_eq!(r.relay.as_deref(), Some("3"));
    }

    #[test]
    fn home_rejects_short_packet() {
        let err = decode_home(b"1;0005;1;801845670767;1").unwrap_err();
        assert_eq!(
            err.reason,
            DecodeError::TooFewFields {
                expected: 6,
                found: 5
            }
        );
        assert_eq!(err.raw, b"1;0005;1;801845670767;1".to_vec());
    }

    #[test]
    fn home_rejects_wrong_marker() {
        let err = decode_home(b"2;0005;1;801845670767;1;1").unwrap_err();
        assert_eq!(err.reason, DecodeError::BadMarker("2".into()));
    }

    #[test]
    fn home_rejects_empty() {
        assert!(decode_home(b"").is_err());
    }

    #[test]
    fn home_tolerates_trailing_newline() {
        let r = decode_home(b"1;0005;1;801845670767;1;1\r\n").unwrap();
        assert_eq!(r.relay.as_deref(), Some("1"));
    }

    #[test]
    fn multi_decodes_all_fields() {
        let r = decode_multi(b"1;0003;Anna;1;7;-;80131004140149;GATE;1;-").unwrap();
        assert_eq!(r.user.as_deref(), Some("0003"));
        assert_eq!(r.user_name.as_deref(), Some("Anna"));
        assert_eq!(r.user_status, Some(UserStatus::Enabled));
        assert_eq!(r.finger.as_deref(), Some("7"));
        assert_eq!(r.key.as_deref(), Some("-"));
        assert_eq!(r.serial.as_deref(), Some("80131004140149"));
        assert_eq!(r.fs_name.as_deref(), Some("GATE"));
        assert_eq!(r.action, Some(Action::Raw("1".into())));
        assert_eq!(r.input.as_deref(), Some("-"));
    }

    #[test]
    fn multi_status_tristate() {
        let r = decode_multi(b"1_1_Bob_0_2_-_123_FS_5_2").unwrap();
        assert_eq!(r.user_status, Some(UserStatus::Disabled));
        let r = decode_multi(b"1_1_Bob_-_2_-_123_FS_5_2").unwrap();
        assert_eq!(r.user_status, Some(UserStatus::Unknown));
    }

    #[test]
    fn multi_requires_ten_fields() {
        let err = decode_multi(b"1;0003;Anna;1;7;-;80131004140149;GATE;1").unwrap_err();
        assert_eq!(
            err.reason,
            DecodeError::TooFewFields {
                expected: 10,
                found: 9
            }
        );
    }

    #[test]
    fn multi_masks_high_bit_in_text() {
        let r = decode_multi(b"1;0003;J\xe4n;1;7;-;801;GAR;1;-").unwrap();
        assert_eq!(r.user_name.as_deref(), Some("Jdn"));
    }

    #[test]
    fn multi_rejects_wrong_marker() {
        let err = decode_multi(b"0;0003;Anna;1;7;-;801;GATE;1;-").unwrap_err();
        assert_eq!(err.reason, DecodeError::BadMarker("0".into()));
    }
}
