//! Records for completed serial frames.

use crate::event::EventRecord;
use crate::serial::SerialFrame;

/// Turn a completed, de-stuffed frame into a record.
///
/// Finger identification messages carry only the finger hash; every other
/// frame is passed on as raw data for the host to interpret.
pub fn decode_frame(frame: &SerialFrame) -> EventRecord {
    match frame {
        SerialFrame::Finger(hash) => EventRecord {
            finger: Some(hash.to_string()),
            ..Default::default()
        },
        SerialFrame::Raw(bytes) => EventRecord {
            raw_data: Some(bytes.clone()),
            ..Default::default()
        },
    }
}
