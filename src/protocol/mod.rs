//! # Packet Decoders
//!
//! One pure decoder per wire protocol variant. The caller picks the decoder
//! from the sender's configured [`Protocol`]; decoders never sniff the format
//! themselves.
//!
//! | Variant | Transport | Format |
//! |---------|-----------|--------|
//! | `HOME`  | UDP       | text, `[;_?]` separated, 6 fields |
//! | `MULTI` | UDP       | text, `[;_?]` separated, 10 fields |
//! | `RARE`  | UDP       | fixed binary layout, OPEN/REJECT commands |
//! | `NET`   | UDP       | fixed binary layout, NET action code table |
//! | `SERIAL`| serial    | framed, see [`crate::serial`] |
//!
//! ```rust
//! use ekey_gateway::protocol::{decode, Protocol};
//!
//! let record = decode(Protocol::Home, b"1;0005;1;801845670767;1;1").unwrap();
//! assert_eq!(record.user.as_deref(), Some("0005"));
//! assert_eq!(record.action.unwrap().as_str(), "OPEN");
//! ```

pub mod binary;
pub mod serial;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DecodeError, DecodeFailure};
use crate::event::DecodeOutcome;

/// Message format a terminal emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HOME", alias = "home")]
    Home,
    #[serde(rename = "MULTI", alias = "multi")]
    Multi,
    #[serde(rename = "RARE", alias = "rare")]
    Rare,
    #[serde(rename = "NET", alias = "net")]
    Net,
    #[serde(rename = "SERIAL", alias = "serial")]
    Serial,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Home => "HOME",
            Protocol::Multi => "MULTI",
            Protocol::Rare => "RARE",
            Protocol::Net => "NET",
            Protocol::Serial => "SERIAL",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOME" => Ok(Protocol::Home),
            "MULTI" => Ok(Protocol::Multi),
            "RARE" => Ok(Protocol::Rare),
            "NET" => Ok(Protocol::Net),
            "SERIAL" => Ok(Protocol::Serial),
            other => Err(anyhow::anyhow!("unknown protocol '{}'", other)),
        }
    }
}

/// Bytes as 7-bit ASCII; the high bit of every byte is dropped.
pub(crate) fn ascii7(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| (b & 0x7F) as char).collect()
}

/// Decode one complete datagram with the decoder for `protocol`.
///
/// `SERIAL` has no datagram form; serial frames go through
/// [`serial::decode_frame`] instead.
pub fn decode(protocol: Protocol, data: &[u8]) -> DecodeOutcome {
    match protocol {
        Protocol::Home => text::decode_home(data),
        Protocol::Multi => text::decode_multi(data),
        Protocol::Rare => binary::decode_rare(data),
        Protocol::Net => binary::decode_net(data),
        Protocol::Serial => Err(DecodeFailure::new(
            DecodeError::UnsupportedProtocol(protocol.as_str()),
            data,
        )),
    }
}
