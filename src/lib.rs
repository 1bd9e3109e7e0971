//! # ekey-gateway - Decoder for ekey fingerprint terminals
//!
//! Turns the traffic of ekey biometric access terminals into structured access
//! events. Two transports are supported:
//!
//! - **Serial**: the ekey converter's framed byte stream, reassembled byte by
//!   byte with an idle timeout and byte de-stuffing.
//! - **UDP**: one datagram per event, in one of four protocol variants chosen
//!   per terminal address (HOME, MULTI, RARE, NET).
//!
//! Decoded events are flattened into per-field [`dispatch::StateUpdate`]s
//! keyed `devices.<device>.<field>` and handed to an [`dispatch::EventSink`].
//!
//! ## Quick Start
//!
//! ```rust
//! use ekey_gateway::protocol::{decode, Protocol};
//!
//! let record = decode(Protocol::Home, b"1;0005;2;801845670767;1;1").unwrap();
//! assert_eq!(record.user.as_deref(), Some("0005"));
//! assert_eq!(record.action.map(|a| a.to_string()).as_deref(), Some("OPEN"));
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`] - frame assembler, de-stuffer and the serial port task
//! - [`protocol`] - datagram decoders for the four UDP variants
//! - [`dispatch`] - device registry and routing to the state sink
//! - [`udp`] - datagram listener
//! - [`config`] - TOML configuration and validation
//! - [`event`] - decoded event record and field names
//! - [`error`] - decode and framing errors
//! - [`metrics`] - process-wide counters
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ Serial link  │   │ UDP listener │ ← transports
//! └──────────────┘   └──────────────┘
//!        │                  │
//! ┌──────────────┐   ┌──────────────┐
//! │  Assembler   │   │  Decoders    │ ← framing / parsing
//! └──────────────┘   └──────────────┘
//!        └────────┬─────────┘
//!          ┌──────────────┐
//!          │  Dispatcher  │ ← per-field state updates
//!          └──────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod serial;
pub mod udp;
