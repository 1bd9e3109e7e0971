//! Routing of decoded input to the state sink.
//!
//! The dispatcher looks up the protocol bound to a datagram's sender, runs the
//! matching decoder, and publishes one [`StateUpdate`] per populated field.
//! Serial frames are published under the fixed device key `serial`.
//!
//! Unregistered senders are expected (terminals broadcast whether or not they
//! are configured) and are dropped quietly.

use chrono::NaiveDateTime;
use log::{debug, trace, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;

use anyhow::{anyhow, bail, Result};

use crate::config::DeviceConfig;
use crate::event::{DecodeOutcome, EventRecord, Field};
use crate::logutil::{escape_bytes, hex};
use crate::metrics;
use crate::protocol::{self, Protocol};
use crate::serial::SerialFrame;

/// Device key used for everything arriving over the serial link.
pub const SERIAL_DEVICE: &str = "serial";

/// Control messages for the transport tasks.
#[derive(Debug)]
pub enum ControlMessage {
    Shutdown,
}

/// Read-only mapping from terminal address to protocol variant.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    bindings: HashMap<IpAddr, Protocol>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(devices: &[DeviceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for device in devices {
            let ip: IpAddr = device
                .ip
                .trim()
                .parse()
                .map_err(|e| anyhow!("device ip '{}': {}", device.ip, e))?;
            if registry.bindings.insert(ip, device.protocol).is_some() {
                bail!("device {} is configured more than once", ip);
            }
        }
        Ok(registry)
    }

    pub fn bind(&mut self, ip: IpAddr, protocol: Protocol) -> Option<Protocol> {
        self.bindings.insert(ip, protocol)
    }

    pub fn protocol_for(&self, ip: &IpAddr) -> Option<Protocol> {
        self.bindings.get(ip).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One named field update for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateUpdate {
    pub device: String,
    pub field: Field,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl StateUpdate {
    /// State path as `devices.<device>.<field>`.
    pub fn state_id(&self) -> String {
        format!("devices.{}.{}", self.device, self.field)
    }
}

/// Receiver of decoded state updates.
pub trait EventSink {
    fn publish(&self, update: StateUpdate);
}

impl EventSink for mpsc::UnboundedSender<StateUpdate> {
    fn publish(&self, update: StateUpdate) {
        if self.send(update).is_err() {
            debug!("State sink closed; dropping update");
        }
    }
}

/// Device key for a terminal address: `192.168.1.5` becomes `192_168_1_5`.
pub fn device_key(ip: &IpAddr) -> String {
    ip.to_string()
        .chars()
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect()
}

/// Publish every populated field of `record` under `device`.
pub fn publish_record(device: &str, record: &EventRecord, sink: &impl EventSink) {
    for (field, value) in record.fields() {
        sink.publish(StateUpdate {
            device: device.to_string(),
            field,
            value,
            timestamp: record.timestamp,
        });
    }
}

fn describe(protocol: Protocol, data: &[u8]) -> String {
    match protocol {
        Protocol::Home | Protocol::Multi => escape_bytes(data),
        Protocol::Rare => format!("{} bytes", data.len()),
        Protocol::Net | Protocol::Serial => hex(data),
    }
}

/// Stateless router from raw input to state updates.
///
/// Cheap to clone; clones share the registry and may run concurrently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Decode one datagram from `src` and publish its fields.
    ///
    /// Returns `None` when the sender has no usable protocol binding.
    pub fn handle_datagram(
        &self,
        src: SocketAddr,
        data: &[u8],
        sink: &impl EventSink,
    ) -> Option<DecodeOutcome> {
        let ip = src.ip();
        let protocol = match self.registry.protocol_for(&ip) {
            Some(p) => p,
            None => {
                debug!("{} - {}", src, escape_bytes(data));
                metrics::inc_datagrams_dropped();
                return None;
            }
        };
        debug!("{} - {}", src, describe(protocol, data));

        if protocol == Protocol::Serial {
            warn!("unknown communication type for {}: {}", ip, protocol);
            metrics::inc_datagrams_dropped();
            return None;
        }

        let outcome = protocol::decode(protocol, data);
        match &outcome {
            Ok(record) => {
                metrics::inc_datagrams_decoded();
                trace!("{} {} decoded: {:?}", ip, protocol, record);
                publish_record(&device_key(&ip), record, sink);
            }
            Err(failure) => {
                metrics::inc_decode_failures();
                warn!(
                    "{} {} datagram dropped: {}; raw: {}",
                    ip,
                    protocol,
                    failure.reason,
                    describe(protocol, &failure.raw)
                );
            }
        }
        Some(outcome)
    }

    /// Publish a completed serial frame under the `serial` device.
    pub fn handle_serial_frame(&self, frame: &SerialFrame, sink: &impl EventSink) -> EventRecord {
        let record = protocol::serial::decode_frame(frame);
        publish_record(SERIAL_DEVICE, &record, sink);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecSink(Mutex<Vec<StateUpdate>>);

    impl EventSink for VecSink {
        fn publish(&self, update: StateUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = DeviceRegistry::new();
        registry.bind("192.168.1.20".parse().unwrap(), Protocol::Home);
        registry.bind("192.168.1.21".parse().unwrap(), Protocol::Serial);
        Dispatcher::new(registry)
    }

    #[test]
    fn device_key_sanitizes() {
        assert_eq!(device_key(&"192.168.1.5".parse().unwrap()), "192_168_1_5");
        assert_eq!(device_key(&"fe80::1".parse().unwrap()), "fe80__1");
    }

    #[test]
    fn home_datagram_becomes_field_updates() {
        let sink = VecSink::default();
        let src: SocketAddr = "192.168.1.20:51000".parse().unwrap();
        let outcome = dispatcher()
            .handle_datagram(src, b"1;0005;1;801845670767;1;1", &sink)
            .unwrap();
        assert!(outcome.is_ok());

        let updates = sink.0.into_inner().unwrap();
        let ids: Vec<String> = updates.iter().map(|u| u.state_id()).collect();
        assert_eq!(
            ids,
            vec![
                "devices.192_168_1_20.user",
                "devices.192_168_1_20.finger",
                "devices.192_168_1_20.serial",
                "devices.192_168_1_20.action",
                "devices.192_168_1_20.relay",
            ]
        );
        assert_eq!(updates[3].value, "OPEN");
    }

    #[test]
    fn unknown_sender_is_dropped() {
        let sink = VecSink::default();
        let src: SocketAddr = "10.1.1.1:51000".parse().unwrap();
        assert!(dispatcher()
            .handle_datagram(src, b"1;0005;1;801845670767;1;1", &sink)
            .is_none());
        assert!(sink.0.into_inner().unwrap().is_empty());
    }

    #[test]
    fn serial_binding_over_udp_is_dropped() {
        let sink = VecSink::default();
        let src: SocketAddr = "192.168.1.21:51000".parse().unwrap();
        assert!(dispatcher().handle_datagram(src, b"\x02\x03", &sink).is_none());
    }

    #[test]
    fn failure_publishes_nothing() {
        let sink = VecSink::default();
        let src: SocketAddr = "192.168.1.20:51000".parse().unwrap();
        let outcome = dispatcher()
            .handle_datagram(src, b"0;0005;1;801845670767;1;1", &sink)
            .unwrap();
        assert!(outcome.is_err());
        assert!(sink.0.into_inner().unwrap().is_empty());
    }

    #[test]
    fn serial_frames_use_serial_device() {
        let sink = VecSink::default();
        dispatcher().handle_serial_frame(&SerialFrame::Finger(9), &sink);
        let updates = sink.0.into_inner().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].state_id(), "devices.serial.finger");
        assert_eq!(updates[0].value, "9");
    }

    #[test]
    fn registry_rejects_duplicates() {
        let devices = vec![
            DeviceConfig {
                ip: "10.0.0.1".into(),
                protocol: Protocol::Net,
            },
            DeviceConfig {
                ip: "10.0.0.1".into(),
                protocol: Protocol::Rare,
            },
        ];
        assert!(DeviceRegistry::from_config(&devices).is_err());
        assert_eq!(DeviceRegistry::from_config(&devices[..1]).unwrap().len(), 1);
    }
}
