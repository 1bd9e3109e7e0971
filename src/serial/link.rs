//! Tokio task owning the serial converter port.
//!
//! The port is opened with the configured line settings and polled on a short
//! interval; every chunk read is fed to a [`FrameAssembler`] stamped with the
//! time it arrived. The idle timer is polled on its own tick so a stalled
//! partial frame is dropped even when the line goes quiet.

use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use serialport::{SerialPort, SerialPortType};
use std::io::{ErrorKind, Read};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::config::{FlowControl, Parity, SerialConfig};
use crate::dispatch::{ControlMessage, Dispatcher, EventSink};
use crate::logutil::hex_snippet;

use super::assembler::FrameAssembler;

/// How long a blocking read may wait for the first byte.
const READ_TIMEOUT: Duration = Duration::from_millis(20);
/// Read poll period.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Idle timer resolution.
const TIMER_TICK: Duration = Duration::from_millis(100);

fn data_bits(bits: u8) -> Result<serialport::DataBits> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(anyhow!("unsupported data bits: {}", other)),
    }
}

fn stop_bits(bits: u8) -> Result<serialport::StopBits> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(anyhow!("unsupported stop bits: {}", other)),
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Rtscts => serialport::FlowControl::Hardware,
        FlowControl::Xon | FlowControl::Xoff | FlowControl::Xany => {
            serialport::FlowControl::Software
        }
    }
}

/// Serial ports visible to this host, one description line each.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| anyhow!("Failed to enumerate serial ports: {}", e))?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => format!(
                "{} (usb {:04x}:{:04x}{}{})",
                p.port_name,
                usb.vid,
                usb.pid,
                usb.manufacturer
                    .map(|m| format!(" {}", m))
                    .unwrap_or_default(),
                usb.product.map(|m| format!(" {}", m)).unwrap_or_default(),
            ),
            SerialPortType::PciPort => format!("{} (pci)", p.port_name),
            SerialPortType::BluetoothPort => format!("{} (bluetooth)", p.port_name),
            SerialPortType::Unknown => p.port_name,
        })
        .collect())
}

/// An open converter link and its frame assembler.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    port_name: String,
    assembler: FrameAssembler,
}

impl SerialLink {
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!(
            "Opening serial port {} at {} baud, {} data bits, parity {:?}, {} stop bits, flow {:?}",
            config.port,
            config.baud_rate,
            config.data_bits,
            config.parity,
            config.stop_bits,
            config.flow_control
        );

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .stop_bits(stop_bits(config.stop_bits)?)
            .parity(parity(config.parity))
            .flow_control(flow_control(config.flow_control))
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| anyhow!("Failed to open serial port {}: {}", config.port, e))?;

        info!("Serial port {} opened", config.port);
        Ok(Self {
            port,
            port_name: config.port.clone(),
            assembler: FrameAssembler::new(config.idle_timeout()),
        })
    }

    /// Read until shutdown, publishing every completed frame.
    pub async fn run(
        mut self,
        dispatcher: Dispatcher,
        sink: impl EventSink,
        mut control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    ) -> Result<()> {
        info!("Starting serial reader on {}", self.port_name);

        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut timer = tokio::time::interval(TIMER_TICK);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                control_msg = control_rx.recv() => {
                    match control_msg {
                        Some(ControlMessage::Shutdown) => {
                            info!("Serial reader received shutdown signal");
                            break;
                        }
                        None => {
                            warn!("Control channel closed, shutting down serial reader");
                            break;
                        }
                    }
                }

                _ = timer.tick() => {
                    self.assembler.poll_timeout(Instant::now());
                }

                _ = interval.tick() => {
                    if let Err(e) = self.read_and_process(&dispatcher, &sink) {
                        if e.kind() == ErrorKind::Interrupted {
                            debug!("Serial read interrupted, likely shutdown in progress");
                            break;
                        }
                        error!("Serial read error on {}: {} - continuing", self.port_name, e);
                        sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }

        self.assembler.shutdown();
        info!("Serial reader on {} shutting down", self.port_name);
        Ok(())
    }

    fn read_and_process(
        &mut self,
        dispatcher: &Dispatcher,
        sink: &impl EventSink,
    ) -> std::io::Result<()> {
        let mut buffer = [0u8; 256];
        match self.port.read(&mut buffer) {
            Ok(0) => Ok(()),
            Ok(n) => {
                let chunk = &buffer[..n];
                trace!("RAW {} bytes: {}", n, hex_snippet(chunk, 64));
                for frame in self.assembler.push(chunk, Instant::now()) {
                    dispatcher.handle_serial_frame(&frame, sink);
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_settings_map() {
        assert!(matches!(data_bits(7), Ok(serialport::DataBits::Seven)));
        assert!(data_bits(9).is_err());
        assert!(matches!(stop_bits(2), Ok(serialport::StopBits::Two)));
        assert_eq!(parity(Parity::Even), serialport::Parity::Even);
        assert_eq!(
            flow_control(FlowControl::Rtscts),
            serialport::FlowControl::Hardware
        );
        assert_eq!(
            flow_control(FlowControl::Xany),
            serialport::FlowControl::Software
        );
    }
}
