//! UDP listener for network terminals.
//!
//! Every datagram is handed to the [`Dispatcher`] with its source address.
//! Datagrams are independent; the listener keeps no per-sender state.

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::UdpConfig;
use crate::dispatch::{ControlMessage, Dispatcher, EventSink};

/// Largest datagram accepted; anything longer is truncated by the socket.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

pub struct UdpListener {
    socket: UdpSocket,
}

impl UdpListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| anyhow!("Failed to bind UDP socket {}: {}", addr, e))?;
        Ok(Self { socket })
    }

    pub async fn from_config(config: &UdpConfig) -> Result<Self> {
        let ip: IpAddr = config
            .bind_address
            .parse()
            .map_err(|e| anyhow!("udp bind address {}: {}", config.bind_address, e))?;
        Self::bind(SocketAddr::new(ip, config.port)).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until shutdown, dispatching each datagram as it arrives.
    pub async fn run(
        self,
        dispatcher: Dispatcher,
        sink: impl EventSink,
        mut control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    ) -> Result<()> {
        let local = self.local_addr()?;
        info!("UDP listener on {}", local);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                control_msg = control_rx.recv() => {
                    match control_msg {
                        Some(ControlMessage::Shutdown) => {
                            info!("UDP listener received shutdown signal");
                            break;
                        }
                        None => {
                            warn!("Control channel closed, shutting down UDP listener");
                            break;
                        }
                    }
                }

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, src)) => {
                            dispatcher.handle_datagram(src, &buf[..len], &sink);
                        }
                        Err(e) => {
                            error!("UDP receive error on {}: {} - continuing", local, e);
                        }
                    }
                }
            }
        }

        info!("UDP listener on {} shutting down", local);
        Ok(())
    }
}
