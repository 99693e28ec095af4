//! One send-only datagram endpoint per configured peer.

use crate::config::{PeerConfig, PeerTransportConfig};
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::net::UnixDatagram;
use swkvm_wire::{Envelope, Frame};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve peer address {0}: {1}")]
    Resolve(String, std::io::Error),
    #[error("failed to open network socket: {0}")]
    NetworkSocket(std::io::Error),
    #[error("failed to open unix datagram socket: {0}")]
    UnixSocket(std::io::Error),
}

enum Sink {
    Network(UdpSocket, SocketAddr),
    Unix(UnixDatagram, std::path::PathBuf),
}

/// Owns the destination for one peer and, if encryption is enabled, the
/// envelope used to seal every outgoing frame.
pub struct PeerTransport {
    sink: Sink,
    pub postswitch_command: Option<String>,
}

impl PeerTransport {
    pub fn open(config: &PeerConfig) -> Result<Self, TransportError> {
        let sink = match &config.transport {
            PeerTransportConfig::Network { address, port } => {
                let addr: SocketAddr = format!("{address}:{port}")
                    .parse()
                    .map_err(|_| TransportError::Resolve(address.clone(), std::io::Error::from(std::io::ErrorKind::InvalidInput)))?;
                let socket = UdpSocket::bind("0.0.0.0:0").map_err(TransportError::NetworkSocket)?;
                Sink::Network(socket, addr)
            }
            PeerTransportConfig::Unix { path } => {
                let socket = UnixDatagram::unbound().map_err(TransportError::UnixSocket)?;
                Sink::Unix(socket, std::path::PathBuf::from(path))
            }
        };

        Ok(PeerTransport {
            sink,
            postswitch_command: config.postswitch_command.clone(),
        })
    }

    /// Send one frame, optionally sealed in an AEAD envelope. Failures are
    /// logged and dropped — no retry, per the controller's best-effort policy.
    pub fn send(&self, frame: &Frame, envelope: Option<&Envelope>) {
        let plaintext = frame.encode();
        let payload = match envelope {
            Some(env) => env.seal(&plaintext),
            None => plaintext.to_vec(),
        };

        let result = match &self.sink {
            Sink::Network(socket, addr) => socket.send_to(&payload, addr).map(|_| ()),
            Sink::Unix(socket, path) => socket.send_to(&payload, path).map(|_| ()),
        };

        if let Err(e) = result {
            warn!("failed to send frame to peer: {e}");
        }
    }
}
