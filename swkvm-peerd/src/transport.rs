//! Bound datagram listener that decodes incoming wire frames, optionally
//! opening an AEAD envelope first.

use crate::config::ListenConfig;
use std::net::UdpSocket;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::time::Duration;
use swkvm_wire::{Envelope, Frame, FrameError, CryptoError, TAG_OVERHEAD, FRAME_LEN};
use thiserror::Error;
use tracing::warn;

/// How long `recv` blocks before returning `RecvError::TimedOut`, giving the
/// caller a chance to check a shutdown flag. Mirrors
/// `swkvm_device::SHUTDOWN_POLL_INTERVAL`.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("failed to open network socket: {0}")]
    NetworkSocket(std::io::Error),
    #[error("failed to open unix socket at {path}: {source}")]
    UnixSocket { path: String, source: std::io::Error },
    #[error("failed to set permissions on {path}: {source}")]
    Permissions { path: String, source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum RecvError {
    #[error("recv failed: {0}")]
    Io(std::io::Error),
    #[error("received {got} bytes, expected {expected}")]
    WrongLength { got: usize, expected: usize },
    #[error("timed out waiting for a datagram")]
    TimedOut,
    #[error("decryption failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
}

enum Source {
    Network(UdpSocket),
    Unix(UnixDatagram, PathBuf),
}

/// A bound, receive-only endpoint that decodes one frame per `recv`.
pub struct FrameListener {
    source: Source,
    envelope: Option<Envelope>,
}

impl FrameListener {
    pub fn bind(config: &ListenConfig, envelope: Option<Envelope>) -> Result<Self, ListenError> {
        let source = match config {
            ListenConfig::Network { address, port } => {
                let socket = UdpSocket::bind(format!("{address}:{port}")).map_err(ListenError::NetworkSocket)?;
                socket
                    .set_read_timeout(Some(SHUTDOWN_POLL_INTERVAL))
                    .map_err(ListenError::NetworkSocket)?;
                Source::Network(socket)
            }
            ListenConfig::Unix { path, mode, owner, group } => {
                let _ = std::fs::remove_file(path);
                let socket = UnixDatagram::bind(path).map_err(|source| ListenError::UnixSocket {
                    path: path.clone(),
                    source,
                })?;
                if let Some(mode) = mode {
                    std::fs::set_permissions(path, std::fs::Permissions::from_mode(*mode)).map_err(|source| {
                        ListenError::Permissions {
                            path: path.clone(),
                            source,
                        }
                    })?;
                }
                if owner.is_some() || group.is_some() {
                    // chown requires CAP_CHOWN when not already owner; failures here
                    // are surfaced as a permissions error rather than silently ignored.
                    chown_path(path, *owner, *group).map_err(|source| ListenError::Permissions {
                        path: path.clone(),
                        source,
                    })?;
                }
                socket
                    .set_read_timeout(Some(SHUTDOWN_POLL_INTERVAL))
                    .map_err(|source| ListenError::UnixSocket {
                        path: path.clone(),
                        source,
                    })?;
                Source::Unix(socket, PathBuf::from(path))
            }
        };

        Ok(FrameListener { source, envelope })
    }

    /// Block for the next datagram and decode it into a `Frame`. Validates
    /// length and, when encryption is enabled, authenticates and decrypts
    /// before decoding — matching the controlled daemon's accept window of
    /// the current, previous, and next time bucket.
    pub fn recv(&self) -> Result<Frame, RecvError> {
        let mut buf = [0u8; FRAME_LEN + TAG_OVERHEAD];
        let read = match &self.source {
            Source::Network(socket) => socket.recv(&mut buf),
            Source::Unix(socket, _) => socket.recv(&mut buf),
        };
        let len = read.map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => RecvError::TimedOut,
            _ => RecvError::Io(e),
        })?;

        let plaintext = match &self.envelope {
            Some(envelope) => envelope.open(&buf[..len])?,
            None => {
                if len != FRAME_LEN {
                    return Err(RecvError::WrongLength {
                        got: len,
                        expected: FRAME_LEN,
                    });
                }
                buf[..len].to_vec()
            }
        };

        Ok(Frame::decode(&plaintext)?)
    }

    /// Unlink the bound Unix socket path on shutdown. A no-op for network
    /// listeners, matching `controlled.c`'s `close_socket`, which only
    /// unlinks under `LISTEN_UNIX`.
    pub fn close(&self) {
        if let Source::Unix(_, path) = &self.source {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("failed to unlink unix socket {}: {e}", path.display());
            }
        }
    }
}

fn chown_path(path: &str, owner: Option<u32>, group: Option<u32>) -> std::io::Result<()> {
    use nix::unistd::{Gid, Uid};
    nix::unistd::chown(path, owner.map(Uid::from_raw), group.map(Gid::from_raw))
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swkvm_wire::Frame;

    fn addr_listener(port: u16) -> FrameListener {
        FrameListener::bind(
            &ListenConfig::Network {
                address: "127.0.0.1".to_string(),
                port,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn decodes_a_plaintext_frame() {
        let listener = addr_listener(50201);
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let frame = Frame {
            device_id: 1,
            event_type: 1,
            event_code: 30,
            event_value: 1,
        };
        sender.send_to(&frame.encode(), "127.0.0.1:50201").unwrap();

        let received = listener.recv().unwrap();
        assert_eq!(received, frame);
    }

    #[test]
    fn rejects_wrong_length_datagram() {
        let listener = addr_listener(50202);
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0u8; 4], "127.0.0.1:50202").unwrap();

        assert!(matches!(listener.recv(), Err(RecvError::WrongLength { .. })));
    }

    #[test]
    fn decrypts_an_encrypted_frame() {
        let key = [7u8; swkvm_wire::KEY_LEN];
        let context = *b"!INMPX!\0";
        let sender_envelope = Envelope::new(&key, context, 1).unwrap();
        let listener_envelope = Envelope::new(&key, context, 1).unwrap();
        let listener = FrameListener::bind(
            &ListenConfig::Network {
                address: "127.0.0.1".to_string(),
                port: 50203,
            },
            Some(listener_envelope),
        )
        .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let frame = Frame {
            device_id: 2,
            event_type: 1,
            event_code: 31,
            event_value: 0,
        };
        sender
            .send_to(&sender_envelope.seal(&frame.encode()), "127.0.0.1:50203")
            .unwrap();

        let received = listener.recv().unwrap();
        assert_eq!(received, frame);
    }

    #[test]
    fn close_unlinks_the_unix_socket_path() {
        let path = std::env::temp_dir().join(format!("swkvm-peerd-test-{}.socket", std::process::id()));
        let listener = FrameListener::bind(
            &ListenConfig::Unix {
                path: path.to_string_lossy().into_owned(),
                mode: None,
                owner: None,
                group: None,
            },
            None,
        )
        .unwrap();
        assert!(path.exists());

        listener.close();
        assert!(!path.exists());
    }

    #[test]
    fn close_on_a_network_listener_is_a_no_op() {
        let listener = addr_listener(50204);
        listener.close();
    }
}
