//! Exclusive acquisition of a physical input device and an interruptible
//! blocking read loop.
//!
//! The device fd is switched to non-blocking and paired with an epoll
//! instance so a reader thread can wake periodically to check a shutdown
//! flag instead of being torn down with a hard kill signal.

use evdev::{Device, InputEvent};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// How often a blocked reader wakes to notice the shutdown flag.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to grab device {path} exclusively: {source}")]
    Grab {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to set device {path} non-blocking: {source}")]
    NonBlocking {
        path: String,
        #[source]
        source: nix::Error,
    },
    #[error("failed to set up epoll for device {path}: {source}")]
    Epoll {
        path: String,
        #[source]
        source: nix::Error,
    },
    #[error("error reading events from device {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A physical input device, grabbed exclusively, with a non-blocking fd
/// and an epoll instance used to make reads interruptible.
pub struct PhysicalDevice {
    path: String,
    device: Device,
    epoll: Epoll,
}

impl PhysicalDevice {
    /// Open `path`, grab it exclusively, and arm it for interruptible reads.
    pub fn open_exclusive(path: &str) -> Result<Self, DeviceError> {
        let mut device = Device::open(path).map_err(|source| DeviceError::Open {
            path: path.to_string(),
            source,
        })?;

        device.grab().map_err(|source| DeviceError::Grab {
            path: path.to_string(),
            source,
        })?;

        set_nonblocking(device.as_raw_fd()).map_err(|source| DeviceError::NonBlocking {
            path: path.to_string(),
            source,
        })?;

        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(|source| DeviceError::Epoll {
            path: path.to_string(),
            source,
        })?;
        let event = EpollEvent::new(EpollFlags::EPOLLIN, 0);
        epoll
            .add(unsafe { BorrowedFd::borrow_raw(device.as_raw_fd()) }, event)
            .map_err(|source| DeviceError::Epoll {
                path: path.to_string(),
                source,
            })?;

        Ok(PhysicalDevice {
            path: path.to_string(),
            device,
            epoll,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Block until at least one batch of events is available or `shutdown`
    /// is set. Returns `None` once shutdown is observed.
    pub fn next_batch(&mut self, shutdown: &AtomicBool) -> Result<Option<Vec<InputEvent>>, DeviceError> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }

            match self.device.fetch_events() {
                Ok(events) => return Ok(Some(events.collect())),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    let mut epoll_events = [EpollEvent::empty(); 1];
                    let timeout_ms = SHUTDOWN_POLL_INTERVAL.as_millis().min(u16::MAX as u128) as u16;
                    let _ = self.epoll.wait(&mut epoll_events, timeout_ms);
                    continue;
                }
                Err(e) => {
                    return Err(DeviceError::Read {
                        path: self.path.clone(),
                        source: e,
                    })
                }
            }
        }
    }
}

fn set_nonblocking(raw_fd: std::os::fd::RawFd) -> Result<(), nix::Error> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let current = OFlag::from_bits_truncate(fcntl(raw_fd, FcntlArg::F_GETFL)?);
    fcntl(raw_fd, FcntlArg::F_SETFL(current | OFlag::O_NONBLOCK))?;
    Ok(())
}
