//! Acquire-fence waiting.
//!
//! The framework attaches a fence file descriptor to each output buffer;
//! the HAL must not touch the buffer until the fence signals readable.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::{Duration, Instant};

use crate::errors::{HalError, HalResult};

/// A synchronization fd. Signaled when it polls readable.
#[derive(Debug)]
pub struct Fence {
    fd: OwnedFd,
}

impl Fence {
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Blocks until the fence signals or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> HalResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let remaining_ms = remaining.as_millis().min(i32::MAX as u128) as i32;

            let mut pfd = libc::pollfd {
                fd: self.fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let rc = unsafe { libc::poll(&mut pfd, 1, remaining_ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(HalError::io("fence poll", err));
            }
            if rc == 0 {
                return Err(HalError::timeout("acquire fence"));
            }
            if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                return Err(HalError::io(
                    "fence poll",
                    io::Error::new(io::ErrorKind::Other, "fence fd error"),
                ));
            }
            return Ok(());
        }
    }
}

impl From<OwnedFd> for Fence {
    fn from(fd: OwnedFd) -> Self {
        Self::new(fd)
    }
}
