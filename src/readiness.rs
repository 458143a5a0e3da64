//! Waiting for pending connects to become writable.

use std::collections::HashSet;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::trace;

use crate::error::{ProbeError, Result};

/// Readiness-multiplexing primitive over pending connection sockets.
pub trait Readiness {
    /// Block until at least one of `fds` is writable or `timeout` expires
    /// (`None` waits forever) and return the ready descriptors. An empty
    /// `fds` simply sleeps for `timeout`.
    fn wait(&mut self, fds: &[RawFd], timeout: Option<Duration>) -> Result<HashSet<RawFd>>;
}

/// `poll(2)` based readiness.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollReadiness;

impl Readiness for PollReadiness {
    fn wait(&mut self, fds: &[RawFd], timeout: Option<Duration>) -> Result<HashSet<RawFd>> {
        let mut pollfds: Vec<libc::pollfd> = fds
            .iter()
            .map(|&fd| libc::pollfd {
                fd,
                events: libc::POLLOUT,
                revents: 0,
            })
            .collect();

        let rc = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                poll_timeout(timeout),
            )
        };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("poll interrupted");
                return Ok(HashSet::new());
            }
            return Err(ProbeError::Poll(err));
        }

        let ready_mask = libc::POLLOUT | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
        Ok(pollfds
            .iter()
            .filter(|p| p.revents & ready_mask != 0)
            .map(|p| p.fd)
            .collect())
    }
}

/// Milliseconds for `poll`, rounding partial milliseconds up so a short
/// remaining wait never degenerates into a busy loop.
fn poll_timeout(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_micros().div_ceil(1000);
            libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
        }
    }
}
