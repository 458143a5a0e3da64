//! Finalizes pending connection attempts: timed out, succeeded, or failed.

use std::collections::HashSet;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::target::TargetList;

/// What a collector pass finalized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Collected {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl Collected {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }
}

impl std::ops::AddAssign for Collected {
    fn add_assign(&mut self, rhs: Self) {
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
        self.timed_out += rhs.timed_out;
    }
}

/// Walk every pending attempt and finalize the ones that are done.
///
/// An attempt whose age has reached `timeout` is recorded as a failure even
/// if its socket was also reported ready. Otherwise a socket in `ready` has
/// its pending error read to decide success or failure. Anything else stays
/// pending. Failing to read the pending error aborts the pass.
pub fn collect(
    targets: &mut TargetList,
    ready: &HashSet<RawFd>,
    now: Duration,
    timeout: Option<Duration>,
) -> Result<Collected> {
    let mut done = Collected::default();

    for target in targets.iter_mut() {
        let (host, port) = (target.host().to_owned(), target.port().to_owned());
        for ep in target.endpoints.iter_mut() {
            let Some(attempt) = ep.attempt() else {
                continue;
            };
            let elapsed = now.saturating_sub(attempt.started());

            if timeout.is_some_and(|t| elapsed >= t) {
                debug!(%host, %port, addr = %ep.addr(), ?elapsed, "connect timed out");
                ep.record_failure(elapsed);
                done.timed_out += 1;
                continue;
            }

            if !ready.contains(&attempt.fd()) {
                continue;
            }

            let status = attempt.socket().take_error().map_err(ProbeError::SocketStatus)?;
            match status {
                None => {
                    debug!(%host, %port, addr = %ep.addr(), ?elapsed, "connect succeeded");
                    ep.record_success(elapsed);
                    done.succeeded += 1;
                }
                Some(err) => {
                    debug!(
                        %host, %port, addr = %ep.addr(), ?elapsed, error = %err,
                        "connect failed"
                    );
                    ep.record_failure(elapsed);
                    done.failed += 1;
                }
            }
        }
    }

    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Attempt, Endpoint, Target};
    use socket2::{Domain, SockAddr, Socket, Type};
    use std::net::{SocketAddr, TcpListener};
    use std::os::fd::FromRawFd;

    fn connected_attempt(addr: SocketAddr, started: Duration) -> Attempt {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None).unwrap();
        socket.connect(&SockAddr::from(addr)).unwrap();
        Attempt::new(socket, started)
    }

    fn single(addr: SocketAddr, started: Duration) -> TargetList {
        let mut ep = Endpoint::new(addr);
        ep.begin(connected_attempt(addr, started));
        let mut list = TargetList::new();
        list.push(Target::new("localhost", addr.port().to_string(), vec![ep]));
        list
    }

    #[test]
    fn ready_socket_without_error_is_a_success() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut list = single(addr, Duration::from_millis(10));
        let ready = list.pending_fds().into_iter().collect();

        let now = Duration::from_millis(13);
        let done = collect(&mut list, &ready, now, Some(Duration::from_secs(2))).unwrap();

        assert_eq!(done, Collected { succeeded: 1, failed: 0, timed_out: 0 });
        let ep = list.endpoints().next().unwrap();
        assert_eq!(ep.samples(), &[3000]);
        assert_eq!(ep.successes(), 1);
        assert_eq!(ep.attempts(), 1);
        assert!(!ep.is_pending());
    }

    #[test]
    fn not_ready_socket_stays_pending() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = single(listener.local_addr().unwrap(), Duration::ZERO);

        let now = Duration::from_millis(5);
        let done = collect(&mut list, &HashSet::new(), now, Some(Duration::from_secs(2))).unwrap();

        assert_eq!(done.total(), 0);
        assert!(list.endpoints().next().unwrap().is_pending());
    }

    #[test]
    fn timeout_wins_over_readiness() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = single(listener.local_addr().unwrap(), Duration::ZERO);
        let ready = list.pending_fds().into_iter().collect();

        let limit = Duration::from_millis(100);
        let done = collect(&mut list, &ready, limit, Some(limit)).unwrap();

        assert_eq!(done.timed_out, 1);
        let ep = list.endpoints().next().unwrap();
        assert_eq!(ep.samples(), &[-100_000]);
        assert_eq!(ep.successes(), 0);
        assert_eq!(ep.attempts(), 1);
        assert!(list.pending_fds().is_empty());
    }

    #[test]
    fn zero_timeout_never_expires() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = single(listener.local_addr().unwrap(), Duration::ZERO);

        let done = collect(&mut list, &HashSet::new(), Duration::from_secs(3600), None).unwrap();

        assert_eq!(done.total(), 0);
        assert_eq!(list.pending_fds().len(), 1);
    }

    #[test]
    fn unreadable_socket_status_aborts_the_pass() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SO_ERROR on a pipe fails with ENOTSOCK.
        let not_a_socket = unsafe { Socket::from_raw_fd(fds[0]) };

        let mut ep = Endpoint::new(addr);
        ep.begin(Attempt::new(not_a_socket, Duration::ZERO));
        let mut list = TargetList::new();
        list.push(Target::new("localhost", addr.port().to_string(), vec![ep]));
        let ready = list.pending_fds().into_iter().collect();

        let err = collect(&mut list, &ready, Duration::from_millis(1), None).unwrap_err();

        match err {
            ProbeError::SocketStatus(e) => assert_eq!(e.raw_os_error(), Some(libc::ENOTSOCK)),
            other => panic!("unexpected error: {other}"),
        }
        assert!(list.endpoints().next().unwrap().samples().is_empty());
        unsafe { libc::close(fds[1]) };
    }
}
