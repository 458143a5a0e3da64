use std::io;
use std::time::Duration;

use socket2::{SockAddr, Socket};
use tracing::{trace, warn};

use crate::clock::Clock;
use crate::collector::{self, Collected};
use crate::error::Result;
use crate::readiness::Readiness;
use crate::target::{Attempt, Endpoint, TargetList};

/// Issues one paced, non-blocking connect per endpoint per round.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

/// Outcome of issuing one round of attempts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Issued {
    pub started: usize,
    pub skipped: usize,
    /// Attempts that completed while the scheduler was pacing itself.
    pub collected: Collected,
}

impl Scheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self::with_interval(Duration::from_millis(interval_ms))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Start an attempt for every endpoint of every target, in order.
    ///
    /// Before each attempt the scheduler waits out the pacing interval on
    /// the readiness primitive, finalizing whatever completes meanwhile so
    /// those samples are not inflated by the wait.
    pub fn issue_round<C: Clock, R: Readiness>(
        &self,
        targets: &mut TargetList,
        clock: &C,
        readiness: &mut R,
        timeout: Option<Duration>,
    ) -> Result<Issued> {
        let mut issued = Issued::default();

        for ti in 0..targets.len() {
            let count = targets.get(ti).map_or(0, |t| t.endpoints().len());
            for ei in 0..count {
                issued.collected += self.pace(targets, clock, readiness, timeout)?;

                let Some(target) = targets.get_mut(ti) else {
                    continue;
                };
                let (host, port) = (target.host().to_owned(), target.port().to_owned());
                let ep = &mut target.endpoints[ei];

                match open(ep) {
                    Ok(socket) => {
                        let started = clock.now();
                        trace!(%host, %port, addr = %ep.addr(), ?started, "connect issued");
                        ep.begin(Attempt::new(socket, started));
                        issued.started += 1;
                    }
                    Err(SetupError::Unsupported) => {
                        trace!(%host, %port, addr = %ep.addr(), "address family not supported");
                        issued.skipped += 1;
                    }
                    Err(e) => {
                        warn!("{} (skipping {} port {})", e, host, port);
                        issued.skipped += 1;
                    }
                }
            }
        }

        Ok(issued)
    }

    fn pace<C: Clock, R: Readiness>(
        &self,
        targets: &mut TargetList,
        clock: &C,
        readiness: &mut R,
        timeout: Option<Duration>,
    ) -> Result<Collected> {
        let mut done = Collected::default();
        if self.interval.is_zero() {
            return Ok(done);
        }

        let start = clock.now();
        loop {
            let waited = clock.now().saturating_sub(start);
            if waited >= self.interval {
                break;
            }
            // Wake early if an attempt in flight would time out first.
            let mut bound = self.interval - waited;
            if let Some(left) = targets.time_to_deadline(clock.now(), timeout) {
                bound = bound.min(left);
            }
            let fds = targets.pending_fds();
            let ready = readiness.wait(&fds, Some(bound))?;
            done += collector::collect(targets, &ready, clock.now(), timeout)?;
        }
        Ok(done)
    }
}

#[derive(Debug, thiserror::Error)]
enum SetupError {
    #[error("address family or protocol not supported")]
    Unsupported,
    #[error("socket: {0}")]
    Socket(io::Error),
    #[error("set_nonblocking: {0}")]
    NonBlocking(io::Error),
    #[error("connect: {0}")]
    Connect(io::Error),
}

/// Create a socket for `ep` and start a non-blocking connect on it.
/// The socket is closed on every error path by dropping it.
fn open(ep: &Endpoint) -> std::result::Result<Socket, SetupError> {
    let socket = Socket::new(ep.domain(), ep.socket_type(), ep.protocol()).map_err(|e| {
        match e.raw_os_error() {
            Some(libc::EAFNOSUPPORT) | Some(libc::EPROTONOSUPPORT) => SetupError::Unsupported,
            _ => SetupError::Socket(e),
        }
    })?;
    socket.set_nonblocking(true).map_err(SetupError::NonBlocking)?;

    match socket.connect(&SockAddr::from(ep.addr())) {
        Ok(()) => Ok(socket),
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => Ok(socket),
        Err(e) => Err(SetupError::Connect(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::target::Target;
    use socket2::{Domain, Protocol, Type};
    use std::collections::HashSet;
    use std::net::TcpListener;
    use std::os::fd::RawFd;

    /// Never reports anything ready; each wait moves the clock by its full timeout.
    struct Silent(ManualClock);

    impl Readiness for Silent {
        fn wait(&mut self, _fds: &[RawFd], timeout: Option<Duration>) -> Result<HashSet<RawFd>> {
            self.0.advance(timeout.unwrap_or(Duration::from_secs(1)));
            Ok(HashSet::new())
        }
    }

    fn listener_targets(listener: &TcpListener, n: usize) -> TargetList {
        let addr = listener.local_addr().unwrap();
        let mut list = TargetList::new();
        list.push(Target::new(
            "localhost",
            addr.port().to_string(),
            (0..n).map(|_| Endpoint::new(addr)).collect(),
        ));
        list
    }

    #[test]
    fn issuances_are_spaced_by_the_interval() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = listener_targets(&listener, 4);
        let clock = ManualClock::default();
        let mut readiness = Silent(clock.clone());

        let issued = Scheduler::new(25)
            .issue_round(&mut list, &clock, &mut readiness, Some(Duration::from_secs(2)))
            .unwrap();

        assert_eq!(issued.started, 4);
        assert_eq!(issued.skipped, 0);
        let starts: Vec<_> = list
            .endpoints()
            .map(|ep| ep.attempt().unwrap().started())
            .collect();
        assert_eq!(starts[0], Duration::from_millis(25));
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(25));
        }
    }

    #[test]
    fn zero_interval_issues_back_to_back() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = listener_targets(&listener, 3);
        let clock = ManualClock::default();
        let mut readiness = Silent(clock.clone());

        let issued = Scheduler::new(0)
            .issue_round(&mut list, &clock, &mut readiness, None)
            .unwrap();

        assert_eq!(issued.started, 3);
        assert!(list.endpoints().all(|ep| ep.attempt().unwrap().started() == Duration::ZERO));
    }

    #[test]
    fn pacing_times_out_stale_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = listener_targets(&listener, 3);
        let clock = ManualClock::default();
        let mut readiness = Silent(clock.clone());

        // Interval longer than the timeout: each pacing wait expires the previous attempt.
        let issued = Scheduler::new(50)
            .issue_round(&mut list, &clock, &mut readiness, Some(Duration::from_millis(40)))
            .unwrap();

        assert_eq!(issued.collected.timed_out, 2);
        let eps: Vec<_> = list.endpoints().collect();
        assert_eq!(eps[0].samples(), &[-40_000]);
        assert_eq!(eps[1].samples(), &[-40_000]);
        assert!(eps[2].is_pending());
    }

    #[test]
    fn pacing_wait_stops_at_the_pending_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut list = listener_targets(&listener, 2);
        let clock = ManualClock::default();
        let mut readiness = Silent(clock.clone());

        let issued = Scheduler::new(500)
            .issue_round(&mut list, &clock, &mut readiness, Some(Duration::from_millis(100)))
            .unwrap();

        assert_eq!(issued.started, 2);
        assert_eq!(issued.collected.timed_out, 1);
        let eps: Vec<_> = list.endpoints().collect();
        assert_eq!(eps[0].samples(), &[-100_000]);
        // The early wake-up does not shorten the pacing itself.
        assert_eq!(eps[1].attempt().unwrap().started(), Duration::from_millis(1000));
    }

    #[test]
    fn unsupported_family_is_skipped_without_sample() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut list = TargetList::new();
        list.push(Target::new(
            "localhost",
            addr.port().to_string(),
            vec![
                Endpoint::from_parts(Domain::from(4242), Type::STREAM, Some(Protocol::TCP), addr),
                Endpoint::new(addr),
            ],
        ));
        let clock = ManualClock::default();
        let mut readiness = Silent(clock.clone());

        let issued = Scheduler::new(0)
            .issue_round(&mut list, &clock, &mut readiness, None)
            .unwrap();

        assert_eq!(issued.started, 1);
        assert_eq!(issued.skipped, 1);
        let eps: Vec<_> = list.endpoints().collect();
        assert!(!eps[0].is_pending());
        assert!(eps[0].samples().is_empty());
        assert!(eps[1].is_pending());
    }
}
