//! Targets, their resolved endpoints, and the per-endpoint measurements.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::warn;

use crate::error::Result;
use crate::resolver::Resolve;

/// A connection attempt that is currently in flight.
#[derive(Debug)]
pub struct Attempt {
    socket: Socket,
    started: Duration,
}

impl Attempt {
    pub fn new(socket: Socket, started: Duration) -> Self {
        Self { socket, started }
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn started(&self) -> Duration {
        self.started
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// One resolved candidate address of a target.
#[derive(Debug)]
pub struct Endpoint {
    domain: Domain,
    ty: Type,
    protocol: Option<Protocol>,
    addr: SocketAddr,

    attempt: Option<Attempt>,
    samples: Vec<i64>,
    successes: u32,
    attempts: u32,
    latency_sum: u64,
}

impl Endpoint {
    /// A TCP endpoint for `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self::from_parts(
            Domain::for_address(addr),
            Type::STREAM,
            Some(Protocol::TCP),
            addr,
        )
    }

    pub fn from_parts(
        domain: Domain,
        ty: Type,
        protocol: Option<Protocol>,
        addr: SocketAddr,
    ) -> Self {
        Self {
            domain,
            ty,
            protocol,
            addr,
            attempt: None,
            samples: Vec::new(),
            successes: 0,
            attempts: 0,
            latency_sum: 0,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn socket_type(&self) -> Type {
        self.ty
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signed microsecond samples, one per completed round.
    /// Negative values are failures or timeouts.
    pub fn samples(&self) -> &[i64] {
        &self.samples
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Mean successful latency in microseconds, if any attempt succeeded.
    pub fn mean_latency(&self) -> Option<u64> {
        (self.successes > 0).then(|| self.latency_sum / u64::from(self.successes))
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.attempt.is_some()
    }

    pub(crate) fn begin(&mut self, attempt: Attempt) {
        debug_assert!(self.attempt.is_none(), "endpoint already has an attempt");
        self.attempt = Some(attempt);
    }

    /// Finalize the in-flight attempt as a success. Closes the socket.
    pub(crate) fn record_success(&mut self, elapsed: Duration) {
        let us = micros(elapsed);
        self.attempt = None;
        self.samples.push(us);
        self.latency_sum += us as u64;
        self.successes += 1;
        self.attempts += 1;
    }

    /// Finalize the in-flight attempt as a failure or timeout. Closes the socket.
    ///
    /// The stored sample is never zero so its sign always identifies a failure.
    pub(crate) fn record_failure(&mut self, elapsed: Duration) {
        let us = micros(elapsed).max(1);
        self.attempt = None;
        self.samples.push(-us);
        self.attempts += 1;
    }
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

/// A host/port pair and everything it resolved to.
#[derive(Debug)]
pub struct Target {
    host: String,
    port: String,
    pub(crate) endpoints: Vec<Endpoint>,
}

impl Target {
    pub fn new(host: impl Into<String>, port: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            endpoints,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// Ordered registry of targets; iteration order is insertion order.
#[derive(Debug, Default)]
pub struct TargetList {
    targets: Vec<Target>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: Target) {
        self.targets.push(target);
    }

    /// Resolve `host` for every port and append the resulting targets.
    /// Non-fatal resolution failures are logged and the pair is dropped;
    /// fatal ones are returned.
    pub fn add_host<R: Resolve + ?Sized>(
        &mut self,
        resolver: &R,
        host: &str,
        ports: &[String],
    ) -> Result<()> {
        for port in ports {
            match resolver.resolve(host, port) {
                Ok(endpoints) => self.push(Target::new(host, port.as_str(), endpoints)),
                Err(e) if !e.is_fatal() => warn!("{}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn get(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Target> {
        self.targets.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.targets.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Target> {
        self.targets.iter_mut()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.targets.iter().flat_map(|t| t.endpoints.iter())
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints().count()
    }

    /// Descriptors of every socket with an attempt in flight.
    pub fn pending_fds(&self) -> Vec<RawFd> {
        self.endpoints()
            .filter_map(|ep| ep.attempt().map(Attempt::fd))
            .collect()
    }

    /// Start time of the oldest attempt still in flight.
    pub fn oldest_pending(&self) -> Option<Duration> {
        self.endpoints()
            .filter_map(|ep| ep.attempt().map(Attempt::started))
            .min()
    }

    /// Time left at `now` until the oldest attempt in flight reaches
    /// `timeout`. `None` when nothing is in flight or there is no timeout.
    pub fn time_to_deadline(&self, now: Duration, timeout: Option<Duration>) -> Option<Duration> {
        let timeout = timeout?;
        let oldest = self.oldest_pending()?;
        Some((oldest + timeout).saturating_sub(now))
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
