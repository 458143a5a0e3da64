//! Round driver: issue a round, then wait and collect until it drains.

use std::time::Duration;

use tracing::{debug, info};

use crate::clock::{Clock, MonotonicClock};
use crate::collector::{self, Collected};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::readiness::{PollReadiness, Readiness};
use crate::scheduler::Scheduler;
use crate::target::TargetList;

/// Summary of one completed round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub started: usize,
    pub skipped: usize,
    pub outcomes: Collected,
}

pub struct Prober<C = MonotonicClock, R = PollReadiness> {
    clock: C,
    readiness: R,
    scheduler: Scheduler,
    timeout: Option<Duration>,
}

impl Prober {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::with_parts(
            MonotonicClock,
            PollReadiness,
            Scheduler::new(config.delay_ms),
            config.timeout(),
        )
    }
}

impl<C: Clock, R: Readiness> Prober<C, R> {
    /// `timeout` of `None` lets attempts wait forever.
    pub fn with_parts(
        clock: C,
        readiness: R,
        scheduler: Scheduler,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            clock,
            readiness,
            scheduler,
            timeout,
        }
    }

    /// Run `rounds` rounds back to back. A round starts only once the
    /// previous one has no attempt left in flight.
    pub fn run(&mut self, targets: &mut TargetList, rounds: u32) -> Result<()> {
        for round in 0..rounds {
            let summary = self.run_round(targets)?;
            info!(
                round,
                started = summary.started,
                skipped = summary.skipped,
                succeeded = summary.outcomes.succeeded,
                failed = summary.outcomes.failed,
                timed_out = summary.outcomes.timed_out,
                "round finished"
            );
        }
        Ok(())
    }

    pub fn run_round(&mut self, targets: &mut TargetList) -> Result<RoundSummary> {
        let issued = self
            .scheduler
            .issue_round(targets, &self.clock, &mut self.readiness, self.timeout)?;
        let mut outcomes = issued.collected;
        outcomes += self.drain(targets)?;

        Ok(RoundSummary {
            started: issued.started,
            skipped: issued.skipped,
            outcomes,
        })
    }

    /// Wait and collect until no endpoint has an attempt in flight.
    pub fn drain(&mut self, targets: &mut TargetList) -> Result<Collected> {
        let mut done = Collected::default();
        loop {
            let fds = targets.pending_fds();
            if fds.is_empty() {
                return Ok(done);
            }
            let bound = targets.time_to_deadline(self.clock.now(), self.timeout);
            debug!(pending = fds.len(), ?bound, "waiting for connects");
            let ready = self.readiness.wait(&fds, bound)?;
            done += collector::collect(targets, &ready, self.clock.now(), self.timeout)?;
        }
    }
}
