//! Rendering of the collected samples.

use std::io::{self, Write};

use crate::target::{Endpoint, TargetList};

/// Column where the human report's sample fields start.
const ADDRESS_WIDTH: usize = 42;

/// Prefix identifying machine report lines and their format version.
pub const MACHINE_TAG: &str = "HAPPY.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Machine,
}

/// Render `targets` in `format`. `nqueries` pads human rows to a fixed
/// number of columns, `now` is the unix timestamp stamped on machine rows.
pub fn render<W: Write>(
    out: &mut W,
    targets: &TargetList,
    format: ReportFormat,
    nqueries: usize,
    now: i64,
) -> io::Result<()> {
    match format {
        ReportFormat::Human => render_human(out, targets, nqueries),
        ReportFormat::Machine => render_machine(out, targets, now),
    }
}

/// One block per target: a `host:port` header followed by one row per
/// endpoint with its address and `nqueries` latency columns in
/// milliseconds. Failed, timed out, or missing samples print as `*`.
pub fn render_human<W: Write>(
    out: &mut W,
    targets: &TargetList,
    nqueries: usize,
) -> io::Result<()> {
    for (i, target) in targets.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}:{}", target.host(), target.port())?;

        for ep in target.endpoints() {
            let addr = format!(" {}", numeric_host(ep));
            write!(out, "{:<width$}", addr, width = ADDRESS_WIDTH)?;
            for slot in 0..nqueries.max(ep.samples().len()) {
                match ep.samples().get(slot) {
                    Some(&us) if us >= 0 => write!(out, " {:4}.{:03}", us / 1000, us % 1000)?,
                    _ => write!(out, "     *   ")?,
                }
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

/// One semicolon separated line per endpoint:
/// `HAPPY.0;<ts>;OK|FAIL;<host>;<port>;<address>;<sample>...`
pub fn render_machine<W: Write>(out: &mut W, targets: &TargetList, now: i64) -> io::Result<()> {
    for target in targets {
        for ep in target.endpoints() {
            write!(
                out,
                "{};{};{};{};{};{}",
                MACHINE_TAG,
                now,
                if ep.successes() > 0 { "OK" } else { "FAIL" },
                target.host(),
                target.port(),
                numeric_host(ep),
            )?;
            for us in ep.samples() {
                write!(out, ";{}", us)?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn numeric_host(ep: &Endpoint) -> String {
    ep.addr().ip().to_string()
}
