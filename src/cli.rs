//! Command-line interface.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::ProbeConfig;
use crate::error::Result;
use crate::import;

pub const USAGE: &str =
    "Usage: happy [-p port] [-q nqueries] [-t timeout] [-d delay ] [-f file] [-s] [-m] hostname...";

/// Probe every address of each host with concurrent non-blocking TCP connects
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "happy", version, about, long_about = None)]
#[command(disable_help_flag = true, override_usage = USAGE)]
pub struct Cli {
    /// Port or service name to connect to (repeatable, default 80)
    #[arg(short = 'p', value_name = "port", action = ArgAction::Append)]
    pub ports: Vec<String>,

    /// Number of probing rounds (default 3)
    #[arg(short = 'q', value_name = "nqueries", value_parser = clap::value_parser!(u32).range(1..))]
    pub queries: Option<u32>,

    /// Connect timeout in milliseconds, 0 for none (default 2000)
    #[arg(short = 't', value_name = "timeout")]
    pub timeout_ms: Option<u64>,

    /// Delay between connection attempts in milliseconds (default 25)
    #[arg(short = 'd', value_name = "delay")]
    pub delay_ms: Option<u64>,

    /// Read additional hosts from a file, one per line ('-' for stdin)
    #[arg(short = 'f', value_name = "file", action = ArgAction::Append)]
    pub files: Vec<String>,

    /// Sort endpoints by mean connect time
    #[arg(short = 's')]
    pub sort: bool,

    /// Machine readable output
    #[arg(short = 'm')]
    pub machine: bool,

    /// Print usage and exit
    #[arg(short = 'h', long = "help")]
    pub help: bool,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", env = "HAPPY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error)
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Hosts to probe
    #[arg(value_name = "hostname")]
    pub hosts: Vec<String>,
}

impl Cli {
    /// Build the effective configuration: config file (if any), then
    /// command-line options on top. Hosts from the file come first,
    /// then imported hosts, then positional hosts.
    pub fn load_config(&self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load_file(path)?,
            None => ProbeConfig::default(),
        };

        if !self.ports.is_empty() {
            config.ports = self.ports.clone();
        }
        if let Some(q) = self.queries {
            config.queries = q;
        }
        if let Some(t) = self.timeout_ms {
            config.timeout_ms = t;
        }
        if let Some(d) = self.delay_ms {
            config.delay_ms = d;
        }
        config.sort |= self.sort;
        config.machine |= self.machine;
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        for file in &self.files {
            config.targets.extend(import::read_hosts(file)?);
        }
        config.targets.extend(self.hosts.iter().cloned());

        config.validate()?;
        Ok(config)
    }
}
