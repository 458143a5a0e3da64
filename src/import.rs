//! Reading target host lists.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::error::{ProbeError, Result};

/// Read one host per line from `path`, or from stdin when `path` is `-`.
/// Lines are trimmed and blank lines skipped.
pub fn read_hosts(path: &str) -> Result<Vec<String>> {
    let err = |source| ProbeError::Import {
        path: path.to_string(),
        source,
    };
    if path == "-" {
        parse_hosts(io::stdin().lock()).map_err(err)
    } else {
        let file = File::open(path).map_err(err)?;
        parse_hosts(BufReader::new(file)).map_err(err)
    }
}

pub fn parse_hosts<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut hosts = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let host = line.trim();
        if !host.is_empty() {
            hosts.push(host.to_string());
        }
    }
    Ok(hosts)
}
