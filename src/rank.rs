//! Ordering endpoints by observed latency.

use std::cmp::Ordering;

use crate::target::{Endpoint, TargetList};

/// Compare two endpoints by mean successful latency.
///
/// Returns `None` when either side has no successful attempt: such
/// endpoints are unordered relative to everything, so this is a partial
/// order only.
pub fn compare_mean(a: &Endpoint, b: &Endpoint) -> Option<Ordering> {
    Some(a.mean_latency()?.cmp(&b.mean_latency()?))
}

/// Sort the endpoints of every target by ascending mean latency.
///
/// Endpoints with data end up in non-decreasing order of their mean, ties
/// keeping their resolver order. Endpoints without data are unordered;
/// they are currently placed after the rest, but callers must not depend
/// on that position.
pub fn sort_targets(targets: &mut TargetList) {
    for target in targets.iter_mut() {
        sort_endpoints(&mut target.endpoints);
    }
}

pub fn sort_endpoints(endpoints: &mut [Endpoint]) {
    // Partition first so the comparator handed to the sort is total.
    let mut with_data = 0;
    for i in 0..endpoints.len() {
        if endpoints[i].mean_latency().is_some() {
            endpoints[with_data..=i].rotate_right(1);
            with_data += 1;
        }
    }
    endpoints[..with_data].sort_by(|a, b| compare_mean(a, b).unwrap_or(Ordering::Equal));
}
