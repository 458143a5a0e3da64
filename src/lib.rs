//! Happy eyeballs TCP probe.
//!
//! Resolves each target to all of its addresses, then in every round races
//! paced non-blocking connects against all of them at once and records how
//! long each took to succeed, fail, or time out.

pub mod cli;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod import;
pub mod lock;
pub mod prober;
pub mod rank;
pub mod readiness;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod target;

pub use config::ProbeConfig;
pub use error::{ProbeError, Result};
pub use prober::Prober;
pub use resolver::{Resolve, SystemResolver};
pub use target::{Endpoint, Target, TargetList};
