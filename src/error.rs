//! Error types for the prober.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// Name resolution failed for one host/port pair. The target is dropped.
    #[error("{reason} (skipping {host} port {port})")]
    Resolve {
        host: String,
        port: String,
        reason: String,
    },

    /// The readiness wait itself failed.
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    /// Reading SO_ERROR from a completed attempt failed.
    #[error("getsockopt(SO_ERROR) failed: {0}")]
    SocketStatus(#[source] io::Error),

    /// Reading a target list failed.
    #[error("cannot read targets from {path}: {source}")]
    Import {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

impl ProbeError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error aborts the whole run rather than a single target.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Resolve { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
