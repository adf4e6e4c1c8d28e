//! Error types shared by every crate in the workspace.
//!
//! The `AgentError` enum unifies I/O, serialization, HTTP transport, messaging API
//! and lifecycle failures so components can propagate a single error type with `?`.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type of the digest agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// I/O error originating from the standard library, sockets or the marker file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Another live process already owns the instance marker.
    #[error("Another instance is already running (PID: {pid})")]
    AlreadyRunning {
        /// Process id stored in the marker file.
        pid: u32,
    },

    /// The HTTP request never produced a response (DNS, connect, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success HTTP status.
    #[error("HTTP status {0}: {1}")]
    Status(u16, String),

    /// The messaging API rejected a call (`ok: false`).
    #[error("{code} {description}")]
    Api {
        /// Error code reported by the API (usually the HTTP status).
        code: u16,
        /// Human-readable description reported by the API.
        description: String,
    },

    /// A digest or notice could not be delivered to its destination.
    #[error("Delivery to {destination} failed: {reason}")]
    Delivery {
        /// Destination that rejected the message.
        destination: String,
        /// Underlying failure.
        reason: String,
    },

    /// The job registry was shut down and accepts no new jobs.
    #[error("Job registry is closed")]
    RegistryClosed,

    /// Installing the process signal handler failed.
    #[error("Signal handler error: {0}")]
    Signal(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for AgentError {
    fn from(err: PoisonError<T>) -> Self {
        AgentError::MutexLock(err.to_string())
    }
}
