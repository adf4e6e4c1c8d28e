//! Lifecycle of the inbound command stream as seen by the connection supervisor.
//!
//! ```text
//! Disconnected --connect--> Connecting --started--> Active
//!      ^                                              |
//!      |                                        conflict fault
//!   release                                           v
//!      +---------------- any state <------------- Faulted --recovered--> Active
//! ```

use strum_macros::Display;

/// State of the inbound stream consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ConnectionState {
    /// No consumer attached (before startup, after shutdown).
    #[default]
    Disconnected,
    /// Consumer being (re)started.
    Connecting,
    /// Consumer running.
    Active,
    /// A conflict fault was observed; recovery in progress.
    Faulted,
}
