//! Core lifecycle models of the digest agent.
//!
//! - `scheduler`: timer capability (`Scheduler`, `TimerHandle`) and its real-time
//!   implementation.
//! - `job_registry`: one recurring delivery job per destination.
//! - `instance_guard`: single-instance PID marker.
//! - `connection_state`: lifecycle states of the inbound command stream.

pub mod connection_state;
pub mod instance_guard;
pub mod job_registry;
pub mod scheduler;
