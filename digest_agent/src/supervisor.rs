//! Inbound stream supervision.
//!
//! The `ConnectionSupervisor` owns the `ConnectionState` of the inbound command
//! stream and reacts to its faults. Only one fault class is recoverable: a
//! conflicting consumer (another process or session polling the same bot, HTTP
//! 409). For it the supervisor runs a single bounded cycle: stop, wait, stop
//! again, wait, resume. Every other fault is logged and left alone. There is no
//! failure counting and no escalation; each conflict occurrence gets one attempt,
//! and conflicts reported while a cycle is already running are folded into it.

use crate::model::connection_state::ConnectionState;
use digest_common::Result;
use digest_common::net::{RECOVERY_FIRST_DELAY, RECOVERY_SECOND_DELAY};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A consumer of the inbound command stream that can be paused and resumed.
pub trait InboundStream: Send + Sync {
    /// Begin consuming.
    fn start(&self) -> Result<()>;
    /// Stop consuming. Idempotent.
    fn stop(&self);
}

/// Fault reported by the inbound stream, carrying the transport's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    /// Classification string, e.g. `409 Conflict: terminated by other getUpdates request`.
    pub message: String,
}

/// How a fault is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Another consumer is attached to the same stream.
    Conflict,
    /// Anything else; logged only.
    Other,
}

impl StreamFault {
    /// Wrap a transport error description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Classify the fault from its description.
    pub fn class(&self) -> FaultClass {
        if self.message.contains("409") || self.message.contains("Conflict") {
            FaultClass::Conflict
        } else {
            FaultClass::Other
        }
    }
}

/// What `handle_fault` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The stop/wait/restart cycle ran and consumption resumed.
    Restarted,
    /// A cycle was already running for an earlier conflict.
    InProgress,
    /// The supervisor was released during the cycle; consumption stays stopped.
    Abandoned,
    /// The fault is not recoverable; it was only logged.
    NotAttempted,
}

/// Pauses of the conflict recovery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryDelays {
    /// Pause after the first stop.
    pub first: Duration,
    /// Pause after the second stop, before resuming.
    pub second: Duration,
}

impl Default for RecoveryDelays {
    fn default() -> Self {
        Self {
            first: RECOVERY_FIRST_DELAY,
            second: RECOVERY_SECOND_DELAY,
        }
    }
}

/// Owner of the inbound stream lifecycle.
pub struct ConnectionSupervisor {
    stream: Arc<dyn InboundStream>,
    state: Mutex<ConnectionState>,
    recovering: AtomicBool,
    released: AtomicBool,
    delays: RecoveryDelays,
}

impl ConnectionSupervisor {
    /// Supervise `stream`, initially disconnected.
    pub fn new(stream: Arc<dyn InboundStream>, delays: RecoveryDelays) -> Self {
        Self {
            stream,
            state: Mutex::new(ConnectionState::Disconnected),
            recovering: AtomicBool::new(false),
            released: AtomicBool::new(false),
            delays,
        }
    }

    #[cfg(test)]
    fn state(&self) -> Result<ConnectionState> {
        Ok(*self.state.lock()?)
    }

    /// Start consuming the stream.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        *state = ConnectionState::Connecting;
        match self.stream.start() {
            Ok(()) => {
                *state = ConnectionState::Active;
                Ok(())
            }
            Err(e) => {
                *state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// React to a stream fault. Blocks for the duration of a recovery cycle.
    pub fn handle_fault(&self, fault: &StreamFault) -> Result<Recovery> {
        error!("Polling error: {}", fault.message);
        if fault.class() != FaultClass::Conflict {
            return Ok(Recovery::NotAttempted);
        }
        if self.recovering.swap(true, Ordering::SeqCst) {
            warn!("Conflict recovery already in progress, ignoring repeated fault");
            return Ok(Recovery::InProgress);
        }

        let outcome = self.recover();
        self.recovering.store(false, Ordering::SeqCst);
        outcome
    }

    fn recover(&self) -> Result<Recovery> {
        {
            let mut state = self.state.lock()?;
            if self.released.load(Ordering::SeqCst) {
                return Ok(Recovery::Abandoned);
            }
            *state = ConnectionState::Faulted;
        }

        info!("Attempting to restart polling...");
        self.stream.stop();
        thread::sleep(self.delays.first);
        self.stream.stop();
        thread::sleep(self.delays.second);

        let mut state = self.state.lock()?;
        if self.released.load(Ordering::SeqCst) {
            info!("Supervisor released during recovery, not resuming");
            return Ok(Recovery::Abandoned);
        }
        *state = ConnectionState::Connecting;
        match self.stream.start() {
            Ok(()) => {
                *state = ConnectionState::Active;
                info!("Polling restarted");
                Ok(Recovery::Restarted)
            }
            Err(e) => {
                *state = ConnectionState::Faulted;
                Err(e)
            }
        }
    }

    /// Stop consuming for good (shutdown). A recovery cycle in flight will not
    /// resume the stream afterwards.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        self.released.store(true, Ordering::SeqCst);
        self.stream.stop();
        *state = ConnectionState::Disconnected;
        info!("Inbound stream released");
        Ok(())
    }
}
