//! Long-polling consumer of inbound bot updates.
//!
//! Updates are turned into `InboundEvent`s: commands go to the dispatcher,
//! transport failures go to the `ConnectionSupervisor` as faults.
use crate::supervisor::{InboundStream, StreamFault};
use crate::telegram::{TelegramApi, Update};
use crossbeam_channel::Sender;
use digest_common::{CommandEvent, Result};
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Event produced by the inbound stream.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A parsed chat command.
    Command(CommandEvent),
    /// A transport-level failure of the stream.
    Fault(StreamFault),
}

/// Anything that can be long-polled for updates.
pub trait UpdateSource: Send + Sync {
    /// Fetch the updates with id `>= offset`, waiting up to `long_poll_secs`.
    fn get_updates(&self, offset: i64, long_poll_secs: u64) -> Result<Vec<Update>>;
}

impl UpdateSource for TelegramApi {
    fn get_updates(&self, offset: i64, long_poll_secs: u64) -> Result<Vec<Update>> {
        TelegramApi::get_updates(self, offset, long_poll_secs)
    }
}

/// Long-polling consumer of the inbound update stream.
///
/// Each `start` bumps a generation counter and spawns a polling thread bound to
/// that generation; `stop` bumps it again. A thread whose generation is stale
/// exits and discards whatever its in-flight poll returned without advancing the
/// shared offset, so the next consumer receives those updates exactly once.
pub struct UpdatePoller {
    source: Arc<dyn UpdateSource>,
    events: Sender<InboundEvent>,
    offset: Arc<AtomicI64>,
    generation: Arc<AtomicU64>,
    long_poll_secs: u64,
    interval: Duration,
}

impl UpdatePoller {
    /// Create a stopped poller forwarding events to `events`.
    pub fn new(source: Arc<dyn UpdateSource>, events: Sender<InboundEvent>, long_poll_secs: u64, interval: Duration) -> Self {
        Self {
            source,
            events,
            offset: Arc::new(AtomicI64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            long_poll_secs,
            interval,
        }
    }

    #[cfg(test)]
    fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }
}

impl InboundStream for UpdatePoller {
    fn start(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = PollWorker {
            source: Arc::clone(&self.source),
            events: self.events.clone(),
            offset: Arc::clone(&self.offset),
            current: Arc::clone(&self.generation),
            generation,
            long_poll_secs: self.long_poll_secs,
            interval: self.interval,
        };
        thread::Builder::new()
            .name(format!("update-poller-{}", generation))
            .spawn(move || worker.run())?;
        info!("Polling started (generation {})", generation);
        Ok(())
    }

    fn stop(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        info!("Polling stopped (generation {})", generation);
    }
}

struct PollWorker {
    source: Arc<dyn UpdateSource>,
    events: Sender<InboundEvent>,
    offset: Arc<AtomicI64>,
    current: Arc<AtomicU64>,
    generation: u64,
    long_poll_secs: u64,
    interval: Duration,
}

impl PollWorker {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn run(self) {
        while self.is_current() {
            let polled = self
                .source
                .get_updates(self.offset.load(Ordering::SeqCst), self.long_poll_secs);
            if !self.is_current() {
                debug!("Discarding poll result of stopped generation {}", self.generation);
                break;
            }

            let delivered = match polled {
                Ok(updates) => self.forward(updates),
                Err(e) => self
                    .events
                    .send(InboundEvent::Fault(StreamFault::new(e.to_string())))
                    .is_ok(),
            };
            if !delivered {
                debug!("Event receiver closed, poller {} exiting", self.generation);
                break;
            }
            thread::sleep(self.interval);
        }
    }

    fn forward(&self, updates: Vec<Update>) -> bool {
        for update in updates {
            self.offset.fetch_max(update.update_id + 1, Ordering::SeqCst);
            if let Some(event) = update.command_event() {
                if self.events.send(InboundEvent::Command(event)).is_err() {
                    return false;
                }
            }
        }
        true
    }
}
