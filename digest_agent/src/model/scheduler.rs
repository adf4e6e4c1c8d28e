//! Timer capability used by the job registry.
//!
//! `Scheduler` hides how time passes: `ThreadScheduler` backs every timer with a
//! background thread driven by `crossbeam_channel::tick`/`after`, while tests use a
//! virtual clock. Both hand out a `TimerHandle`; cancelling (or dropping) the
//! handle guarantees the task is not started again. A task that is already
//! running when the handle is cancelled is allowed to finish.

use crossbeam_channel::{Receiver, Sender, after, bounded, select, tick};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Work executed when a timer fires.
pub type Task = Arc<dyn Fn() + Send + Sync + 'static>;

/// Source of one-shot and repeating timers.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, first run after one full `period`.
    fn schedule_periodic(&self, period: Duration, task: Task) -> TimerHandle;

    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancellation handle of a scheduled timer. Dropping it cancels the timer.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

impl TimerHandle {
    /// Wrap a cancellation flag and an optional wake-up channel whose disconnection
    /// interrupts a sleeping timer thread.
    pub fn new(cancelled: Arc<AtomicBool>, wake: Option<Sender<()>>) -> Self {
        Self { cancelled, wake }
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.take();
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Real-time scheduler: one lightweight thread per timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    fn arm() -> (Arc<AtomicBool>, Sender<()>, Receiver<()>) {
        let (wake_tx, wake_rx) = bounded::<()>(0);
        (Arc::new(AtomicBool::new(false)), wake_tx, wake_rx)
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_periodic(&self, period: Duration, task: Task) -> TimerHandle {
        let (cancelled, wake_tx, wake_rx) = Self::arm();
        let flag = Arc::clone(&cancelled);

        thread::spawn(move || {
            let ticker = tick(period);
            loop {
                select! {
                    recv(wake_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        task();
                    }
                }
            }
            debug!("Periodic timer ({:?}) released", period);
        });

        TimerHandle::new(cancelled, Some(wake_tx))
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        let (cancelled, wake_tx, wake_rx) = Self::arm();
        let flag = Arc::clone(&cancelled);

        thread::spawn(move || {
            select! {
                recv(wake_rx) -> _ => {},
                recv(after(delay)) -> _ => {
                    if !flag.load(Ordering::SeqCst) {
                        task();
                    }
                }
            }
        });

        TimerHandle::new(cancelled, Some(wake_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Task) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        let task: Task = Arc::new(move || {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, task)
    }

    #[test]
    fn periodic_timer_fires_until_cancelled() {
        let (count, task) = counter();
        let mut handle = ThreadScheduler.schedule_periodic(Duration::from_millis(20), task);

        thread::sleep(Duration::from_millis(150));
        handle.cancel();
        thread::sleep(Duration::from_millis(10));
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 2, "fired {} times", fired);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), fired);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn dropped_one_shot_never_fires() {
        let (count, task) = counter();
        let handle = ThreadScheduler.schedule_once(Duration::from_millis(50), task);
        drop(handle);

        thread::sleep(Duration::from_millis(120));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_shot_fires_once() {
        let (count, task) = counter();
        let _handle = ThreadScheduler.schedule_once(Duration::from_millis(10), task);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
