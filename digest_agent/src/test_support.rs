//! Test doubles shared by the unit tests of the agent.

use crate::delivery::{Messenger, SendOptions};
use crate::fetcher::RankingProvider;
use crate::model::scheduler::{Scheduler, Task, TimerHandle};
use crate::poller::UpdateSource;
use crate::supervisor::InboundStream;
use crate::telegram::{Chat, Message, Update, User};
use digest_common::{AgentError, Destination, Entity, Result};
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

struct ManualTimer {
    id: u64,
    due: Duration,
    period: Option<Duration>,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

/// Virtual-time scheduler: nothing fires until `advance` is called, and then
/// every due timer runs on the calling thread in due-time order.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, delay: Duration, period: Option<Duration>, task: Task) -> TimerHandle {
        let mut clock = self.clock.lock().unwrap();
        let cancelled = Arc::new(AtomicBool::new(false));
        let id = clock.next_id;
        clock.next_id += 1;
        let due = clock.now + delay;
        clock.timers.push(ManualTimer {
            id,
            due,
            period,
            task,
            cancelled: Arc::clone(&cancelled),
        });
        TimerHandle::new(cancelled, None)
    }

    pub fn now(&self) -> Duration {
        self.clock.lock().unwrap().now
    }

    /// Timers that can still fire.
    pub fn active_timers(&self) -> usize {
        let clock = self.clock.lock().unwrap();
        clock
            .timers
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let next = {
                let mut clock = self.clock.lock().unwrap();
                clock.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
                let index = clock
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                index.map(|i| {
                    let due = clock.timers[i].due;
                    clock.now = due;
                    let fired = (
                        Arc::clone(&clock.timers[i].task),
                        Arc::clone(&clock.timers[i].cancelled),
                    );
                    match clock.timers[i].period {
                        Some(period) => clock.timers[i].due = due + period,
                        None => {
                            clock.timers.remove(i);
                        }
                    }
                    fired
                })
            };
            match next {
                Some((task, cancelled)) => {
                    if !cancelled.load(Ordering::SeqCst) {
                        task();
                    }
                }
                None => break,
            }
        }
        self.clock.lock().unwrap().now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_periodic(&self, period: Duration, task: Task) -> TimerHandle {
        self.add(period, Some(period), task)
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        self.add(delay, None, task)
    }
}

/// Messenger that records successful sends and fails on demand.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(Destination, String, SendOptions)>>,
    failing: Mutex<HashSet<Destination>>,
    fail_all: AtomicBool,
    fail_next: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, destination: Destination) {
        self.failing.lock().unwrap().insert(destination);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` sends, whatever their destination.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Destination, String, SendOptions)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, destination: &Destination) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(d, _, _)| d == destination)
            .map(|(_, text, _)| text)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Messenger for RecordingMessenger {
    fn send_message(&self, destination: &Destination, text: &str, options: SendOptions) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced
            || self.fail_all.load(Ordering::SeqCst)
            || self.failing.lock().unwrap().contains(destination)
        {
            return Err(AgentError::Api {
                code: 403,
                description: String::from("Forbidden: bot was blocked by the user"),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.clone(), text.to_string(), options));
        Ok(())
    }
}

/// Provider answering with a fixed list or a fixed error.
pub struct ScriptedProvider {
    answer: std::result::Result<Vec<Entity>, String>,
    limits: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn returning(entities: Vec<Entity>) -> Self {
        Self {
            answer: Ok(entities),
            limits: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AgentError) -> Self {
        Self {
            answer: Err(error.to_string()),
            limits: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

impl RankingProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn fetch_listings(&self, limit: usize) -> Result<Vec<Entity>> {
        self.limits.lock().unwrap().push(limit);
        match &self.answer {
            Ok(entities) => Ok(entities.clone()),
            Err(message) => Err(AgentError::Transport(message.clone())),
        }
    }
}

/// Update source replaying queued poll results; empty polls once drained.
#[derive(Default)]
pub struct ScriptedUpdates {
    queue: Mutex<VecDeque<Result<Vec<Update>>>>,
    offsets: Mutex<Vec<i64>>,
}

impl ScriptedUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, updates: Vec<Update>) {
        self.queue.lock().unwrap().push_back(Ok(updates));
    }

    pub fn push_err(&self, error: AgentError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                chat: Chat { id: chat_id },
                from: Some(User {
                    first_name: Some(String::from("Tester")),
                }),
                text: Some(text.to_string()),
            }),
        }
    }
}

impl UpdateSource for ScriptedUpdates {
    fn get_updates(&self, offset: i64, _long_poll_secs: u64) -> Result<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                thread::sleep(Duration::from_millis(5));
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCall {
    Start,
    Stop,
}

/// Inbound stream recording start/stop calls and when they happened.
#[derive(Default)]
pub struct RecordingStream {
    calls: Mutex<Vec<(StreamCall, Instant)>>,
    fail_starts: AtomicBool,
}

impl RecordingStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StreamCall> {
        self.calls.lock().unwrap().iter().map(|(call, _)| *call).collect()
    }

    pub fn timeline(&self) -> Vec<(StreamCall, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_starts(&self, fail: bool) {
        self.fail_starts.store(fail, Ordering::SeqCst);
    }
}

impl InboundStream for RecordingStream {
    fn start(&self) -> Result<()> {
        self.calls.lock().unwrap().push((StreamCall::Start, Instant::now()));
        if self.fail_starts.load(Ordering::SeqCst) {
            return Err(AgentError::Transport(String::from("start refused")));
        }
        Ok(())
    }

    fn stop(&self) {
        self.calls.lock().unwrap().push((StreamCall::Stop, Instant::now()));
    }
}

/// Raw HTTP/1.1 response with the given status line tail and body.
pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

fn read_request(stream: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let size = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(size) => size,
        };
        data.extend_from_slice(&buf[..size]);
        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }
}

/// Serve `response` to the first connection; returns the base URL.
pub fn serve_once(response: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            read_request(&mut stream);
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });
    url
}

/// Accept connections, read the request, and never answer for `hold`.
pub fn serve_silently(hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                read_request(&mut stream);
                thread::sleep(hold);
            });
        }
    });
    url
}
