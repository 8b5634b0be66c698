//! Time sources with one-shot timers.
//!
//! Timer firings are delivered as [`TimerId`]s over a single-consumer channel
//! so the owner of the scheduler decides when dispatch happens.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait Clock {
    /// Current time in milliseconds.
    fn now(&self) -> f64;

    /// Arm a one-shot timer for absolute time `at_ms`.
    fn set_timer(&mut self, at_ms: f64) -> TimerId;

    /// Disarm a timer. Unknown or already fired ids are ignored.
    fn cancel_timer(&mut self, id: TimerId);

    /// Channel on which fired timer ids arrive.
    fn timer_events(&self) -> &Receiver<TimerId>;
}

// ==================== ManualClock ====================

#[derive(Debug)]
struct ManualState {
    now: f64,
    next_id: u64,
    timers: Vec<(TimerId, f64)>,
}

/// Clock that only moves when told to. Clones share time, timers and channel.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
    fired_tx: Sender<TimerId>,
    fired: Receiver<TimerId>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        let (fired_tx, fired) = unbounded();
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start_ms,
                next_id: 1,
                timers: Vec::new(),
            })),
            fired_tx,
            fired,
        }
    }

    pub fn advance(&self, delta_ms: f64) {
        let now = self.state.lock().now;
        self.set_time(now + delta_ms);
    }

    /// Move to `now_ms` and fire every timer due by then, earliest first.
    pub fn set_time(&self, now_ms: f64) {
        let mut due = {
            let mut state = self.state.lock();
            state.now = now_ms;
            let (due, pending): (Vec<_>, Vec<_>) =
                state.timers.drain(..).partition(|&(_, at)| at <= now_ms);
            state.timers = pending;
            due
        };
        due.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (id, _) in due {
            // The receiver lives in `self`, so the send cannot fail.
            let _ = self.fired_tx.send(id);
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.state.lock().now
    }

    fn set_timer(&mut self, at_ms: f64) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        state.timers.push((id, at_ms));
        id
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.state.lock().timers.retain(|&(t, _)| t != id);
    }

    fn timer_events(&self) -> &Receiver<TimerId> {
        &self.fired
    }
}

// ==================== ThreadClock ====================

enum TimerCommand {
    Set { id: TimerId, deadline: Instant },
    Cancel(TimerId),
    Shutdown,
}

/// Wall clock whose timers run on a dedicated worker thread.
pub struct ThreadClock {
    epoch: Instant,
    next_id: u64,
    commands: Sender<TimerCommand>,
    fired: Receiver<TimerId>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadClock {
    const IDLE_WAIT: Duration = Duration::from_millis(100);

    pub fn new() -> Result<Self> {
        let (commands, command_rx) = bounded(1024);
        let (fired_tx, fired) = unbounded();

        let worker = thread::Builder::new()
            .name("umpkit-timer-thread".to_string())
            .spawn(move || Self::timer_thread(command_rx, fired_tx))
            .map_err(|e| Error::ClockUnavailable(e.to_string()))?;
        debug!("timer thread started");

        Ok(Self {
            epoch: Instant::now(),
            next_id: 1,
            commands,
            fired,
            worker: Some(worker),
        })
    }

    fn timer_thread(commands: Receiver<TimerCommand>, fired: Sender<TimerId>) {
        let mut timers: Vec<(TimerId, Instant)> = Vec::new();

        loop {
            let wait = timers
                .iter()
                .map(|&(_, deadline)| deadline.saturating_duration_since(Instant::now()))
                .min()
                .unwrap_or(Self::IDLE_WAIT);

            match commands.recv_timeout(wait) {
                Ok(TimerCommand::Set { id, deadline }) => timers.push((id, deadline)),
                Ok(TimerCommand::Cancel(id)) => timers.retain(|&(t, _)| t != id),
                Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            let mut due: Vec<_> = timers.iter().copied().filter(|&(_, d)| d <= now).collect();
            if due.is_empty() {
                continue;
            }
            timers.retain(|&(_, d)| d > now);
            due.sort_by_key(|&(_, d)| d);
            for (id, _) in due {
                if fired.send(id).is_err() {
                    debug!("timer receiver dropped; stopping timer thread");
                    return;
                }
            }
        }
        debug!("timer thread stopped");
    }
}

impl Clock for ThreadClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn set_timer(&mut self, at_ms: f64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = Duration::try_from_secs_f64(at_ms.max(0.0) / 1000.0)
            .ok()
            .and_then(|offset| self.epoch.checked_add(offset));
        let Some(deadline) = deadline else {
            warn!("timer {:?} at {} ms is out of range; it will never fire", id, at_ms);
            return id;
        };
        if self.commands.send(TimerCommand::Set { id, deadline }).is_err() {
            warn!("timer thread is gone; timer {:?} will never fire", id);
        }
        id
    }

    fn cancel_timer(&mut self, id: TimerId) {
        let _ = self.commands.send(TimerCommand::Cancel(id));
    }

    fn timer_events(&self) -> &Receiver<TimerId> {
        &self.fired
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
