//! Time-ordered event delivery.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, warn};
use umpkit_core::Midi2Event;

use crate::clock::{Clock, TimerId};
use crate::config::SchedulerConfig;
use crate::jitter::JitterReductionSynchronizer;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// What a subscriber returns; an `Err` is logged and does not stop delivery.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Box<dyn FnMut(&Midi2Event) -> HandlerResult>;

#[derive(Debug)]
struct QueueItem {
    id: EventId,
    time: f64,
    event: Midi2Event,
}

/// Single-owner scheduler: one sorted queue, at most one armed timer.
///
/// Timer firings are picked up by [`process_timers`](Self::process_timers) or
/// [`wait_and_process`](Self::wait_and_process); items already within the
/// jitter tolerance are dispatched synchronously from `schedule`.
pub struct Scheduler<C: Clock> {
    clock: C,
    config: SchedulerConfig,
    sync: Option<JitterReductionSynchronizer>,
    queue: VecDeque<QueueItem>,
    armed: Option<TimerId>,
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
    next_subscription: u64,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            config,
            sync: None,
            queue: VecDeque::new(),
            armed: None,
            next_id: 1,
            handlers: Vec::new(),
            next_subscription: 1,
        })
    }

    /// Route JR utility events through `sync` and project regular events onto its time base.
    pub fn with_jitter_reduction(mut self, sync: JitterReductionSynchronizer) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn jitter_reduction(&self) -> Option<&JitterReductionSynchronizer> {
        self.sync.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // ==================== Subscriptions ====================

    pub fn on_event<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&Midi2Event) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    // ==================== Queue ====================

    /// Queue `event` for time `at` (clock milliseconds).
    ///
    /// With a synchronizer attached, JR Clock / JR Timestamp events update it
    /// and are stamped with the projected time when there is one; other events
    /// move to their group's projected time when the group has a JR base and
    /// timestamp.
    ///
    /// Fails with [`Error::InvalidTime`] when `at` (or the projected time) is
    /// not finite; nothing is queued or fed to the synchronizer then.
    pub fn schedule(&mut self, event: Midi2Event, at: f64) -> Result<EventId> {
        if !at.is_finite() {
            return Err(Error::InvalidTime(at));
        }

        let mut event = event;
        let mut time = at;
        match self.sync.as_mut() {
            Some(sync) if event.message.is_jitter_reduction() => {
                event.timestamp = sync
                    .handle(&event.message, at)
                    .or(event.timestamp)
                    .or(Some(at));
            }
            Some(sync) => match sync.to_absolute_time(event.group().unwrap_or(0), None) {
                Some(projected) => {
                    time = projected;
                    event.timestamp = Some(projected);
                }
                None => event.timestamp = event.timestamp.or(Some(at)),
            },
            None => event.timestamp = event.timestamp.or(Some(at)),
        }
        if !time.is_finite() {
            return Err(Error::InvalidTime(time));
        }

        let id = EventId(self.next_id);
        self.next_id += 1;
        debug!("scheduled {:?} at {} ms", id, time);
        self.insert(QueueItem { id, time, event });
        self.arm_next();
        Ok(id)
    }

    /// Remove a pending item. Returns `false` if it was already delivered or cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let Some(index) = self.queue.iter().position(|item| item.id == id) else {
            return false;
        };
        self.queue.remove(index);
        debug!("cancelled {:?}", id);
        if index == 0 {
            self.arm_next();
        }
        true
    }

    /// Drop every pending item and disarm the timer.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.disarm();
    }

    /// FIFO among equal times.
    fn insert(&mut self, item: QueueItem) {
        match self.queue.iter().position(|q| item.time < q.time) {
            Some(index) => self.queue.insert(index, item),
            None => self.queue.push_back(item),
        }
    }

    // ==================== Dispatch ====================

    /// Handle timer firings already delivered by the clock. Returns the number of events dispatched.
    pub fn process_timers(&mut self) -> usize {
        let fired: Vec<TimerId> = self.clock.timer_events().try_iter().collect();
        self.on_fired(fired)
    }

    /// Block up to `timeout` for the next timer firing, then process it.
    pub fn wait_and_process(&mut self, timeout: Duration) -> usize {
        let first = match self.clock.timer_events().recv_timeout(timeout) {
            Ok(id) => id,
            Err(_) => return 0,
        };
        let mut fired = vec![first];
        fired.extend(self.clock.timer_events().try_iter());
        self.on_fired(fired)
    }

    fn on_fired(&mut self, fired: Vec<TimerId>) -> usize {
        if !fired.iter().any(|id| Some(*id) == self.armed) {
            return 0;
        }
        self.armed = None;
        let dispatched = self.dispatch_due();
        dispatched + self.arm_next()
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.armed.take() {
            self.clock.cancel_timer(timer);
        }
    }

    /// Re-arm for the head, dispatching synchronously while the head is already due.
    fn arm_next(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            self.disarm();
            let Some(head) = self.queue.front() else {
                return dispatched;
            };
            if head.time <= self.clock.now() + self.config.jitter_tolerance_ms {
                dispatched += self.dispatch_due();
                continue;
            }
            let at = head.time;
            self.armed = Some(self.clock.set_timer(at));
            debug!("timer armed for {} ms", at);
            return dispatched;
        }
    }

    /// Pop and emit every item due within the tolerance, as one batch.
    fn dispatch_due(&mut self) -> usize {
        let cutoff = self.clock.now() + self.config.jitter_tolerance_ms;
        let mut count = 0;
        while self.queue.front().is_some_and(|item| item.time <= cutoff) {
            if let Some(item) = self.queue.pop_front() {
                self.emit(&item.event);
                count += 1;
            }
        }
        count
    }

    fn emit(&mut self, event: &Midi2Event) {
        for (id, handler) in self.handlers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("event handler {:?} failed: {}", id, err),
                Err(_) => warn!("event handler {:?} panicked", id),
            }
        }
    }
}

impl<C: Clock> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::JitterConfig;
    use std::cell::RefCell;
    use std::rc::Rc;
    use umpkit_core::Midi2Message;

    type Log = Rc<RefCell<Vec<(f64, u8)>>>;

    fn note(n: u8) -> Midi2Event {
        Midi2Message::note_on(0, 0, n, 0x8000).into()
    }

    fn note_number(event: &Midi2Event) -> u8 {
        match event.message {
            Midi2Message::NoteOn { note, .. } => note,
            _ => 0,
        }
    }

    fn setup(tolerance: f64) -> (ManualClock, Scheduler<ManualClock>, Log) {
        let clock = ManualClock::new(0.0);
        let mut scheduler = Scheduler::new(
            clock.clone(),
            SchedulerConfig {
                jitter_tolerance_ms: tolerance,
            },
        )
        .unwrap();
        let log: Log = Rc::default();
        let sink = Rc::clone(&log);
        let handle = clock.clone();
        scheduler.on_event(move |event| {
            sink.borrow_mut().push((handle.now(), note_number(event)));
            Ok(())
        });
        (clock, scheduler, log)
    }

    #[test]
    fn test_dispatch_in_time_order() {
        let (clock, mut scheduler, log) = setup(0.5);
        scheduler.schedule(note(1), 100.0).unwrap();
        scheduler.schedule(note(2), 50.0).unwrap();
        scheduler.schedule(note(3), 75.0).unwrap();
        assert_eq!(scheduler.len(), 3);

        for t in [50.0, 75.0, 100.0] {
            clock.set_time(t);
            assert_eq!(scheduler.process_timers(), 1);
        }
        let order: Vec<u8> = log.borrow().iter().map(|&(_, n)| n).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_coalesces_within_tolerance() {
        let (clock, mut scheduler, log) = setup(0.5);
        scheduler.schedule(note(1), 100.0).unwrap();
        scheduler.schedule(note(2), 100.3).unwrap();
        clock.set_time(100.0);
        assert_eq!(scheduler.process_timers(), 2);
        assert_eq!(*log.borrow(), vec![(100.0, 1), (100.0, 2)]);
    }

    #[test]
    fn test_equal_times_are_fifo() {
        let (clock, mut scheduler, log) = setup(0.0);
        for n in 1..=4 {
            scheduler.schedule(note(n), 10.0).unwrap();
        }
        clock.set_time(10.0);
        scheduler.process_timers();
        let order: Vec<u8> = log.borrow().iter().map(|&(_, n)| n).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_due_items_dispatch_synchronously() {
        let (clock, mut scheduler, log) = setup(0.5);
        clock.set_time(20.0);
        scheduler.schedule(note(9), 20.4).unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert!(scheduler.is_empty());
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_cancel_head_rearms() {
        let (clock, mut scheduler, log) = setup(0.5);
        let head = scheduler.schedule(note(1), 10.0).unwrap();
        scheduler.schedule(note(2), 20.0).unwrap();
        assert!(scheduler.cancel(head));
        assert!(!scheduler.cancel(head));
        assert_eq!(clock.pending_timers(), 1);

        clock.set_time(10.0);
        assert_eq!(scheduler.process_timers(), 0);
        clock.set_time(20.0);
        assert_eq!(scheduler.process_timers(), 1);
        assert_eq!(*log.borrow(), vec![(20.0, 2)]);
    }

    #[test]
    fn test_clear_disarms() {
        let (clock, mut scheduler, log) = setup(0.5);
        scheduler.schedule(note(1), 10.0).unwrap();
        scheduler.clear();
        assert_eq!(clock.pending_timers(), 0);
        clock.set_time(10.0);
        assert_eq!(scheduler.process_timers(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failing_handlers_do_not_block_others() {
        let (clock, mut scheduler, log) = setup(0.5);
        scheduler.on_event(|_| Err("boom".into()));
        scheduler.on_event(|_| panic!("handler panic"));
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        scheduler.on_event(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        scheduler.schedule(note(1), 5.0).unwrap();
        scheduler.schedule(note(2), 6.0).unwrap();
        clock.set_time(6.0);
        scheduler.process_timers();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let (_clock, mut scheduler, log) = setup(0.5);
        let extra = scheduler.on_event(|_| Ok(()));
        assert!(scheduler.unsubscribe(extra));
        assert!(!scheduler.unsubscribe(extra));
        scheduler.schedule(note(1), 0.0).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_non_finite_times_rejected() {
        let (clock, mut scheduler, log) = setup(0.5);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                scheduler.schedule(note(1), bad),
                Err(Error::InvalidTime(_))
            ));
        }
        assert!(scheduler.is_empty());
        assert_eq!(clock.pending_timers(), 0);

        scheduler.schedule(note(2), 10.0).unwrap();
        clock.set_time(1000.0);
        assert_eq!(scheduler.process_timers(), 1);
        assert_eq!(*log.borrow(), vec![(1000.0, 2)]);
    }

    #[test]
    fn test_non_finite_time_leaves_jitter_state_alone() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = Scheduler::new(clock, SchedulerConfig::default())
            .unwrap()
            .with_jitter_reduction(JitterReductionSynchronizer::default());
        assert!(scheduler
            .schedule(Midi2Message::jr_clock(0, 10).into(), f64::NAN)
            .is_err());
        assert_eq!(
            scheduler.jitter_reduction().and_then(|s| s.clock_value(0)),
            None
        );
    }

    #[test]
    fn test_jitter_reduction_projection() {
        let clock = ManualClock::new(0.0);
        let sync = JitterReductionSynchronizer::new(JitterConfig::default()).unwrap();
        let mut scheduler = Scheduler::new(clock.clone(), SchedulerConfig::default())
            .unwrap()
            .with_jitter_reduction(sync);
        let seen: Rc<RefCell<Vec<Midi2Event>>> = Rc::default();
        let sink = Rc::clone(&seen);
        scheduler.on_event(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });

        // No base yet: literal time.
        scheduler.schedule(note(1), 500.0).unwrap();
        scheduler.schedule(Midi2Message::jr_clock(0, 100).into(), 1000.0).unwrap();
        scheduler.schedule(Midi2Message::jr_timestamp(0, 150).into(), 1000.0).unwrap();
        scheduler.schedule(note(2), 2000.0).unwrap();

        let sync = scheduler.jitter_reduction().unwrap();
        assert_eq!(sync.to_absolute_time(0, None), Some(1050.0));

        clock.set_time(1050.0);
        while scheduler.process_timers() > 0 {}
        let stamps: Vec<Option<f64>> = seen.borrow().iter().map(|e| e.timestamp).collect();
        assert_eq!(
            stamps,
            vec![Some(500.0), Some(1000.0), Some(1050.0), Some(1050.0)]
        );
    }
}
