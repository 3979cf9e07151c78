use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use lantern_bridge::{HostObject, HostType};

use crate::types::SCHEDULER;

/// Unique identifier for a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn from_raw(raw: u64) -> Self {
        TimerId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
enum TimerKind {
    /// Fires once and is removed
    OneShot { fire_at: Instant },
    /// Fires repeatedly at an interval
    Recurring {
        interval: Duration,
        next_fire: Instant,
    },
}

#[derive(Debug, Clone)]
struct Timer {
    name: String,
    kind: TimerKind,
}

#[derive(Debug)]
struct TimerState {
    timers: BTreeMap<TimerId, Timer>,
    next_id: u64,
    /// At most one pending flag per timer.
    fired: BTreeSet<TimerId>,
    clock: Instant,
}

/// Timers shared between the frame loop and scripts.
///
/// Time only advances through [`Scheduler::tick`]; delays are measured from
/// the last tick, so a frame is deterministic for a given `now`.
#[derive(Debug)]
pub struct Scheduler {
    state: RefCell<TimerState>,
}

impl Scheduler {
    pub fn new(start: Instant) -> Self {
        Self {
            state: RefCell::new(TimerState {
                timers: BTreeMap::new(),
                next_id: 0,
                fired: BTreeSet::new(),
                clock: start,
            }),
        }
    }

    /// Schedule a one-shot timer that fires after a delay
    pub fn schedule(&self, delay: Duration, name: &str) -> TimerId {
        let mut state = self.state.borrow_mut();
        let fire_at = state.clock + delay;
        state.insert(name, TimerKind::OneShot { fire_at })
    }

    /// Schedule a recurring timer that fires repeatedly at an interval
    pub fn schedule_recurring(&self, interval: Duration, name: &str) -> TimerId {
        let mut state = self.state.borrow_mut();
        let next_fire = state.clock + interval;
        state.insert(
            name,
            TimerKind::Recurring {
                interval,
                next_fire,
            },
        )
    }

    /// Remove a timer along with any fired flag it left behind.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        state.fired.remove(&id);
        state.timers.remove(&id).is_some()
    }

    /// Check if a timer has fired (and consume the fired state)
    pub fn check(&self, id: TimerId) -> bool {
        self.state.borrow_mut().fired.remove(&id)
    }

    /// Advance the clock and return the timers that fired, in id order.
    pub fn tick(&self, now: Instant) -> Vec<(TimerId, String)> {
        let mut state = self.state.borrow_mut();
        state.clock = now;

        let mut fired = Vec::new();
        let mut finished = Vec::new();
        for (id, timer) in state.timers.iter_mut() {
            match &mut timer.kind {
                TimerKind::OneShot { fire_at } => {
                    if now >= *fire_at {
                        fired.push((*id, timer.name.clone()));
                        finished.push(*id);
                    }
                }
                TimerKind::Recurring {
                    interval,
                    next_fire,
                } => {
                    if now >= *next_fire {
                        fired.push((*id, timer.name.clone()));
                        *next_fire = now + *interval;
                    }
                }
            }
        }

        for id in finished {
            state.timers.remove(&id);
        }
        state.fired.extend(fired.iter().map(|(id, _)| *id));

        fired
    }

    pub fn active_count(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Drop every timer and pending fired flag. Ids keep increasing.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.timers.clear();
        state.fired.clear();
    }
}

impl TimerState {
    fn insert(&mut self, name: &str, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            Timer {
                name: name.to_string(),
                kind,
            },
        );
        id
    }
}

impl HostObject for Scheduler {
    fn host_type(&self) -> &'static HostType {
        &SCHEDULER
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn pending(scheduler: &Scheduler) -> usize {
        scheduler.state.borrow().fired.len()
    }

    #[test]
    fn test_one_shot_fires_on_the_tick_that_reaches_it() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        let id = scheduler.schedule(ms(50), "door");

        assert!(scheduler.tick(start + ms(49)).is_empty());
        assert_eq!(scheduler.tick(start + ms(50)), vec![(id, "door".to_string())]);
        assert!(scheduler.tick(start + ms(500)).is_empty());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_recurring_interval_restarts_from_the_firing_tick() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        scheduler.schedule_recurring(ms(50), "pulse");

        // A late tick fires once; the next deadline is 50ms after it.
        assert_eq!(scheduler.tick(start + ms(80)).len(), 1);
        assert!(scheduler.tick(start + ms(129)).is_empty());
        assert_eq!(scheduler.tick(start + ms(130)).len(), 1);
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn test_same_tick_fires_in_id_order() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        let late = scheduler.schedule(ms(30), "late");
        let early = scheduler.schedule(ms(10), "early");

        let order: Vec<TimerId> = scheduler
            .tick(start + ms(40))
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(order, vec![late, early]);
    }

    #[test]
    fn test_recurring_timer_keeps_one_pending_flag() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        let id = scheduler.schedule_recurring(ms(10), "heartbeat");

        for step in 1..=1000 {
            scheduler.tick(start + ms(step * 10));
            assert!(pending(&scheduler) <= 1);
        }
        assert!(scheduler.check(id));
        assert!(!scheduler.check(id));

        scheduler.tick(start + ms(10_010));
        assert!(scheduler.cancel(id));
        assert_eq!(pending(&scheduler), 0);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_cancelled_one_shot_never_reports_fired() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        let id = scheduler.schedule(ms(10), "fuse");
        scheduler.tick(start + ms(10));

        // Already fired and removed, but the flag goes with the cancel.
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.check(id));
    }

    #[test]
    fn test_delays_are_measured_from_last_tick() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        scheduler.tick(start + ms(1000));

        scheduler.schedule(ms(50), "late");
        assert!(scheduler.tick(start + ms(1040)).is_empty());
        assert_eq!(scheduler.tick(start + ms(1050)).len(), 1);
    }

    #[test]
    fn test_clear_drops_timers_and_fired_flags() {
        let start = Instant::now();
        let scheduler = Scheduler::new(start);
        let fired = scheduler.schedule(ms(10), "old");
        scheduler.schedule_recurring(ms(10), "loop");
        scheduler.tick(start + ms(20));

        scheduler.clear();
        assert_eq!(scheduler.active_count(), 0);
        assert!(!scheduler.check(fired));
        assert!(scheduler.schedule(ms(10), "new").raw() > fired.raw());
    }
}
