//! Virtual time scheduler for deterministic tests.
//!
//! Time is an integer tick count ([`TestTime`]) that only moves when the test
//! drives the queue with [`TestScheduler::start_virtual`] or
//! [`TestScheduler::advance_to`]. Work runs in (due time, scheduling order)
//! order on the driving thread.
//!
//! The helpers creating hot and cold observables, recording observers and the
//! `start_with` harness live in [`crate::testing`].
//!
//! ```rust
//! use rxkit::{prelude::*, testing::Recorded};
//!
//! let scheduler = TestScheduler::new(0);
//! let xs = scheduler.create_cold_observable::<i32, ()>(vec![
//!   Recorded::next(10, 1),
//!   Recorded::completed(20),
//! ]);
//! let res = scheduler.start(move || xs);
//! assert_eq!(
//!   res.events(),
//!   vec![Recorded::next(210, 1), Recorded::completed(220)]
//! );
//! ```

use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc};

use parking_lot::Mutex;

use super::{Duration, Scheduler, Task};
use crate::subscription::{
  BoxSubscription, SingleAssignmentSubscription, SubscriptionLike,
};

/// Virtual time, in ticks.
pub type TestTime = u64;

/// Deterministic scheduler driven by the test. Clones share the clock and the
/// queue.
#[derive(Clone)]
pub struct TestScheduler {
  inner: Arc<Inner>,
}

struct Inner {
  state: Mutex<VirtualState>,
  resolution: Duration,
  simulate_processing_delay: bool,
}

struct VirtualState {
  clock: TestTime,
  queue: BinaryHeap<VirtualItem>,
  next_id: u64,
  running: bool,
}

struct VirtualItem {
  time: TestTime,
  id: u64,
  task: Task,
  slot: SingleAssignmentSubscription,
}

impl PartialEq for VirtualItem {
  fn eq(&self, other: &Self) -> bool {
    self.time == other.time && self.id == other.id
  }
}

impl Eq for VirtualItem {}

impl PartialOrd for VirtualItem {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for VirtualItem {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by id
    other
      .time
      .cmp(&self.time)
      .then_with(|| other.id.cmp(&self.id))
  }
}

/// Configures a [`TestScheduler`].
#[derive(Debug, Clone)]
pub struct TestSchedulerBuilder {
  initial_clock: TestTime,
  resolution: Duration,
  simulate_processing_delay: bool,
}

impl Default for TestSchedulerBuilder {
  fn default() -> Self {
    TestSchedulerBuilder {
      initial_clock: 0,
      resolution: Duration::from_millis(1),
      simulate_processing_delay: true,
    }
  }
}

impl TestSchedulerBuilder {
  pub fn initial_clock(mut self, clock: TestTime) -> Self {
    self.initial_clock = clock;
    self
  }

  /// Real time represented by one tick. Zero is raised to one nanosecond.
  pub fn resolution(mut self, resolution: Duration) -> Self {
    self.resolution = resolution.max(Duration::from_nanos(1));
    self
  }

  /// When on (the default), work scheduled for the current tick through the
  /// [`Scheduler`] trait runs one tick later.
  pub fn simulate_processing_delay(mut self, simulate: bool) -> Self {
    self.simulate_processing_delay = simulate;
    self
  }

  pub fn build(self) -> TestScheduler {
    TestScheduler {
      inner: Arc::new(Inner {
        state: Mutex::new(VirtualState {
          clock: self.initial_clock,
          queue: BinaryHeap::new(),
          next_id: 0,
          running: false,
        }),
        resolution: self.resolution,
        simulate_processing_delay: self.simulate_processing_delay,
      }),
    }
  }
}

impl TestScheduler {
  pub fn new(initial_clock: TestTime) -> Self {
    Self::builder().initial_clock(initial_clock).build()
  }

  pub fn builder() -> TestSchedulerBuilder { TestSchedulerBuilder::default() }

  /// Current virtual time.
  pub fn clock(&self) -> TestTime { self.inner.state.lock().clock }

  /// Number of queued items, cancelled ones included.
  pub fn pending_count(&self) -> usize { self.inner.state.lock().queue.len() }

  pub fn to_ticks(&self, duration: Duration) -> TestTime {
    (duration.as_nanos() / self.inner.resolution.as_nanos()) as TestTime
  }

  pub fn to_duration(&self, ticks: TestTime) -> Duration {
    let nanos = self.inner.resolution.as_nanos() as u64;
    Duration::from_nanos(nanos.saturating_mul(ticks))
  }

  /// Runs `action` at the absolute virtual `time`, without any adjustment.
  pub fn schedule_at(
    &self,
    time: TestTime,
    action: impl FnOnce() + Send + 'static,
  ) -> BoxSubscription {
    self.schedule_absolute(
      time,
      Box::new(move || -> BoxSubscription {
        action();
        Box::new(())
      }),
    )
  }

  pub(crate) fn schedule_absolute(&self, time: TestTime, task: Task) -> BoxSubscription {
    let slot = SingleAssignmentSubscription::default();
    let mut state = self.inner.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    state.queue.push(VirtualItem { time, id, task, slot: slot.clone() });
    Box::new(slot)
  }

  /// Drains the queue in time order. The clock ends at the time of the last
  /// item executed.
  pub fn start_virtual(&self) { self.run(None) }

  /// Runs every item due at or before `time` and then sets the clock to
  /// `time`. Moving backwards is ignored.
  pub fn advance_to(&self, time: TestTime) { self.run(Some(time)) }

  /// Advances the clock by `ticks` without running anything.
  pub fn sleep(&self, ticks: TestTime) {
    let mut state = self.inner.state.lock();
    state.clock += ticks;
  }

  /// Stops a running drain after the current item.
  pub fn stop(&self) { self.inner.state.lock().running = false; }

  fn run(&self, limit: Option<TestTime>) {
    {
      let mut state = self.inner.state.lock();
      if state.running {
        return;
      }
      state.running = true;
    }
    loop {
      let item = {
        let mut state = self.inner.state.lock();
        if !state.running {
          break;
        }
        let next = loop {
          let (time, closed) = match state.queue.peek() {
            Some(item) => (item.time, item.slot.is_closed()),
            None => break None,
          };
          if closed {
            state.queue.pop();
            continue;
          }
          if limit.map_or(false, |limit| time > limit) {
            break None;
          }
          break state.queue.pop();
        };
        if let Some(item) = &next {
          if item.time > state.clock {
            state.clock = item.time;
          }
          tracing::trace!(clock = state.clock, id = item.id, "virtual dispatch");
        }
        next
      };
      let Some(item) = item else { break };
      if !item.slot.is_closed() {
        let subscription = (item.task)();
        item.slot.set_boxed(subscription);
      }
    }
    let mut state = self.inner.state.lock();
    state.running = false;
    if let Some(limit) = limit {
      if limit > state.clock {
        state.clock = limit;
      }
    }
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Duration { self.to_duration(self.clock()) }

  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription {
    let ticks = delay.map_or(0, |d| self.to_ticks(d));
    let clock = self.clock();
    let mut time = clock + ticks;
    if time <= clock && self.inner.simulate_processing_delay {
      time = clock + 1;
    }
    self.schedule_absolute(time, task)
  }
}
