//! Schedulers decide when and on which execution context a unit of work runs.
//!
//! Every scheduler implements one primitive, [`Scheduler::schedule_task`],
//! that runs a boxed task now or after a delay and returns the subscription
//! cancelling it. `schedule`, `schedule_relative` and `schedule_recursive` are
//! built on top of it.
//!
//! | Scheduler | Execution |
//! |-----------|-----------|
//! | [`CurrentThreadScheduler`] | Synchronous, re-entrant calls trampolined |
//! | [`SerialScheduler`] | One worker thread, strict submission order |
//! | [`ConcurrentScheduler`] | Thread pool, no ordering between tasks |
//! | [`TokioScheduler`] | Tasks spawned on a tokio runtime |
//! | [`TestScheduler`] | Virtual time, driven explicitly by the test |

use std::{
  cmp::Ordering,
  sync::{
    atomic::{AtomicUsize, Ordering as AtomicOrdering},
    Arc,
  },
  time::Instant,
};

pub use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::subscription::{
  BoxSubscription, SingleAssignmentSubscription, SubscriptionLike,
};

#[cfg(feature = "futures-scheduler")]
mod concurrent;
mod current_thread;
mod serial;
pub mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

#[cfg(feature = "futures-scheduler")]
pub use concurrent::{ConcurrentScheduler, ConcurrentSchedulerBuilder};
pub use current_thread::CurrentThreadScheduler;
pub use serial::SerialScheduler;
pub use test_scheduler::{TestScheduler, TestSchedulerBuilder, TestTime};
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work. It returns the subscription owning whatever it started.
pub type Task = Box<dyn FnOnce() -> BoxSubscription + Send>;

/// What a recursive action wants after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  /// Stop, the action will not run again.
  Finished,
  /// Run the next step as soon as possible.
  Yield,
  /// Run the next step after the given delay.
  Sleeping(Duration),
}

/// A Scheduler is an object to order task and schedule their execution.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Time elapsed on this scheduler's clock.
  fn now(&self) -> Duration;

  /// Runs `task` after `delay` (or as soon as possible for `None`). The
  /// returned subscription cancels the task if it has not started yet, and
  /// releases what the task returned otherwise.
  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription;

  fn schedule<S, F>(&self, state: S, action: F) -> BoxSubscription
  where
    S: Send + 'static,
    F: FnOnce(S) -> BoxSubscription + Send + 'static,
  {
    self.schedule_task(None, Box::new(move || action(state)))
  }

  fn schedule_relative<S, F>(
    &self,
    state: S,
    due: Duration,
    action: F,
  ) -> BoxSubscription
  where
    S: Send + 'static,
    F: FnOnce(S) -> BoxSubscription + Send + 'static,
  {
    self.schedule_task(Some(due), Box::new(move || action(state)))
  }

  /// Repeatedly runs `action` on `state` until it returns
  /// [`TaskState::Finished`]. Cancellation is checked before every step.
  fn schedule_recursive<S, F>(
    &self,
    state: S,
    delay: Option<Duration>,
    action: F,
  ) -> BoxSubscription
  where
    S: Send + 'static,
    F: FnMut(&mut S) -> TaskState + Send + 'static,
  {
    let recursion = Arc::new(Recursion {
      step: Mutex::new((state, action)),
      slot: Mutex::new(StepSlot::default()),
      generation: AtomicUsize::new(0),
    });
    schedule_step(self.clone(), recursion.clone(), delay);
    Box::new(RecursionSubscription(recursion))
  }
}

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Wall clock shared by the real schedulers.
pub(crate) fn wall_clock() -> Duration { EPOCH.elapsed() }

// ==================== Recursive scheduling ====================

struct Recursion<S, F> {
  step: Mutex<(S, F)>,
  slot: Mutex<StepSlot>,
  generation: AtomicUsize,
}

#[derive(Default)]
struct StepSlot {
  closed: bool,
  generation: usize,
  current: Option<BoxSubscription>,
}

trait RecursionHandle: Send + Sync {
  fn close(&self);
  fn is_closed(&self) -> bool;
}

impl<S: Send, F: Send> RecursionHandle for Recursion<S, F> {
  fn close(&self) {
    let current = {
      let mut slot = self.slot.lock();
      slot.closed = true;
      slot.current.take()
    };
    if let Some(current) = current {
      current.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.slot.lock().closed }
}

struct RecursionSubscription<R>(Arc<R>);

impl<R: RecursionHandle> SubscriptionLike for RecursionSubscription<R> {
  fn unsubscribe(&self) { self.0.close() }
  fn is_closed(&self) -> bool { self.0.is_closed() }
}

fn schedule_step<Sch, S, F>(
  scheduler: Sch,
  recursion: Arc<Recursion<S, F>>,
  delay: Option<Duration>,
) where
  Sch: Scheduler,
  S: Send + 'static,
  F: FnMut(&mut S) -> TaskState + Send + 'static,
{
  if recursion.is_closed() {
    return;
  }
  let generation = recursion.generation.fetch_add(1, AtomicOrdering::AcqRel) + 1;
  let c_recursion = recursion.clone();
  let c_scheduler = scheduler.clone();
  let handle = scheduler.schedule_task(
    delay,
    Box::new(move || -> BoxSubscription {
      if c_recursion.is_closed() {
        return Box::new(());
      }
      let state = {
        let mut step = c_recursion.step.lock();
        let (state, action) = &mut *step;
        action(state)
      };
      match state {
        TaskState::Finished => {}
        TaskState::Yield => schedule_step(c_scheduler, c_recursion, None),
        TaskState::Sleeping(d) => {
          schedule_step(c_scheduler, c_recursion, Some(d))
        }
      }
      Box::new(())
    }),
  );

  let mut slot = recursion.slot.lock();
  if slot.closed {
    drop(slot);
    handle.unsubscribe();
  } else if generation > slot.generation {
    // A step that already ran scheduled its successor first when the
    // scheduler executed it synchronously, so only a newer handle wins.
    slot.generation = generation;
    slot.current = Some(handle);
  }
}

// ==================== Queued work items ====================

/// A task waiting in a time ordered queue, shared by the trampoline and the
/// serial worker.
pub(crate) struct QueuedTask {
  pub(crate) due: Instant,
  pub(crate) id: u64,
  pub(crate) task: Task,
  pub(crate) slot: SingleAssignmentSubscription,
}

impl QueuedTask {
  /// Runs the task unless it was cancelled while waiting.
  pub(crate) fn run(self) {
    if self.slot.is_closed() {
      return;
    }
    let subscription = (self.task)();
    self.slot.set_boxed(subscription);
  }
}

impl PartialEq for QueuedTask {
  fn eq(&self, other: &Self) -> bool {
    self.due == other.due && self.id == other.id
  }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for QueuedTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by id
    other.due.cmp(&self.due).then_with(|| other.id.cmp(&self.id))
  }
}
