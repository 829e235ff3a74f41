use std::{cell::RefCell, collections::BinaryHeap, time::Instant};

use super::{wall_clock, Duration, QueuedTask, Scheduler, Task};
use crate::subscription::{
  BoxSubscription, SingleAssignmentSubscription, SubscriptionLike,
};

/// Runs work on the calling thread.
///
/// The first `schedule_task` on a thread installs a trampoline and drains it
/// before returning; any task scheduled while the trampoline runs (including
/// from inside a task) is queued instead of being called recursively. Deep
/// chains of synchronous re-subscription therefore keep a constant stack
/// depth.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThreadScheduler;

#[derive(Default)]
struct Trampoline {
  queue: BinaryHeap<QueuedTask>,
  next_id: u64,
}

thread_local! {
  static TRAMPOLINE: RefCell<Option<Trampoline>> = const { RefCell::new(None) };
}

/// Uninstalls the trampoline even if a task panics.
struct TrampolineGuard;

impl Drop for TrampolineGuard {
  fn drop(&mut self) { TRAMPOLINE.with(|t| t.borrow_mut().take()); }
}

impl CurrentThreadScheduler {
  /// `true` when no trampoline is running on this thread, i.e. a scheduled
  /// task would run right away.
  pub fn is_schedule_required() -> bool {
    TRAMPOLINE.with(|t| t.borrow().is_none())
  }

  fn drain() {
    let _guard = TrampolineGuard;
    loop {
      let next = TRAMPOLINE
        .with(|t| t.borrow_mut().as_mut().and_then(|t| t.queue.pop()));
      let Some(item) = next else { break };
      let now = Instant::now();
      if item.due > now && !item.slot.is_closed() {
        std::thread::sleep(item.due - now);
      }
      item.run();
    }
  }
}

impl Scheduler for CurrentThreadScheduler {
  #[inline]
  fn now(&self) -> Duration { wall_clock() }

  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription {
    let slot = SingleAssignmentSubscription::default();
    let due = Instant::now() + delay.unwrap_or_default();
    let c_slot = slot.clone();
    let install = TRAMPOLINE.with(move |t| {
      let mut t = t.borrow_mut();
      let install = t.is_none();
      let trampoline = t.get_or_insert_with(Trampoline::default);
      let id = trampoline.next_id;
      trampoline.next_id += 1;
      trampoline.queue.push(QueuedTask { due, id, task, slot: c_slot });
      install
    });
    if install {
      tracing::trace!("current thread trampoline installed");
      Self::drain();
    }
    Box::new(slot)
  }
}
