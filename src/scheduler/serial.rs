use std::{collections::BinaryHeap, sync::Arc, time::Instant};

use parking_lot::{Condvar, Mutex};

use super::{wall_clock, Duration, QueuedTask, Scheduler, Task};
use crate::{
  error::SchedulerError,
  subscription::{BoxSubscription, SingleAssignmentSubscription},
};

/// Runs every task on one dedicated worker thread, strictly one at a time and
/// in submission order (delayed tasks by due time, ties by submission).
///
/// Clones share the worker. The worker stops once every handle is dropped and
/// the queue has drained.
#[derive(Clone)]
pub struct SerialScheduler {
  shared: Arc<Shared>,
  _owner: Arc<Owner>,
}

struct Shared {
  queue: Mutex<SerialQueue>,
  ready: Condvar,
}

#[derive(Default)]
struct SerialQueue {
  tasks: BinaryHeap<QueuedTask>,
  next_id: u64,
  shutdown: bool,
}

/// Last user handle; dropping it tells the worker to finish.
struct Owner(Arc<Shared>);

impl Drop for Owner {
  fn drop(&mut self) {
    self.0.queue.lock().shutdown = true;
    self.0.ready.notify_all();
  }
}

impl SerialScheduler {
  pub fn new(name: impl Into<String>) -> Result<Self, SchedulerError> {
    let name = name.into();
    let shared = Arc::new(Shared {
      queue: Mutex::new(SerialQueue::default()),
      ready: Condvar::new(),
    });
    let worker = shared.clone();
    let thread_name = name.clone();
    std::thread::Builder::new()
      .name(name)
      .spawn(move || worker.run(&thread_name))?;
    Ok(SerialScheduler { _owner: Arc::new(Owner(shared.clone())), shared })
  }
}

impl Shared {
  fn run(&self, name: &str) {
    tracing::debug!(worker = name, "serial scheduler worker started");
    let mut queue = self.queue.lock();
    loop {
      let now = Instant::now();
      match queue.tasks.peek().map(|t| t.due) {
        None if queue.shutdown => break,
        None => self.ready.wait(&mut queue),
        Some(due) if due > now => {
          self.ready.wait_for(&mut queue, due - now);
        }
        Some(_) => {
          if let Some(task) = queue.tasks.pop() {
            tracing::trace!(worker = name, id = task.id, "serial dispatch");
            parking_lot::MutexGuard::unlocked(&mut queue, || task.run());
          }
        }
      }
    }
    tracing::debug!(worker = name, "serial scheduler worker stopped");
  }
}

impl Scheduler for SerialScheduler {
  #[inline]
  fn now(&self) -> Duration { wall_clock() }

  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription {
    let slot = SingleAssignmentSubscription::default();
    let due = Instant::now() + delay.unwrap_or_default();
    let mut queue = self.shared.queue.lock();
    let id = queue.next_id;
    queue.next_id += 1;
    queue.tasks.push(QueuedTask { due, id, task, slot: slot.clone() });
    drop(queue);
    self.shared.ready.notify_one();
    Box::new(slot)
  }
}
