use futures::executor::ThreadPool;
use once_cell::sync::OnceCell;

use super::{wall_clock, Duration, Scheduler, SerialScheduler, Task};
use crate::{
  error::SchedulerError,
  subscription::{
    BoxSubscription, CompositeSubscription, SingleAssignmentSubscription,
    SubscriptionLike,
  },
};

/// Runs tasks on a `futures` thread pool. Independently scheduled tasks may
/// run in parallel, up to the pool size, with no ordering between them.
///
/// Delayed tasks wait on a dedicated timer thread and are handed to the pool
/// once due.
#[derive(Clone)]
pub struct ConcurrentScheduler {
  pool: ThreadPool,
  timer: SerialScheduler,
}

/// Configures a [`ConcurrentScheduler`].
#[derive(Debug, Clone)]
pub struct ConcurrentSchedulerBuilder {
  pool_size: Option<usize>,
  name_prefix: String,
}

impl Default for ConcurrentSchedulerBuilder {
  fn default() -> Self {
    ConcurrentSchedulerBuilder { pool_size: None, name_prefix: "rxkit-pool-".into() }
  }
}

impl ConcurrentSchedulerBuilder {
  /// Number of worker threads, defaults to the number of CPUs.
  pub fn pool_size(mut self, size: usize) -> Self {
    self.pool_size = Some(size);
    self
  }

  pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.name_prefix = prefix.into();
    self
  }

  pub fn build(self) -> Result<ConcurrentScheduler, SchedulerError> {
    let mut builder = ThreadPool::builder();
    builder.name_prefix(self.name_prefix.clone());
    if let Some(size) = self.pool_size {
      builder.pool_size(size);
    }
    let pool = builder.create()?;
    let timer = SerialScheduler::new(format!("{}timer", self.name_prefix))?;
    tracing::debug!(prefix = %self.name_prefix, "concurrent scheduler created");
    Ok(ConcurrentScheduler { pool, timer })
  }
}

static SHARED: OnceCell<ConcurrentScheduler> = OnceCell::new();

impl ConcurrentScheduler {
  pub fn builder() -> ConcurrentSchedulerBuilder {
    ConcurrentSchedulerBuilder::default()
  }

  /// A process wide instance with the default configuration, created on
  /// first use.
  pub fn shared() -> Result<Self, SchedulerError> {
    SHARED
      .get_or_try_init(|| Self::builder().build())
      .cloned()
  }

  fn spawn(pool: &ThreadPool, slot: SingleAssignmentSubscription, task: Task) {
    pool.spawn_ok(async move {
      if !slot.is_closed() {
        tracing::trace!("concurrent dispatch");
        slot.set_boxed(task());
      }
    });
  }
}

impl Scheduler for ConcurrentScheduler {
  #[inline]
  fn now(&self) -> Duration { wall_clock() }

  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription {
    let slot = SingleAssignmentSubscription::default();
    match delay {
      Some(delay) if !delay.is_zero() => {
        let pool = self.pool.clone();
        let c_slot = slot.clone();
        let timer = self.timer.schedule_relative((), delay, move |_| {
          Self::spawn(&pool, c_slot, task);
          Box::new(())
        });
        let composite = CompositeSubscription::default();
        composite.add_boxed(timer);
        composite.add(slot);
        Box::new(composite)
      }
      _ => {
        Self::spawn(&self.pool, slot.clone(), task);
        Box::new(slot)
      }
    }
  }
}
