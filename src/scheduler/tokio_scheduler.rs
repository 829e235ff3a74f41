use tokio::runtime::Handle;

use super::{wall_clock, Duration, Scheduler, Task};
use crate::{
  error::SchedulerError,
  subscription::{
    BoxSubscription, CompositeSubscription, FnSubscription,
    SingleAssignmentSubscription, SubscriptionLike,
  },
};

/// Spawns every task on a tokio runtime; delays use `tokio::time::sleep`.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
  handle: Handle,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler { handle } }

  /// Uses the runtime the caller is running in.
  pub fn current() -> Result<Self, SchedulerError> {
    Ok(TokioScheduler { handle: Handle::try_current()? })
  }
}

impl Scheduler for TokioScheduler {
  #[inline]
  fn now(&self) -> Duration { wall_clock() }

  fn schedule_task(&self, delay: Option<Duration>, task: Task) -> BoxSubscription {
    let slot = SingleAssignmentSubscription::default();
    let c_slot = slot.clone();
    let join = self.handle.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      if !c_slot.is_closed() {
        tracing::trace!("tokio dispatch");
        c_slot.set_boxed(task());
      }
    });
    let composite = CompositeSubscription::default();
    composite.add(slot);
    composite.add(FnSubscription::new(move || join.abort()));
    Box::new(composite)
  }
}
