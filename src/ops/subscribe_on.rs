use std::sync::Arc;

use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::Scheduler,
  subscription::BoxSubscription,
};

/// Subscribes to the source from a task on the given scheduler. Releasing the
/// subscription before the task ran cancels it.
pub struct SubscribeOn<S, Sch> {
  source: Arc<S>,
  scheduler: Sch,
}

impl<S, Sch> SubscribeOn<S, Sch> {
  pub(crate) fn new(source: S, scheduler: Sch) -> Self {
    SubscribeOn { source: Arc::new(source), scheduler }
  }
}

impl<S, Sch: Clone> Clone for SubscribeOn<S, Sch> {
  fn clone(&self) -> Self {
    SubscribeOn { source: self.source.clone(), scheduler: self.scheduler.clone() }
  }
}

impl<S, Sch> Observable for SubscribeOn<S, Sch>
where
  S: Observable,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let source = self.source.clone();
    self
      .scheduler
      .schedule(observer, move |observer| source.actual_subscribe(observer))
  }
}
