use crate::{
  observable::Observable,
  observer::Observer,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

#[derive(Clone)]
pub struct Take<S> {
  pub(crate) source: S,
  pub(crate) count: usize,
}

impl<S: Observable> Observable for Take<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    if self.count == 0 {
      observer.complete();
      return Box::new(());
    }
    let upstream = SingleAssignmentSubscription::default();
    let subscription = self.source.actual_subscribe(TakeObserver {
      observer: Some(observer),
      remaining: self.count,
      upstream: upstream.clone(),
    });
    upstream.set_boxed(subscription);
    Box::new(upstream)
  }
}

pub struct TakeObserver<O> {
  observer: Option<O>,
  remaining: usize,
  upstream: SingleAssignmentSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for TakeObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    let Some(observer) = self.observer.as_mut() else { return };
    self.remaining -= 1;
    observer.next(value);
    if self.remaining == 0 {
      if let Some(observer) = self.observer.take() {
        observer.complete();
      }
      self.upstream.unsubscribe();
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.observer {
      observer.error(err)
    }
  }

  fn complete(self) {
    if let Some(observer) = self.observer {
      observer.complete()
    }
  }

  fn is_closed(&self) -> bool {
    self.observer.as_ref().map_or(true, |o| o.is_closed())
  }
}
