use std::sync::Arc;

use crate::{
  observable::Observable,
  observer::Observer,
  sink::{Sink, SinkObserver},
  subscription::{BoxSubscription, SubscriptionLike},
};

/// Ties a resource to the lifetime of a subscription.
///
/// Each subscription creates a resource with `resource_factory` and the
/// observable to subscribe with `observable_factory`. The resource is released
/// once the sequence terminates or the subscriber unsubscribes.
pub fn using<RF, OF, R, S>(resource_factory: RF, observable_factory: OF) -> Using<RF, OF>
where
  RF: Fn() -> R,
  OF: Fn(&R) -> S,
  R: SubscriptionLike + 'static,
  S: Observable,
{
  Using {
    resource_factory: Arc::new(resource_factory),
    observable_factory: Arc::new(observable_factory),
  }
}

pub struct Using<RF, OF> {
  resource_factory: Arc<RF>,
  observable_factory: Arc<OF>,
}

impl<RF, OF> Clone for Using<RF, OF> {
  fn clone(&self) -> Self {
    Using {
      resource_factory: self.resource_factory.clone(),
      observable_factory: self.observable_factory.clone(),
    }
  }
}

impl<RF, OF, R, S> Observable for Using<RF, OF>
where
  RF: Fn() -> R + Send + Sync + 'static,
  OF: Fn(&R) -> S + Send + Sync + 'static,
  R: SubscriptionLike + 'static,
  S: Observable,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let resource = (self.resource_factory)();
    let source = (self.observable_factory)(&resource);
    let sink = Sink::new(observer);
    sink.cancel().add(resource);
    let upstream = source.actual_subscribe(SinkObserver(sink.clone()));
    sink.cancel().add_boxed(upstream);
    Box::new(sink.cancel().clone())
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{prelude::*, subscription::FnSubscription};

  #[test]
  fn resource_released_on_completion() {
    let released = Arc::new(AtomicUsize::new(0));
    let c_released = released.clone();
    let values = Arc::new(parking_lot::Mutex::new(vec![]));
    let c_values = values.clone();
    observable::using(
      move || {
        let released = c_released.clone();
        FnSubscription::new(move || {
          released.fetch_add(1, Ordering::SeqCst);
        })
      },
      |_| observable::from_iter::<_, ()>(vec![1, 2]),
    )
    .subscribe(move |v| c_values.lock().push(v));
    assert_eq!(*values.lock(), vec![1, 2]);
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn resource_released_on_unsubscribe() {
    let released = Arc::new(AtomicUsize::new(0));
    let c_released = released.clone();
    let subscription = observable::using(
      move || {
        let released = c_released.clone();
        FnSubscription::new(move || {
          released.fetch_add(1, Ordering::SeqCst);
        })
      },
      |_| observable::never::<i32, ()>(),
    )
    .subscribe(|_| {});
    assert_eq!(released.load(Ordering::SeqCst), 0);
    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }
}
