use std::sync::Arc;

use crate::{
  observable::Observable, observer::Observer, subscription::BoxSubscription,
};

/// Creates an observable that calls `factory` on every subscription and
/// subscribes to the observable it returns.
///
/// ```
/// use rxkit::prelude::*;
///
/// let deferred = observable::defer(|| observable::of::<_, ()>(42));
/// deferred.subscribe(|v| assert_eq!(v, 42));
/// ```
pub fn defer<F, S>(factory: F) -> Defer<F>
where
  F: Fn() -> S,
  S: Observable,
{
  Defer(Arc::new(factory))
}

pub struct Defer<F>(Arc<F>);

impl<F> Clone for Defer<F> {
  fn clone(&self) -> Self { Defer(self.0.clone()) }
}

impl<F, S> Observable for Defer<F>
where
  F: Fn() -> S + Send + Sync + 'static,
  S: Observable,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    (self.0)().actual_subscribe(observer)
  }
}
