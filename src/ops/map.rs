use crate::{
  observable::Observable,
  observer::Observer,
  subscription::{BoxSubscription, SingleAssignmentSubscription, SubscriptionLike},
};

#[derive(Clone)]
pub struct Map<S, F> {
  pub(crate) source: S,
  pub(crate) func: F,
}

impl<S, F, B> Observable for Map<S, F>
where
  S: Observable,
  F: FnMut(S::Item) -> B + Clone + Send + Sync + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<B, S::Err> + 'static,
  {
    self
      .source
      .actual_subscribe(MapObserver { observer, func: self.func.clone() })
  }
}

pub struct MapObserver<O, F> {
  observer: O,
  func: F,
}

impl<Item, Err, B, O, F> Observer<Item, Err> for MapObserver<O, F>
where
  O: Observer<B, Err>,
  F: FnMut(Item) -> B + Send,
{
  #[inline]
  fn next(&mut self, value: Item) { self.observer.next((self.func)(value)) }
  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }
  #[inline]
  fn complete(self) { self.observer.complete() }
  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

#[derive(Clone)]
pub struct TryMap<S, F> {
  pub(crate) source: S,
  pub(crate) func: F,
}

impl<S, F, B> Observable for TryMap<S, F>
where
  S: Observable,
  F: FnMut(S::Item) -> Result<B, S::Err> + Clone + Send + Sync + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O) -> BoxSubscription
  where
    O: Observer<B, S::Err> + 'static,
  {
    let upstream = SingleAssignmentSubscription::default();
    let subscription = self.source.actual_subscribe(TryMapObserver {
      observer: Some(observer),
      func: self.func.clone(),
      upstream: upstream.clone(),
    });
    upstream.set_boxed(subscription);
    Box::new(upstream)
  }
}

pub struct TryMapObserver<O, F> {
  observer: Option<O>,
  func: F,
  upstream: SingleAssignmentSubscription,
}

impl<Item, Err, B, O, F> Observer<Item, Err> for TryMapObserver<O, F>
where
  O: Observer<B, Err>,
  F: FnMut(Item) -> Result<B, Err> + Send,
{
  fn next(&mut self, value: Item) {
    if self.observer.is_none() {
      return;
    }
    match (self.func)(value) {
      Ok(v) => {
        if let Some(observer) = self.observer.as_mut() {
          observer.next(v)
        }
      }
      Err(e) => {
        if let Some(observer) = self.observer.take() {
          observer.error(e);
        }
        self.upstream.unsubscribe();
      }
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
